//! Attaches the fixed attribute schema to a record and base64-encodes its
//! payload for transport.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use marc_ingest_core::MarcRecord;

use crate::error::QueueError;

pub const RECORD_TYPE: &str = "base64/marc";
pub const RECORD_OPERATION: &str = "update";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: &'static str,
    pub value: String,
}

/// An outbound message: a base64-encoded MARC record plus its attributes,
/// in the fixed order RecordId, RecordType, RecordSource, RecordOperation.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub payload: String,
    pub attributes: Vec<Attribute>,
}

/// Builds the outbound message for one record.
///
/// `data_source_override` is `cfg.DataSource` when configured; otherwise
/// the record's own loader-supplied source (typically derived from the
/// remote bucket/key) is used.
pub fn build_message(
    record: &MarcRecord,
    data_source_override: Option<&str>,
) -> Result<OutboundMessage, QueueError> {
    let id = record.id()?;
    let source = data_source_override.unwrap_or(&record.source);

    let attributes = vec![
        Attribute {
            name: "RecordId",
            value: id.to_string(),
        },
        Attribute {
            name: "RecordType",
            value: RECORD_TYPE.to_string(),
        },
        Attribute {
            name: "RecordSource",
            value: source.to_string(),
        },
        Attribute {
            name: "RecordOperation",
            value: RECORD_OPERATION.to_string(),
        },
    ];

    Ok(OutboundMessage {
        payload: STANDARD.encode(record.raw()),
        attributes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attaches_attributes_in_fixed_order() {
        let record = MarcRecord::with_id(b"hello".to_vec(), "s3://bucket/key".into(), "u1".into());
        let msg = build_message(&record, None).unwrap();

        assert_eq!(msg.payload, STANDARD.encode(b"hello"));
        let names: Vec<&str> = msg.attributes.iter().map(|a| a.name).collect();
        assert_eq!(names, ["RecordId", "RecordType", "RecordSource", "RecordOperation"]);
        assert_eq!(msg.attributes[0].value, "u1");
        assert_eq!(msg.attributes[1].value, RECORD_TYPE);
        assert_eq!(msg.attributes[2].value, "s3://bucket/key");
        assert_eq!(msg.attributes[3].value, RECORD_OPERATION);
    }

    #[test]
    fn data_source_override_wins_over_record_source() {
        let record = MarcRecord::with_id(b"hello".to_vec(), "s3://bucket/key".into(), "u1".into());
        let msg = build_message(&record, Some("configured-source")).unwrap();
        assert_eq!(msg.attributes[2].value, "configured-source");
    }

    #[test]
    fn round_trips_payload_bytes() {
        let raw = b"\x1e\x1d some marc bytes".to_vec();
        let record = MarcRecord::with_id(raw.clone(), "src".into(), "u1".into());
        let msg = build_message(&record, None).unwrap();
        let decoded = STANDARD.decode(&msg.payload).unwrap();
        assert_eq!(decoded, raw);
    }
}
