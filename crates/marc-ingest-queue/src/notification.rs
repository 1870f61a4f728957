//! Inbound notification decoding.
//!
//! Wire shape:
//! ```json
//! { "Records": [ { "S3": { "bucket": { "name": "<b>" },
//!                           "object": { "key": "<k>", "size": <n> } } }, ... ] }
//! ```
//! Unknown fields are ignored - `serde`'s default behavior, no
//! `deny_unknown_fields` - since the payload is produced by an external
//! blob-store event source this pipeline does not own.

use std::time::Duration;

use serde::Deserialize;

use crate::client::QueueClient;
use crate::error::QueueError;

/// A single blob referenced by an inbound notification.
///
/// `size == 0` is a sentinel for an empty/ignorable blob: the orchestrator
/// skips it without failing the notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    pub bucket: String,
    pub key: String,
    pub size: i64,
}

/// Opaque handle returned by the inbound queue that must be presented to
/// acknowledge (delete) a previously received message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptToken(pub String);

#[derive(Debug, Deserialize)]
struct Events {
    #[serde(default, rename = "Records")]
    records: Vec<EventRecord>,
}

#[derive(Debug, Deserialize)]
struct EventRecord {
    #[serde(rename = "S3")]
    s3: S3Entry,
}

#[derive(Debug, Deserialize)]
struct S3Entry {
    bucket: S3Bucket,
    object: S3Object,
}

#[derive(Debug, Deserialize)]
struct S3Bucket {
    name: String,
}

#[derive(Debug, Deserialize)]
struct S3Object {
    key: String,
    size: i64,
}

/// Decodes a raw notification payload into its referenced blobs.
pub fn decode_blob_refs(payload: &[u8]) -> Result<Vec<BlobRef>, QueueError> {
    let events: Events = serde_json::from_slice(payload)?;
    Ok(events
        .records
        .into_iter()
        .map(|r| BlobRef {
            bucket: r.s3.bucket.name,
            key: r.s3.object.key,
            size: r.s3.object.size,
        })
        .collect())
}

/// Polls `client` until a notification carrying at least one blob
/// reference arrives.
///
/// A notification whose decoded event lists zero blob references is
/// logged and polling continues *without* deleting the message - this
/// preserves a documented inconsistency in the original service (see
/// DESIGN.md open questions) rather than silently fixing it.
pub async fn receive_notification(
    client: &dyn QueueClient,
    poll_timeout: Duration,
) -> Result<(Vec<BlobRef>, ReceiptToken), QueueError> {
    loop {
        match client.receive(poll_timeout).await? {
            Some((refs, _receipt)) if refs.is_empty() => {
                tracing::warn!(
                    "notification carried zero blob references; continuing to poll without deleting it"
                );
            }
            Some((refs, receipt)) => {
                tracing::info!(blob_count = refs.len(), "received a new notification");
                return Ok((refs, receipt));
            }
            None => {
                tracing::debug!("no new notifications");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_one_blob_reference() {
        let payload = br#"{
            "Records": [
                { "S3": { "bucket": { "name": "ingest-bucket" },
                          "object": { "key": "batch-1.mrc", "size": 4096 } } }
            ]
        }"#;

        let refs = decode_blob_refs(payload).unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].bucket, "ingest-bucket");
        assert_eq!(refs[0].key, "batch-1.mrc");
        assert_eq!(refs[0].size, 4096);
    }

    #[test]
    fn ignores_unknown_fields() {
        let payload = br#"{
            "eventVersion": "2.1",
            "Records": [
                { "eventName": "ObjectCreated:Put",
                  "S3": { "bucket": { "name": "b", "arn": "..." },
                          "object": { "key": "k", "size": 1, "eTag": "..." } } }
            ]
        }"#;

        let refs = decode_blob_refs(payload).unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].key, "k");
    }

    #[test]
    fn empty_records_list_decodes_to_empty_vec() {
        let payload = br#"{ "Records": [] }"#;
        let refs = decode_blob_refs(payload).unwrap();
        assert!(refs.is_empty());
    }
}
