use thiserror::Error;

/// Errors produced while parsing ISO 2709 (MARC) records.
///
/// `Eof` is not exceptional: it is the normal "no more records" signal a
/// [`crate::marc::loader::RecordLoader`] uses to know a file is exhausted,
/// and it is also how a truncated trailing record is reported - a short
/// final record is treated as lost, not a hard failure.
#[derive(Debug, Error)]
pub enum MarcError {
    #[error("end of record stream")]
    Eof,

    #[error("malformed marc record: {0}")]
    BadRecord(String),

    #[error("malformed marc record identifier: {0}")]
    BadRecordId(String),

    #[error("record loader is not open")]
    FileNotOpen,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
