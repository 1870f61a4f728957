use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("downloaded blob size {actual} does not match announced size {expected}")]
    SizeMismatch { expected: i64, actual: u64 },

    #[error("{} of {} items in the batch were not accepted", .failed_indices.len(), total)]
    PartialFailure {
        failed_indices: Vec<usize>,
        total: usize,
    },

    #[error("failed to decode notification payload")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    RecordId(#[from] marc_ingest_core::MarcError),

    #[error("transport error")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}
