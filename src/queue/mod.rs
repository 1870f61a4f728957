//! Production `QueueClient`/`BlobStore` implementations: AWS SQS for the
//! queue side, OpenDAL's S3 service for the blob side. The pipeline crates
//! (`marc-ingest-queue`, `marc-ingest-batch`) only depend on the traits;
//! these are the one place a real SDK is wired in.

mod blob;
mod sqs;

pub use blob::S3BlobStore;
pub use sqs::SqsQueueClient;
