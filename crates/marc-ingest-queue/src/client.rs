//! The capability sets the core ingest pipeline consumes from the queue
//! and blob-store SDKs. Real implementations (AWS SQS, OpenDAL-backed S3)
//! live in the binary crate; tests exercise the pipeline against simple
//! in-memory fakes of these traits.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::QueueError;
use crate::message::OutboundMessage;
use crate::notification::{BlobRef, ReceiptToken};

/// Maximum number of messages in a single batch get/put/delete call.
pub const MAX_BATCH: usize = 10;

#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Requests at most one message from the inbound queue, long-polling
    /// for up to `poll_timeout`. `Ok(None)` means the poll timed out with
    /// nothing available; `Ok(Some(..))` carries the decoded blob
    /// references (possibly empty, see [`crate::notification::receive_notification`])
    /// and the receipt token needed to delete it later.
    async fn receive(
        &self,
        poll_timeout: Duration,
    ) -> Result<Option<(Vec<BlobRef>, ReceiptToken)>, QueueError>;

    /// Deletes a previously received notification.
    async fn delete(&self, receipt: &ReceiptToken) -> Result<(), QueueError>;

    /// Publishes a batch of at most [`MAX_BATCH`] messages. Returns the
    /// indices (relative to `messages`) that the SDK reported as
    /// unsuccessful; an empty vector means every item was accepted.
    async fn put_batch(&self, messages: &[OutboundMessage]) -> Result<Vec<usize>, QueueError>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Downloads `bucket/key` to `local_path`, returning the number of
    /// bytes written.
    async fn get_to_file(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
    ) -> Result<u64, QueueError>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fakes {
    //! In-memory fakes used by this crate's and downstream crates' tests.

    use super::*;
    use std::sync::Mutex;

    /// A `QueueClient` fed from a fixed notification script and an
    /// in-memory record of everything published to it.
    pub struct FakeQueueClient {
        notifications: Mutex<Vec<(Vec<BlobRef>, ReceiptToken)>>,
        pub deleted: Mutex<Vec<ReceiptToken>>,
        pub published: Mutex<Vec<Vec<OutboundMessage>>>,
        /// Indices to report as failed on the *next* `put_batch` call only.
        pub fail_next_indices: Mutex<Vec<usize>>,
    }

    impl FakeQueueClient {
        pub fn new(notifications: Vec<(Vec<BlobRef>, ReceiptToken)>) -> Self {
            Self {
                notifications: Mutex::new(notifications),
                deleted: Mutex::new(Vec::new()),
                published: Mutex::new(Vec::new()),
                fail_next_indices: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl QueueClient for FakeQueueClient {
        async fn receive(
            &self,
            _poll_timeout: Duration,
        ) -> Result<Option<(Vec<BlobRef>, ReceiptToken)>, QueueError> {
            Ok(self.notifications.lock().unwrap().pop())
        }

        async fn delete(&self, receipt: &ReceiptToken) -> Result<(), QueueError> {
            self.deleted.lock().unwrap().push(receipt.clone());
            Ok(())
        }

        async fn put_batch(&self, messages: &[OutboundMessage]) -> Result<Vec<usize>, QueueError> {
            self.published.lock().unwrap().push(messages.to_vec());
            Ok(std::mem::take(&mut self.fail_next_indices.lock().unwrap()))
        }
    }
}
