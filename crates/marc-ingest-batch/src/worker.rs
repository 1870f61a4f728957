//! Worker pool and batcher.
//!
//! Each worker runs a `Collecting`/`Flushing` state machine: accumulate
//! records from the shared channel until either the batch reaches
//! [`MAX_BATCH`] or an idle timer of [`FLUSH_TIMEOUT`] elapses with a
//! non-empty batch, then publish and go back to collecting.
//!
//! `tokio::sync::mpsc` is single-consumer, so the shared receiver is
//! wrapped in a `tokio::sync::Mutex`. The lock is held only for the race
//! between `recv()` and the flush timer - never across a publish - so
//! concurrent workers still overlap on the expensive part, the network
//! round trip, which is the only place concurrency actually matters here.

use std::sync::Arc;
use std::time::Duration;

use marc_ingest_core::MarcRecord;
use marc_ingest_queue::{build_message, OutboundMessage, QueueClient, QueueError, MAX_BATCH};
use tokio::sync::{mpsc, Mutex};

/// Idle timeout after which a non-empty batch is flushed even if it has
/// not reached [`MAX_BATCH`].
pub const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

const MAX_PUBLISH_ATTEMPTS: u32 = 3;
const RETRY_PAUSE: Duration = Duration::from_millis(100);

/// Shared configuration every worker in the pool publishes against.
#[derive(Clone)]
pub struct WorkerConfig {
    pub primary: Arc<dyn QueueClient>,
    pub cache: Option<Arc<dyn QueueClient>>,
    pub data_source: Option<String>,
}

type SharedReceiver = Arc<Mutex<mpsc::Receiver<MarcRecord>>>;

/// Spawns `worker_count` worker tasks over a freshly-created bounded
/// channel, returning the channel's sending half and the tasks' join
/// handles.
pub fn spawn_workers(
    worker_count: usize,
    channel_capacity: usize,
    config: WorkerConfig,
) -> (mpsc::Sender<MarcRecord>, Vec<tokio::task::JoinHandle<()>>) {
    let (tx, rx) = mpsc::channel(channel_capacity);
    let rx = Arc::new(Mutex::new(rx));

    let handles = (1..=worker_count)
        .map(|id| {
            let rx = rx.clone();
            let config = config.clone();
            tokio::spawn(async move { run_worker(id, rx, config).await })
        })
        .collect();

    (tx, handles)
}

enum Event {
    Record(Option<MarcRecord>),
    Timeout,
}

async fn next_event(rx: &SharedReceiver) -> Event {
    let mut guard = rx.lock().await;
    tokio::select! {
        biased;
        maybe_record = guard.recv() => Event::Record(maybe_record),
        _ = tokio::time::sleep(FLUSH_TIMEOUT) => Event::Timeout,
    }
}

/// Runs one worker's collect/flush loop until the channel is closed.
pub async fn run_worker(id: usize, rx: SharedReceiver, config: WorkerConfig) {
    let mut batch: Vec<MarcRecord> = Vec::with_capacity(MAX_BATCH);
    let mut processed: u64 = 0;

    loop {
        match next_event(&rx).await {
            Event::Record(Some(record)) => {
                batch.push(record);
                processed += 1;

                if batch.len() >= MAX_BATCH {
                    flush(id, &mut batch, &config).await;
                }

                if processed % 1000 == 0 {
                    tracing::info!(worker = id, processed, "worker processed records");
                }
            }
            Event::Record(None) => {
                flush(id, &mut batch, &config).await;
                tracing::info!(worker = id, processed, "worker channel closed, exiting");
                return;
            }
            Event::Timeout => {
                if !batch.is_empty() {
                    flush(id, &mut batch, &config).await;
                    tracing::info!(worker = id, processed, "worker flushed on idle timeout");
                }
            }
        }
    }
}

/// Publishes the current batch to the primary queue, and mirrors it to the
/// cache queue (if configured) once the primary publish has succeeded.
/// Any unrecoverable publish error is fatal to the process - there is no
/// dead-letter handling in the core.
async fn flush(worker_id: usize, batch: &mut Vec<MarcRecord>, config: &WorkerConfig) {
    if batch.is_empty() {
        return;
    }

    let records = std::mem::take(batch);
    let data_source = config.data_source.as_deref();

    let primary_messages = match build_messages(&records, data_source) {
        Ok(messages) => messages,
        Err(e) => fatal(worker_id, "failed to build outbound message", &e),
    };

    if let Err(e) = publish_with_retry(config.primary.as_ref(), &primary_messages).await {
        fatal(worker_id, "primary publish exhausted retries", &e);
    }

    if let Some(cache) = &config.cache {
        // Built independently of `primary_messages` so neither queue's SDK
        // can inadvertently share mutable payload buffers across
        // destinations.
        let cache_messages = match build_messages(&records, data_source) {
            Ok(messages) => messages,
            Err(e) => fatal(worker_id, "failed to build cache outbound message", &e),
        };

        if let Err(e) = publish_with_retry(cache.as_ref(), &cache_messages).await {
            fatal(worker_id, "cache mirror publish failed", &e);
        }
    }
}

fn build_messages(
    records: &[MarcRecord],
    data_source: Option<&str>,
) -> Result<Vec<OutboundMessage>, QueueError> {
    records.iter().map(|r| build_message(r, data_source)).collect()
}

fn fatal(worker_id: usize, context: &str, error: &dyn std::error::Error) -> ! {
    tracing::error!(worker = worker_id, error = %error, "{context}; terminating");
    std::process::exit(1);
}

/// Publishes `messages`, retrying only the items the SDK reports as
/// unsuccessful, up to [`MAX_PUBLISH_ATTEMPTS`] attempts total with
/// [`RETRY_PAUSE`] between attempts.
async fn publish_with_retry(
    client: &dyn QueueClient,
    messages: &[OutboundMessage],
) -> Result<(), QueueError> {
    let mut pending: Vec<usize> = (0..messages.len()).collect();

    for attempt in 1..=MAX_PUBLISH_ATTEMPTS {
        let subset: Vec<OutboundMessage> = pending.iter().map(|&i| messages[i].clone()).collect();
        let failed_relative = client.put_batch(&subset).await?;

        if failed_relative.is_empty() {
            return Ok(());
        }

        pending = failed_relative.into_iter().map(|rel| pending[rel]).collect();

        if attempt < MAX_PUBLISH_ATTEMPTS {
            tokio::time::sleep(RETRY_PAUSE).await;
        }
    }

    Err(QueueError::PartialFailure {
        failed_indices: pending,
        total: messages.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use marc_ingest_queue::client::fakes::FakeQueueClient;
    use marc_ingest_queue::ReceiptToken;

    fn record(id: &str) -> MarcRecord {
        MarcRecord::with_id(format!("raw-{id}").into_bytes(), "src".into(), id.into())
    }

    #[tokio::test]
    async fn flushes_on_max_batch() {
        let primary = Arc::new(FakeQueueClient::new(vec![]));
        let config = WorkerConfig {
            primary: primary.clone(),
            cache: None,
            data_source: None,
        };

        let (tx, handles) = spawn_workers(1, 100, config);
        for i in 0..MAX_BATCH {
            tx.send(record(&format!("u{i}"))).await.unwrap();
        }
        // give the worker a moment to drain and publish
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(tx);
        for h in handles {
            h.await.unwrap();
        }

        let published = primary.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].len(), MAX_BATCH);
    }

    #[tokio::test(start_paused = true)]
    async fn flushes_partial_batch_on_idle_timeout() {
        let primary = Arc::new(FakeQueueClient::new(vec![]));
        let config = WorkerConfig {
            primary: primary.clone(),
            cache: None,
            data_source: None,
        };

        let (tx, _handles) = spawn_workers(1, 100, config);
        tx.send(record("u1")).await.unwrap();

        tokio::time::advance(FLUSH_TIMEOUT + Duration::from_millis(1)).await;
        tokio::time::sleep(Duration::from_millis(1)).await;

        let published = primary.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].len(), 1);
    }

    #[tokio::test]
    async fn mirrors_to_cache_after_primary_succeeds() {
        let primary = Arc::new(FakeQueueClient::new(vec![]));
        let cache = Arc::new(FakeQueueClient::new(vec![]));
        let config = WorkerConfig {
            primary: primary.clone(),
            cache: Some(cache.clone()),
            data_source: None,
        };

        let (tx, handles) = spawn_workers(1, 100, config);
        for i in 0..MAX_BATCH {
            tx.send(record(&format!("u{i}"))).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(tx);
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(primary.published.lock().unwrap().len(), 1);
        assert_eq!(cache.published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn retries_only_failed_indices() {
        let primary = Arc::new(FakeQueueClient::new(vec![]));
        *primary.fail_next_indices.lock().unwrap() = vec![3, 7];

        let messages: Vec<OutboundMessage> = (0..MAX_BATCH)
            .map(|i| build_message(&record(&format!("u{i}")), None).unwrap())
            .collect();

        publish_with_retry(primary.as_ref(), &messages).await.unwrap();

        let published = primary.published.lock().unwrap();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].len(), MAX_BATCH);
        assert_eq!(published[1].len(), 2);
    }

    #[tokio::test]
    async fn exhausting_retries_surfaces_partial_failure() {
        let primary = FakeQueueClient::new(vec![]);
        // every attempt reports the single item as failed
        let messages = vec![build_message(&record("u1"), None).unwrap()];

        // FakeQueueClient only pre-programs one round of failures; to keep
        // failing every attempt we drive `publish_with_retry` against a
        // client that always reports index 0 as failed.
        struct AlwaysFails;
        #[async_trait::async_trait]
        impl QueueClient for AlwaysFails {
            async fn receive(
                &self,
                _: Duration,
            ) -> Result<Option<(Vec<marc_ingest_queue::BlobRef>, ReceiptToken)>, QueueError> {
                unreachable!()
            }
            async fn delete(&self, _: &ReceiptToken) -> Result<(), QueueError> {
                unreachable!()
            }
            async fn put_batch(&self, messages: &[OutboundMessage]) -> Result<Vec<usize>, QueueError> {
                Ok((0..messages.len()).collect())
            }
        }
        let _ = &primary;

        let err = publish_with_retry(&AlwaysFails, &messages).await.unwrap_err();
        assert!(matches!(err, QueueError::PartialFailure { .. }));
    }
}
