//! `marc-ingest`: turns notifications of newly uploaded MARC batches into
//! individually addressable, tagged messages on downstream work queues.
//!
//! Process startup, AWS client construction, and configuration loading are
//! all this binary does; the actual pipeline lives in the
//! `marc-ingest-core`, `marc-ingest-queue`, and `marc-ingest-batch` crates.

mod init;
mod orchestrator;
mod queue;
mod scratch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use marc_ingest_batch::{spawn_workers, WorkerConfig};
use marc_ingest_config::RuntimeConfig;
use marc_ingest_queue::{BlobStore, QueueClient};

use orchestrator::Orchestrator;
use queue::{S3BlobStore, SqsQueueClient};

#[tokio::main]
async fn main() -> Result<()> {
    init::init_tracing();

    let config = RuntimeConfig::load().context("loading configuration")?;
    init::log_startup_banner(&config);

    std::fs::create_dir_all(&config.download_dir)
        .with_context(|| format!("creating download directory {}", config.download_dir))?;

    let aws_config = aws_config::from_env().load().await;
    let region = aws_config
        .region()
        .map(|r| r.as_ref().to_string())
        .context("AWS region could not be resolved from the environment")?;
    let sqs_client = aws_sdk_sqs::Client::new(&aws_config);

    let inbound: Arc<dyn QueueClient> =
        Arc::new(SqsQueueClient::new(sqs_client.clone(), config.in_queue.as_str()));
    let primary: Arc<dyn QueueClient> =
        Arc::new(SqsQueueClient::new(sqs_client.clone(), config.out_queue.as_str()));
    let cache: Option<Arc<dyn QueueClient>> = config.cache_queue.as_deref().map(|queue| {
        Arc::new(SqsQueueClient::new(sqs_client.clone(), queue)) as Arc<dyn QueueClient>
    });
    let blobs: Arc<dyn BlobStore> = Arc::new(S3BlobStore::new(region));

    let orchestrator = Orchestrator {
        inbound,
        blobs,
        download_dir: PathBuf::from(&config.download_dir),
        data_source: config.data_source.clone(),
    };

    let worker_config = WorkerConfig {
        primary,
        cache,
        data_source: config.data_source.clone(),
    };
    let (sender, workers) = spawn_workers(config.workers, config.work_queue_size, worker_config);

    let result = orchestrator.run(sender, config.poll_timeout).await;

    for handle in workers {
        handle.abort();
    }

    if let Err(e) = result {
        tracing::error!(error = %e, "orchestrator terminated fatally");
        std::process::exit(1);
    }

    Ok(())
}
