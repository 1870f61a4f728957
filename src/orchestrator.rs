//! Drives one inbound notification at a time: download every referenced
//! blob, validate all of them before acting on any, ack (or silently
//! drop) the notification, then stream records into the worker pool.
//!
//! Ordering: blobs within one notification are processed strictly in the
//! order the notification lists them; records within a file strictly in
//! read order. Any error encountered after validation has already
//! declared a file good is treated as infrastructural and is fatal to
//! the process - there is no partial-recovery path once a file is
//! committed to streaming.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use marc_ingest_core::{MarcError, MarcRecord, RecordLoader};
use marc_ingest_queue::{receive_notification, BlobRef, BlobStore, QueueClient, QueueError};
use tokio::sync::mpsc;

use crate::scratch::ScratchFile;

pub struct Orchestrator {
    pub inbound: Arc<dyn QueueClient>,
    pub blobs: Arc<dyn BlobStore>,
    pub download_dir: PathBuf,
    pub data_source: Option<String>,
}

impl Orchestrator {
    /// Runs the main loop indefinitely. Only returns on a fatal error;
    /// the caller is expected to log it and exit the process.
    pub async fn run(&self, sender: mpsc::Sender<MarcRecord>, poll_timeout: Duration) -> Result<()> {
        loop {
            self.process_one_notification(&sender, poll_timeout).await?;
        }
    }

    async fn process_one_notification(
        &self,
        sender: &mpsc::Sender<MarcRecord>,
        poll_timeout: Duration,
    ) -> Result<()> {
        let (refs, receipt) = receive_notification(self.inbound.as_ref(), poll_timeout)
            .await
            .context("receiving inbound notification")?;

        let mut validated: Vec<(ScratchFile, BlobRef)> = Vec::new();
        let mut poisoned = false;

        for blob_ref in refs {
            if blob_ref.size == 0 {
                tracing::info!(bucket = %blob_ref.bucket, key = %blob_ref.key, "skipping zero-size blob reference");
                continue;
            }

            let scratch = match self.download(&blob_ref).await {
                Ok(scratch) => scratch,
                // A short download is a validation failure for this blob:
                // poison the notification and let it redeliver.
                Err(e @ QueueError::SizeMismatch { .. }) => {
                    tracing::warn!(
                        bucket = %blob_ref.bucket, key = %blob_ref.key, error = %e,
                        "download size mismatch, poisoning notification"
                    );
                    poisoned = true;
                    break;
                }
                // Anything else out of the blob SDK is a transport error,
                // not a validation outcome: surfaced immediately, fatal to
                // the process.
                Err(e) => {
                    for (scratch, _) in validated {
                        scratch.remove();
                    }
                    return Err(e).with_context(|| {
                        format!(
                            "downloading blob {}/{}",
                            blob_ref.bucket, blob_ref.key
                        )
                    });
                }
            };

            let source = self.source_for(&blob_ref);
            let mut loader =
                RecordLoader::open(scratch.path(), source).context("opening downloaded scratch file")?;
            let validation = loader.validate();
            loader.done();

            if let Err(e) = validation {
                tracing::warn!(
                    bucket = %blob_ref.bucket, key = %blob_ref.key, error = %e,
                    "validation failed, poisoning notification"
                );
                poisoned = true;
                scratch.remove();
                break;
            }

            validated.push((scratch, blob_ref));
        }

        if poisoned {
            for (scratch, _) in validated {
                scratch.remove();
            }
            tracing::warn!("notification poisoned, left unacked for redelivery");
            return Ok(());
        }

        self.inbound
            .delete(&receipt)
            .await
            .context("deleting inbound notification")?;

        for (scratch, blob_ref) in validated {
            self.stream_file(&scratch, &blob_ref, sender).await?;
            scratch.remove();
        }

        Ok(())
    }

    async fn download(&self, blob_ref: &BlobRef) -> Result<ScratchFile, QueueError> {
        let scratch = ScratchFile::reserve(&self.download_dir, &blob_ref.key);
        let actual = self
            .blobs
            .get_to_file(&blob_ref.bucket, &blob_ref.key, scratch.path())
            .await?;

        if actual != blob_ref.size as u64 {
            return Err(QueueError::SizeMismatch {
                expected: blob_ref.size,
                actual,
            });
        }

        Ok(scratch)
    }

    fn source_for(&self, blob_ref: &BlobRef) -> String {
        self.data_source
            .clone()
            .unwrap_or_else(|| format!("s3://{}/{}", blob_ref.bucket, blob_ref.key))
    }

    async fn stream_file(
        &self,
        scratch: &ScratchFile,
        blob_ref: &BlobRef,
        sender: &mpsc::Sender<MarcRecord>,
    ) -> Result<()> {
        let source = self.source_for(blob_ref);
        let mut loader =
            RecordLoader::open(scratch.path(), source).context("reopening validated scratch file")?;

        let mut next = loader.first(true);
        loop {
            let record = match next {
                Ok(record) => record,
                Err(MarcError::Eof) => break,
                Err(e) => {
                    return Err(e).context("fatal error streaming a previously-validated file");
                }
            };

            next = loader.next(true);

            sender
                .send(record)
                .await
                .map_err(|_| anyhow::anyhow!("worker channel closed while streaming records"))?;
        }

        loader.done();
        Ok(())
    }
}
