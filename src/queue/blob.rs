use std::path::Path;

use marc_ingest_queue::{BlobStore, QueueError};

/// A [`BlobStore`] backed by OpenDAL's S3 service. An `Operator` is rooted
/// at a single bucket, so one is built per download - notifications name
/// their own bucket and nothing in this pipeline assumes they all agree.
pub struct S3BlobStore {
    region: String,
}

impl S3BlobStore {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }

    fn operator_for(&self, bucket: &str) -> Result<opendal::Operator, opendal::Error> {
        let builder = opendal::services::S3::default()
            .bucket(bucket)
            .region(&self.region);
        Ok(opendal::Operator::new(builder)?.finish())
    }
}

fn transport(err: opendal::Error) -> QueueError {
    QueueError::Transport(Box::new(err))
}

#[async_trait::async_trait]
impl BlobStore for S3BlobStore {
    async fn get_to_file(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
    ) -> Result<u64, QueueError> {
        let operator = self.operator_for(bucket).map_err(transport)?;
        let buffer = operator.read(key).await.map_err(transport)?;
        let size = buffer.len() as u64;
        tokio::fs::write(local_path, buffer.to_vec()).await?;
        Ok(size)
    }
}
