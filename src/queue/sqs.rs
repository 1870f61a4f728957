use std::time::Duration;

use aws_sdk_sqs::types::MessageAttributeValue;
use marc_ingest_queue::{decode_blob_refs, Attribute, BlobRef, OutboundMessage, QueueClient, QueueError, ReceiptToken};

/// A [`QueueClient`] bound to a single SQS queue URL. The same type serves
/// as the inbound notification queue, the primary work queue, and the
/// optional cache queue - which operations are actually exercised depends
/// on which role the orchestrator hands the instance.
pub struct SqsQueueClient {
    client: aws_sdk_sqs::Client,
    queue_url: String,
}

impl SqsQueueClient {
    pub fn new(client: aws_sdk_sqs::Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }
}

fn transport(err: impl std::error::Error + Send + Sync + 'static) -> QueueError {
    QueueError::Transport(Box::new(err))
}

#[async_trait::async_trait]
impl QueueClient for SqsQueueClient {
    async fn receive(
        &self,
        poll_timeout: Duration,
    ) -> Result<Option<(Vec<BlobRef>, ReceiptToken)>, QueueError> {
        let response = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(1)
            .wait_time_seconds(poll_timeout.as_secs() as i32)
            .send()
            .await
            .map_err(transport)?;

        let Some(message) = response.messages().first() else {
            return Ok(None);
        };

        let body = message.body().unwrap_or_default();
        let refs = decode_blob_refs(body.as_bytes())?;
        let receipt = message.receipt_handle().ok_or_else(|| {
            transport(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "SQS message missing receipt handle",
            ))
        })?;

        Ok(Some((refs, ReceiptToken(receipt.to_string()))))
    }

    async fn delete(&self, receipt: &ReceiptToken) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(&receipt.0)
            .send()
            .await
            .map_err(transport)?;
        Ok(())
    }

    async fn put_batch(&self, messages: &[OutboundMessage]) -> Result<Vec<usize>, QueueError> {
        if messages.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self.client.send_message_batch().queue_url(&self.queue_url);
        for (i, message) in messages.iter().enumerate() {
            let mut entry = aws_sdk_sqs::types::SendMessageBatchRequestEntry::builder()
                .id(i.to_string())
                .message_body(&message.payload);
            for attribute in &message.attributes {
                entry = entry.message_attributes(attribute.name, attribute_value(attribute)?);
            }
            let entry = entry.build().map_err(transport)?;
            request = request.entries(entry);
        }

        let response = request.send().await.map_err(transport)?;

        let failed_indices = response
            .failed()
            .iter()
            .filter_map(|entry| entry.id().parse::<usize>().ok())
            .collect();

        Ok(failed_indices)
    }
}

fn attribute_value(attribute: &Attribute) -> Result<MessageAttributeValue, QueueError> {
    MessageAttributeValue::builder()
        .data_type("String")
        .string_value(&attribute.value)
        .build()
        .map_err(transport)
}
