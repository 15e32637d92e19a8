use crate::error::QueueError;
use crate::ports::queue::{decode_job, Delivery, JobSource};
use async_trait::async_trait;
use aws_sdk_sqs::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Longest long-poll SQS accepts, in seconds.
const MAX_WAIT_SECONDS: u64 = 20;

/// SqsAdapter implements JobSource for AWS SQS.
/// A received message stays invisible for `visibility_timeout`, renewed while
/// its job runs, and is deleted by `complete`.
#[derive(Clone)]
pub struct SqsAdapter {
    client: Client,
    queue_url: String,
    visibility_timeout: Duration,
}

impl SqsAdapter {
    pub fn new(client: Client, queue_url: String, visibility_timeout: Duration) -> Self {
        Self {
            client,
            queue_url,
            visibility_timeout: visibility_timeout.max(Duration::from_secs(3)),
        }
    }

    fn visibility_secs(&self) -> i32 {
        self.visibility_timeout.as_secs().min(i32::MAX as u64) as i32
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl JobSource for SqsAdapter {
    async fn next_job(&self, timeout: Duration) -> Result<Option<Delivery>, QueueError> {
        let wait_time = timeout.as_secs().clamp(1, MAX_WAIT_SECONDS) as i32;
        let resp = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(1)
            .wait_time_seconds(wait_time)
            .visibility_timeout(self.visibility_secs())
            .send()
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;

        let Some(msg) = resp.messages.and_then(|m| m.into_iter().next()) else {
            return Ok(None);
        };
        let receipt = msg.receipt_handle().map(str::to_string);

        match decode_job(msg.body().unwrap_or_default()) {
            Ok(job) => Ok(Some(Delivery { job, receipt })),
            Err(e) => {
                warn!(error = %e, message_id = ?msg.message_id(), "Dropping undecodable message");
                if let Some(handle) = receipt {
                    self.delete(&handle).await?;
                }
                Ok(None)
            }
        }
    }

    async fn complete(&self, delivery: &Delivery) -> Result<(), QueueError> {
        match &delivery.receipt {
            Some(handle) => self.delete(handle).await,
            None => Ok(()),
        }
    }

    fn renewal_interval(&self) -> Option<Duration> {
        Some(self.visibility_timeout / 3)
    }

    async fn renew(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let Some(handle) = &delivery.receipt else {
            return Ok(());
        };
        self.client
            .change_message_visibility()
            .queue_url(&self.queue_url)
            .receipt_handle(handle)
            .visibility_timeout(self.visibility_secs())
            .send()
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        debug!(file_id = %delivery.job.file_id, "Message visibility extended");
        Ok(())
    }
}
