use crate::domain::jobs::JobDescriptor;
use crate::error::QueueError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::time::Duration;

/// A decoded job together with whatever the backend needs to acknowledge it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub job: JobDescriptor,
    pub receipt: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Wait up to `timeout` for the next job.
    /// Messages that cannot be decoded are acknowledged and skipped by the adapter.
    async fn next_job(&self, timeout: Duration) -> Result<Option<Delivery>, QueueError>;

    /// Acknowledge a delivery once its job has ended.
    async fn complete(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// How often a running job's delivery must be renewed, for backends
    /// that redeliver unacknowledged messages after a timeout.
    fn renewal_interval(&self) -> Option<Duration> {
        None
    }

    /// Keep a delivery hidden from other consumers while its job runs.
    async fn renew(&self, _delivery: &Delivery) -> Result<(), QueueError> {
        Ok(())
    }
}

/// Decode a queue message body. Upload services publish either raw JSON
/// or base64-encoded JSON, both are accepted.
pub fn decode_job(body: &str) -> Result<JobDescriptor, QueueError> {
    let body = body.trim();
    if body.starts_with('{') {
        return serde_json::from_str(body).map_err(|e| QueueError::Decode(e.to_string()));
    }

    let bytes = STANDARD
        .decode(body)
        .map_err(|e| QueueError::Decode(format!("neither JSON nor base64: {}", e)))?;
    serde_json::from_slice(&bytes).map_err(|e| QueueError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &str = r#"{"UserId":"42","FileId":"abc","BlobUri":"https://store.example/videos/users/42/movie.mp4","FileName":"movie","FileExtension":".mp4","BlobName":"users/42/movie.mp4"}"#;

    #[test]
    fn test_decode_raw_json() {
        let job = decode_job(MESSAGE).unwrap();
        assert_eq!(job.file_id, "abc");
    }

    #[test]
    fn test_decode_base64_json() {
        let encoded = STANDARD.encode(MESSAGE);
        let job = decode_job(&encoded).unwrap();
        assert_eq!(job.blob_name, "users/42/movie.mp4");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_job("not a job!"), Err(QueueError::Decode(_))));
        assert!(matches!(decode_job(r#"{"FileId":1}"#), Err(QueueError::Decode(_))));
    }
}
