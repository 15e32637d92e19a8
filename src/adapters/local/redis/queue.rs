//! Redis JobSource implementation.

use super::pool::RedisPool;
use super::PROCESSING_SUFFIX;
use crate::error::QueueError;
use crate::ports::queue::{decode_job, Delivery, JobSource};
use async_trait::async_trait;
use deadpool_redis::redis::{AsyncCommands, RedisError};
use std::time::Duration;
use tracing::warn;

#[derive(Clone)]
pub struct RedisJobSource {
    pool: RedisPool,
    queue_key: String,
    processing_key: String,
}

impl RedisJobSource {
    pub fn new(pool: RedisPool, queue_key: impl Into<String>) -> Self {
        let queue_key = queue_key.into();
        let processing_key = format!("{}{}", queue_key, PROCESSING_SUFFIX);
        Self {
            pool,
            queue_key,
            processing_key,
        }
    }

    async fn ack(&self, payload: &str) -> Result<(), QueueError> {
        let mut conn = self.pool.connection().await?;
        conn.lrem::<_, _, ()>(&self.processing_key, 1, payload)
            .await
            .map_err(backend)
    }
}

fn backend(err: RedisError) -> QueueError {
    QueueError::Backend(err.to_string())
}

#[async_trait]
impl JobSource for RedisJobSource {
    async fn next_job(&self, timeout: Duration) -> Result<Option<Delivery>, QueueError> {
        let mut conn = self.pool.connection().await?;

        // Producers LPUSH, so the oldest message sits on the right
        let payload: Option<String> = conn
            .brpoplpush(&self.queue_key, &self.processing_key, timeout.as_secs_f64())
            .await
            .map_err(backend)?;
        drop(conn);

        let Some(payload) = payload else {
            return Ok(None);
        };

        match decode_job(&payload) {
            Ok(job) => Ok(Some(Delivery {
                job,
                receipt: Some(payload),
            })),
            Err(e) => {
                warn!(error = %e, queue = %self.queue_key, "Dropping undecodable message");
                self.ack(&payload).await?;
                Ok(None)
            }
        }
    }

    async fn complete(&self, delivery: &Delivery) -> Result<(), QueueError> {
        match &delivery.receipt {
            Some(payload) => self.ack(payload).await,
            None => Ok(()),
        }
    }
}
