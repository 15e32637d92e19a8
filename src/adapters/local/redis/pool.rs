//! Redis connection pool.

use crate::error::QueueError;
use deadpool_redis::{Config, Connection, Pool, Runtime};

#[derive(Clone)]
pub struct RedisPool {
    pool: Pool,
}

impl RedisPool {
    /// Create a new RedisPool with connection pool.
    pub fn new(redis_url: &str) -> Result<Self, QueueError> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| QueueError::Backend(format!("create pool: {}", e)))?;
        Ok(Self { pool })
    }

    pub(super) async fn connection(&self) -> Result<Connection, QueueError> {
        self.pool
            .get()
            .await
            .map_err(|e| QueueError::Backend(format!("pool: {}", e)))
    }
}
