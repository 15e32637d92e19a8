//! Local adapters for single-host deployment.

pub mod fs;
pub mod redis;

pub use fs::FsAdapter;
pub use redis::{RedisJobSource, RedisPool};
