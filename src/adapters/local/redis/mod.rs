//! Redis adapter for local deployment.
//!
//! Jobs are moved atomically from the queue list to a processing list when
//! received, and removed from the processing list once the job has ended.
//! A worker that dies mid-job leaves its message in the processing list.

mod pool;
mod queue;

pub use pool::RedisPool;
pub use queue::RedisJobSource;

/// Suffix of the list holding messages whose job is still running
const PROCESSING_SUFFIX: &str = ":processing";
