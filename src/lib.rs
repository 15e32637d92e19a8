//! Transcode Worker - Queue-driven multi-rendition video transcoding
//!
//! Hexagonal Architecture:
//! - domain/: Pure business logic (jobs, renditions)
//! - ports/: Trait definitions
//! - adapters/: Concrete implementations (HTTP services, ffmpeg, storage, queues)
//! - application/: Generic services (staging, publisher, pipeline, worker)
//! - config: Environment configuration
//!
//! # Features
//! - `local`: Single-host deployment (Redis queue, filesystem storage)
//! - `aws`: Cloud deployment (SQS queue, S3-compatible storage)

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod telemetry;

// Re-exports for convenience
pub use application::pipeline::{PipelineSettings, TranscodePipeline};
pub use application::staging::StagingStore;
pub use application::worker::WorkerService;
pub use config::WorkerConfig;
pub use error::{ConfigError, PipelineError, QueueError, RenditionError};

#[cfg(feature = "aws")]
pub use config::AwsConfig;

#[cfg(feature = "local")]
pub use config::LocalConfig;
