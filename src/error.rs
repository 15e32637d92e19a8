//! Error types for the transcoding pipeline.
//!
//! Errors are split along the pipeline's failure boundary: [`PipelineError`]
//! aborts a whole job, [`RenditionError`] only aborts one rendition.

use std::path::PathBuf;
use thiserror::Error;

/// Job-fatal failures. Any of these ends the job before a rendition is tried.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Fetch URL resolution failed: {0}")]
    Resolve(String),

    #[error("Staging failed at {}: {source}", path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Download failed: {0}")]
    Download(String),
}

impl PipelineError {
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    pub fn resolve(msg: impl Into<String>) -> Self {
        Self::Resolve(msg.into())
    }

    pub fn staging(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Staging {
            path: path.into(),
            source,
        }
    }

    pub fn download(msg: impl Into<String>) -> Self {
        Self::Download(msg.into())
    }

    /// Name of the stage that failed, for structured logs.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Auth(_) => "authenticate",
            PipelineError::Resolve(_) => "resolve_locator",
            PipelineError::Staging { .. } => "stage",
            PipelineError::Download(_) => "download",
        }
    }
}

/// Rendition-fatal failures. Logged, then the next rendition proceeds.
#[derive(Debug, Error)]
pub enum RenditionError {
    #[error("Transcode failed: {0}")]
    Transcode(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("No manifest found in {}", .0.display())]
    MissingManifest(PathBuf),

    #[error("Metadata notification failed: {0}")]
    Notify(String),
}

impl RenditionError {
    pub fn publish(msg: impl Into<String>) -> Self {
        Self::Publish(msg.into())
    }

    pub fn notify(msg: impl Into<String>) -> Self {
        Self::Notify(msg.into())
    }

    pub fn stage(&self) -> &'static str {
        match self {
            RenditionError::Transcode(_) => "transcode",
            RenditionError::Publish(_) | RenditionError::MissingManifest(_) => "publish",
            RenditionError::Notify(_) => "notify",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} env var required")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue backend error: {0}")]
    Backend(String),

    #[error("Message could not be decoded: {0}")]
    Decode(String),
}
