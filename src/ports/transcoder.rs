use crate::domain::renditions::Dimensions;
use async_trait::async_trait;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeRequest {
    pub input: PathBuf,
    pub output_manifest: PathBuf,
    pub dimensions: Dimensions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscodeOutcome {
    Success,
    /// Non-zero exit, spawn failure or timeout, with the diagnostic text.
    Failure(String),
}

impl TranscodeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TranscodeOutcome::Success)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscoderRunner: Send + Sync {
    /// Run the external transcoder once. Never errors: failures are an outcome.
    async fn transcode(&self, request: &TranscodeRequest) -> TranscodeOutcome;
}
