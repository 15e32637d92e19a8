use crate::error::PipelineError;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FetchLocator: Send + Sync {
    /// Exchange a logical blob path for a temporary, directly fetchable URL.
    async fn resolve_fetch_url(
        &self,
        token: &str,
        logical_path: &str,
    ) -> Result<String, PipelineError>;
}
