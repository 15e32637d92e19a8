use crate::error::{PipelineError, RenditionError};
use async_trait::async_trait;
use std::path::Path;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoragePort: Send + Sync {
    /// Download the object behind a pre-authorized fetch URL to a local path
    async fn download(&self, fetch_url: &str, local_path: &Path) -> Result<(), PipelineError>;

    /// Upload a local file to `key`, overwriting any existing object.
    /// Returns the canonical remote locator of the uploaded object.
    async fn upload(&self, local_path: &Path, key: &str) -> Result<String, RenditionError>;
}
