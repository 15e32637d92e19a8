use crate::error::RenditionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Record registered with the metadata service for one published rendition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RenditionRecord {
    pub streaming_path: String,
    pub file_id: String,
    #[serde(rename = "Type")]
    pub format: String,
    pub resolution: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataNotifier: Send + Sync {
    /// Report a rendition as ready. The acknowledgement body is not validated.
    async fn notify_rendition_ready(
        &self,
        token: &str,
        record: &RenditionRecord,
    ) -> Result<(), RenditionError>;
}
