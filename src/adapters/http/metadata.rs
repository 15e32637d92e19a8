use crate::error::RenditionError;
use crate::ports::metadata::{MetadataNotifier, RenditionRecord};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

/// Metadata service client: `POST /api/file/StorePlaylistFile`.
#[derive(Clone, Debug)]
pub struct MetadataClient {
    client: Client,
    base_url: String,
}

impl MetadataClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl MetadataNotifier for MetadataClient {
    async fn notify_rendition_ready(
        &self,
        token: &str,
        record: &RenditionRecord,
    ) -> Result<(), RenditionError> {
        let url = format!("{}/api/file/StorePlaylistFile", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(record)
            .send()
            .await
            .map_err(|e| RenditionError::notify(format!("metadata service unreachable: {}", e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(RenditionError::notify(format!(
                "metadata service returned {}: {}",
                status, body
            )));
        }

        debug!(resolution = %record.resolution, ack = %body, "Metadata service acknowledged");
        Ok(())
    }
}
