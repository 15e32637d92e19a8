use crate::error::PipelineError;
use crate::ports::locator::FetchLocator;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

/// File service client: `GET /api/file/getSASUrl`.
#[derive(Clone, Debug)]
pub struct FileServiceClient {
    client: Client,
    base_url: String,
}

impl FileServiceClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl FetchLocator for FileServiceClient {
    async fn resolve_fetch_url(
        &self,
        token: &str,
        logical_path: &str,
    ) -> Result<String, PipelineError> {
        let url = format!(
            "{}/api/file/getSASUrl?filePath={}",
            self.base_url,
            urlencoding::encode(logical_path)
        );
        debug!(%logical_path, "Resolving fetch URL");

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| PipelineError::resolve(format!("file service unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::resolve(format!(
                "file service returned {} for {}",
                status, logical_path
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::resolve(format!("failed to read fetch URL: {}", e)))?;

        let fetch_url = body.trim().trim_matches('"').to_string();
        if fetch_url.is_empty() {
            return Err(PipelineError::resolve(format!(
                "file service returned an empty URL for {}",
                logical_path
            )));
        }
        Ok(fetch_url)
    }
}
