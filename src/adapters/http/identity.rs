use crate::error::PipelineError;
use crate::ports::identity::{ClientCredentials, CredentialProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
}

/// Identity service client: `POST /api/login/getClientToken`.
#[derive(Clone, Debug)]
pub struct IdentityClient {
    client: Client,
    base_url: String,
}

impl IdentityClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for IdentityClient {
    async fn get_token(&self, credentials: &ClientCredentials) -> Result<String, PipelineError> {
        let url = format!("{}/api/login/getClientToken", self.base_url);
        debug!(%url, client_id = %credentials.client_id, "Requesting client token");

        let response = self
            .client
            .post(&url)
            .json(&TokenRequest {
                client_id: &credentials.client_id,
                client_secret: &credentials.client_secret,
            })
            .send()
            .await
            .map_err(|e| PipelineError::auth(format!("identity service unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::auth(format!(
                "identity service returned {}",
                status
            )));
        }

        response
            .text()
            .await
            .map_err(|e| PipelineError::auth(format!("failed to read token: {}", e)))
    }
}
