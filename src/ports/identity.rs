use crate::error::PipelineError;
use async_trait::async_trait;

/// Client identity exchanged for a bearer token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Obtain a short-lived bearer token. The token is opaque to the pipeline.
    async fn get_token(&self, credentials: &ClientCredentials) -> Result<String, PipelineError>;
}
