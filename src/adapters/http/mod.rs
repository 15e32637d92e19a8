//! HTTP clients for the identity, file and metadata services.

pub mod blob;
pub mod file_service;
pub mod identity;
pub mod metadata;

pub use blob::BlobFetcher;
pub use file_service::FileServiceClient;
pub use identity::IdentityClient;
pub use metadata::MetadataClient;

use reqwest::Client;
use std::time::Duration;

/// Client for the service calls. Every request made through it is bounded by `timeout`;
/// source downloads use [`BlobFetcher`] instead.
pub fn build_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .build()
}
