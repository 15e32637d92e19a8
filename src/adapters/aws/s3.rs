use crate::adapters::http::blob::BlobFetcher;
use crate::config::StorageConfig;
use crate::error::{PipelineError, RenditionError};
use crate::ports::storage::StoragePort;
use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Builder, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::Path;
use tracing::debug;

/// S3Adapter implements StoragePort for S3-compatible object stores.
/// Reads go through the pre-authorized fetch URL; writes go to the configured container.
#[derive(Clone)]
pub struct S3Adapter {
    client: Client,
    fetcher: BlobFetcher,
    bucket: String,
    public_base_url: String,
}

impl S3Adapter {
    pub fn new(client: Client, fetcher: BlobFetcher, bucket: String, public_base_url: String) -> Self {
        Self {
            client,
            fetcher,
            bucket,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build the SDK client from the account configured for the worker.
    pub fn from_config(storage: &StorageConfig, fetcher: BlobFetcher) -> Self {
        let credentials = Credentials::new(
            &storage.account_name,
            &storage.account_key,
            None,
            None,
            "static",
        );

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(storage.region.clone()))
            .endpoint_url(&storage.endpoint_url)
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        let public_base_url = storage.public_base_url.clone().unwrap_or_else(|| {
            format!(
                "{}/{}",
                storage.endpoint_url.trim_end_matches('/'),
                storage.container
            )
        });

        Self::new(
            Client::from_conf(config),
            fetcher,
            storage.container.clone(),
            public_base_url,
        )
    }

    pub fn locator(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("m3u8") => "application/vnd.apple.mpegurl",
        Some("ts") => "video/mp2t",
        Some("mp4") | Some("m4s") => "video/mp4",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl StoragePort for S3Adapter {
    async fn download(&self, fetch_url: &str, local_path: &Path) -> Result<(), PipelineError> {
        self.fetcher.fetch_to_file(fetch_url, local_path).await
    }

    async fn upload(&self, local_path: &Path, key: &str) -> Result<String, RenditionError> {
        let body = ByteStream::from_path(local_path).await.map_err(|e| {
            RenditionError::publish(format!("failed to read {}: {}", local_path.display(), e))
        })?;

        // put_object replaces any existing object under the key
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type(local_path))
            .body(body)
            .send()
            .await
            .map_err(|e| RenditionError::publish(format!("put {} failed: {}", key, e)))?;

        debug!(%key, "Uploaded object");
        Ok(self.locator(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_content_types() {
        assert_eq!(
            content_type(&PathBuf::from("a/playlist.m3u8")),
            "application/vnd.apple.mpegurl"
        );
        assert_eq!(content_type(&PathBuf::from("segment_000.ts")), "video/mp2t");
        assert_eq!(content_type(&PathBuf::from("notes")), "application/octet-stream");
    }

    #[test]
    fn test_locator_defaults_to_endpoint_and_container() {
        let storage = StorageConfig {
            account_name: "key".to_string(),
            account_key: "secret".to_string(),
            container: "videos".to_string(),
            endpoint_url: "http://127.0.0.1:9000/".to_string(),
            region: "us-east-1".to_string(),
            public_base_url: None,
        };
        let adapter = S3Adapter::from_config(
            &storage,
            BlobFetcher::with_client(
                reqwest::Client::new(),
                Duration::from_secs(5),
                Duration::from_secs(60),
            ),
        );

        assert_eq!(
            adapter.locator("users/42/movie-360p/playlist.m3u8"),
            "http://127.0.0.1:9000/videos/users/42/movie-360p/playlist.m3u8"
        );
    }
}
