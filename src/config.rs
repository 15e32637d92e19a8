//! Configuration for different deployment environments.

use crate::domain::renditions::RenditionSpec;
use crate::error::ConfigError;
use crate::ports::identity::ClientCredentials;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Object store account, shared by every deployment.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Storage account name (access key id for S3-compatible stores)
    pub account_name: String,
    /// Storage account key (secret access key for S3-compatible stores)
    pub account_key: String,
    /// Container (bucket) receiving renditions
    pub container: String,
    /// Object store endpoint
    pub endpoint_url: String,
    pub region: String,
    /// Base of the locators returned to the metadata service.
    /// Defaults to `{endpoint_url}/{container}`.
    pub public_base_url: Option<String>,
}

/// Pipeline configuration, built once at process start.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub credentials: ClientCredentials,
    pub identity_base_url: String,
    pub file_service_base_url: String,
    pub metadata_base_url: String,
    pub storage: StorageConfig,
    /// Root under which job workspaces are staged
    pub temp_root: PathBuf,
    pub renditions: Vec<RenditionSpec>,
    /// Value sent as `Type` to the metadata service
    pub format_tag: String,
    pub transcoder_binary: String,
    pub transcode_timeout: Duration,
    /// Bound on each service call
    pub http_timeout: Duration,
    /// A source download fails after this long without receiving data
    pub download_idle_timeout: Duration,
    /// Upper bound on a whole source download
    pub download_timeout: Duration,
    pub max_concurrent_jobs: usize,
    pub max_parallel_renditions: usize,
    /// Keep the workspace of a job that failed before any rendition ran
    pub retain_failed_workspaces: bool,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let api_base_url = env::var("API_BASE_URL").ok();
        let service_url = |key: &'static str| -> Result<String, ConfigError> {
            env::var(key)
                .ok()
                .or_else(|| api_base_url.clone())
                .map(|url| url.trim_end_matches('/').to_string())
                .ok_or(ConfigError::Missing(key))
        };

        let renditions = match env::var("RENDITIONS") {
            Ok(raw) => RenditionSpec::parse_ladder(&raw)?,
            Err(_) => RenditionSpec::default_ladder(),
        };

        Ok(Self {
            credentials: ClientCredentials {
                client_id: required("CLIENT_ID")?,
                client_secret: required("CLIENT_SECRET")?,
            },
            identity_base_url: service_url("IDENTITY_BASE_URL")?,
            file_service_base_url: service_url("FILE_SERVICE_BASE_URL")?,
            metadata_base_url: service_url("METADATA_BASE_URL")?,
            storage: StorageConfig {
                account_name: required("STORAGE_ACCOUNT_NAME")?,
                account_key: required("STORAGE_ACCOUNT_KEY")?,
                container: required("STORAGE_CONTAINER")?,
                endpoint_url: env::var("STORAGE_ENDPOINT_URL")
                    .unwrap_or_else(|_| String::from("http://127.0.0.1:9000")),
                region: env::var("STORAGE_REGION").unwrap_or_else(|_| String::from("us-east-1")),
                public_base_url: env::var("STORAGE_PUBLIC_BASE_URL").ok(),
            },
            temp_root: env::var("TEMP_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir()),
            renditions,
            format_tag: env::var("FORMAT_TAG").unwrap_or_else(|_| String::from("m3u8")),
            transcoder_binary: env::var("TRANSCODER_BINARY")
                .unwrap_or_else(|_| String::from("ffmpeg")),
            transcode_timeout: Duration::from_secs(parsed("TRANSCODE_TIMEOUT_SECS", 3600)?),
            http_timeout: Duration::from_secs(parsed("HTTP_TIMEOUT_SECS", 60)?),
            download_idle_timeout: Duration::from_secs(parsed("DOWNLOAD_IDLE_TIMEOUT_SECS", 60)?),
            download_timeout: Duration::from_secs(parsed("DOWNLOAD_TIMEOUT_SECS", 4 * 3600)?),
            max_concurrent_jobs: parsed("MAX_CONCURRENT_JOBS", 2)?,
            max_parallel_renditions: parsed("MAX_PARALLEL_RENDITIONS", 1)?,
            retain_failed_workspaces: parsed("RETAIN_FAILED_WORKSPACES", false)?,
        })
    }
}

/// Configuration for local/monolith deployment.
#[cfg(feature = "local")]
#[derive(Clone, Debug)]
pub struct LocalConfig {
    /// Redis connection URL
    pub redis_url: String,
    /// Redis list the upload service pushes job messages to
    pub queue_key: String,
    /// Directory acting as the object store
    pub storage_dir: PathBuf,
}

#[cfg(feature = "local")]
impl LocalConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| String::from("redis://127.0.0.1/")),
            queue_key: env::var("QUEUE_KEY").unwrap_or_else(|_| String::from("transcode-queue")),
            storage_dir: env::var("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./storage")),
        }
    }
}

/// Configuration for AWS deployment.
#[cfg(feature = "aws")]
#[derive(Clone, Debug)]
pub struct AwsConfig {
    /// SQS queue URL for job messages
    pub sqs_queue_url: String,
    /// Visibility timeout applied on receipt and renewed while the job runs
    pub visibility_timeout: Duration,
}

#[cfg(feature = "aws")]
impl AwsConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        Ok(Self {
            sqs_queue_url: required("SQS_QUEUE_URL")?,
            visibility_timeout: Duration::from_secs(parsed("SQS_VISIBILITY_TIMEOUT_SECS", 300)?),
        })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn parsed<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsed_falls_back_to_default() {
        let value: u64 = parsed("TRANSCODE_WORKER_TEST_UNSET_KEY", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parsed_rejects_invalid_value() {
        env::set_var("TRANSCODE_WORKER_TEST_BAD_NUMBER", "many");
        let result: Result<usize, _> = parsed("TRANSCODE_WORKER_TEST_BAD_NUMBER", 1);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_required_reports_key() {
        let err = required("TRANSCODE_WORKER_TEST_MISSING").unwrap_err();
        assert_eq!(err.to_string(), "TRANSCODE_WORKER_TEST_MISSING env var required");
    }
}
