//! Local Worker Binary - Single-host deployment
//!
//! Wires up:
//! - Redis list as the job queue
//! - A local directory as the object store
//! - HTTP clients for the identity, file and metadata services
//! - The ffmpeg CLI as the transcoder

use std::time::Duration;
use tracing::{error, info};
use transcode_worker::adapters::ffmpeg::FfmpegTranscoder;
use transcode_worker::adapters::http::{
    build_client, BlobFetcher, FileServiceClient, IdentityClient, MetadataClient,
};
use transcode_worker::adapters::local::{FsAdapter, RedisJobSource, RedisPool};
use transcode_worker::config::{LocalConfig, WorkerConfig};
use transcode_worker::telemetry::init_tracing;
use transcode_worker::{PipelineSettings, StagingStore, TranscodePipeline, WorkerService};

const POLL_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    init_tracing();

    let config = match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    let local = LocalConfig::from_env();

    let (http, fetcher) = match build_client(config.http_timeout).and_then(|http| {
        let fetcher = BlobFetcher::new(config.download_idle_timeout, config.download_timeout)?;
        Ok((http, fetcher))
    }) {
        Ok(clients) => clients,
        Err(e) => {
            error!(error = %e, "Failed to build HTTP client");
            std::process::exit(1);
        }
    };

    let pool = match RedisPool::new(&local.redis_url) {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "Failed to connect to Redis");
            std::process::exit(1);
        }
    };

    let pipeline = TranscodePipeline::new(
        IdentityClient::new(http.clone(), &config.identity_base_url),
        FileServiceClient::new(http.clone(), &config.file_service_base_url),
        FsAdapter::new(&local.storage_dir, fetcher),
        FfmpegTranscoder::new(&config.transcoder_binary, config.transcode_timeout),
        MetadataClient::new(http, &config.metadata_base_url),
        StagingStore::new(&config.temp_root),
        PipelineSettings::from(&config),
    );

    let worker = WorkerService::new(
        RedisJobSource::new(pool, &local.queue_key),
        pipeline,
        config.max_concurrent_jobs,
        POLL_TIMEOUT,
    );

    info!(queue = %local.queue_key, storage = %local.storage_dir.display(), "Local worker ready");
    worker
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;
}
