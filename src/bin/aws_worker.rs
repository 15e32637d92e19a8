//! AWS Worker Binary
//!
//! Long-running worker that:
//! 1. Long-polls SQS for "video uploaded" messages.
//! 2. Runs each job through the transcoding pipeline, publishing renditions to S3.
//!
//! Environment Variables (besides the shared worker configuration):
//! - SQS_QUEUE_URL: SQS queue URL for jobs
//! - AWS_REGION and the usual credential chain, for SQS

use std::time::Duration;
use tracing::{error, info};
use transcode_worker::adapters::aws::{S3Adapter, SqsAdapter};
use transcode_worker::adapters::ffmpeg::FfmpegTranscoder;
use transcode_worker::adapters::http::{
    build_client, BlobFetcher, FileServiceClient, IdentityClient, MetadataClient,
};
use transcode_worker::config::{AwsConfig, WorkerConfig};
use transcode_worker::telemetry::init_tracing;
use transcode_worker::{PipelineSettings, StagingStore, TranscodePipeline, WorkerService};

const POLL_TIMEOUT: Duration = Duration::from_secs(20);

#[tokio::main]
async fn main() {
    init_tracing();

    let (config, aws) = match WorkerConfig::from_env().and_then(|c| Ok((c, AwsConfig::from_env()?))) {
        Ok(configs) => configs,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

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

    let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let sqs_client = aws_sdk_sqs::Client::new(&sdk_config);

    let pipeline = TranscodePipeline::new(
        IdentityClient::new(http.clone(), &config.identity_base_url),
        FileServiceClient::new(http.clone(), &config.file_service_base_url),
        S3Adapter::from_config(&config.storage, fetcher),
        FfmpegTranscoder::new(&config.transcoder_binary, config.transcode_timeout),
        MetadataClient::new(http, &config.metadata_base_url),
        StagingStore::new(&config.temp_root),
        PipelineSettings::from(&config),
    );

    let worker = WorkerService::new(
        SqsAdapter::new(sqs_client, aws.sqs_queue_url.clone(), aws.visibility_timeout),
        pipeline,
        config.max_concurrent_jobs,
        POLL_TIMEOUT,
    );

    info!(queue = %aws.sqs_queue_url, bucket = %config.storage.container, "AWS worker ready");
    worker
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;
}
