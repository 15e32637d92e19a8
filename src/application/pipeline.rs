//! Per-job transcoding pipeline.
//!
//! Stages run strictly in order: authenticate, resolve the fetch URL, stage,
//! download. A failure in any of them ends the job before a rendition is
//! tried. Each rendition then runs transcode, publish and notify on its own;
//! its failure is logged and the other renditions carry on. The workspace is
//! released exactly once whichever way the job ends.

use crate::application::publisher::publish_rendition;
use crate::application::staging::{StagingStore, Workspace};
use crate::config::WorkerConfig;
use crate::domain::jobs::{JobDescriptor, JobReport, RenditionResult};
use crate::domain::renditions::{RenditionSpec, MANIFEST_NAME};
use crate::error::{PipelineError, RenditionError};
use crate::ports::identity::{ClientCredentials, CredentialProvider};
use crate::ports::locator::FetchLocator;
use crate::ports::metadata::{MetadataNotifier, RenditionRecord};
use crate::ports::storage::StoragePort;
use crate::ports::transcoder::{TranscodeOutcome, TranscodeRequest, TranscoderRunner};
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// The part of [`WorkerConfig`] the pipeline reads.
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub credentials: ClientCredentials,
    pub renditions: Vec<RenditionSpec>,
    pub format_tag: String,
    pub max_parallel_renditions: usize,
    pub retain_failed_workspaces: bool,
}

impl From<&WorkerConfig> for PipelineSettings {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            credentials: config.credentials.clone(),
            renditions: config.renditions.clone(),
            format_tag: config.format_tag.clone(),
            max_parallel_renditions: config.max_parallel_renditions,
            retain_failed_workspaces: config.retain_failed_workspaces,
        }
    }
}

pub struct TranscodePipeline<C, L, S, T, N> {
    identity: C,
    locator: L,
    storage: S,
    transcoder: T,
    notifier: N,
    staging: StagingStore,
    settings: PipelineSettings,
}

impl<C, L, S, T, N> TranscodePipeline<C, L, S, T, N>
where
    C: CredentialProvider,
    L: FetchLocator,
    S: StoragePort,
    T: TranscoderRunner,
    N: MetadataNotifier,
{
    pub fn new(
        identity: C,
        locator: L,
        storage: S,
        transcoder: T,
        notifier: N,
        staging: StagingStore,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            identity,
            locator,
            storage,
            transcoder,
            notifier,
            staging,
            settings,
        }
    }

    /// Run one job to completion.
    pub async fn run(&self, job: &JobDescriptor) -> Result<JobReport, PipelineError> {
        let span = info_span!("job", run_id = %Uuid::new_v4(), file_id = %job.file_id);

        async {
            let result = self.execute(job).await;
            match &result {
                Ok(report) => info!(
                    succeeded = report.succeeded(),
                    failed = report.failed(),
                    "Job finished"
                ),
                Err(e) => error!(stage = e.stage(), error = %e, "Job aborted"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, job: &JobDescriptor) -> Result<JobReport, PipelineError> {
        info!(blob = %job.blob_name, user_id = %job.user_id, "Job received");

        let token = self.identity.get_token(&self.settings.credentials).await?;
        let fetch_url = self
            .locator
            .resolve_fetch_url(&token, &job.blob_name)
            .await?;
        let workspace = self.staging.prepare(job).await?;

        if let Err(e) = self
            .storage
            .download(&fetch_url, workspace.source_path())
            .await
        {
            self.abandon(workspace).await;
            return Err(e);
        }

        let parallelism = self.settings.max_parallel_renditions.max(1);
        // Collected first: mapping lazily inside the stream makes the job future non-Send
        let pending: Vec<_> = self
            .settings
            .renditions
            .iter()
            .map(|spec| self.render(job, &token, &workspace, spec))
            .collect();
        let renditions: Vec<RenditionResult> =
            stream::iter(pending).buffered(parallelism).collect().await;

        workspace.teardown().await;

        Ok(JobReport {
            file_id: job.file_id.clone(),
            renditions,
        })
    }

    async fn abandon(&self, workspace: Workspace) {
        if self.settings.retain_failed_workspaces {
            workspace.retain();
        } else {
            workspace.teardown().await;
        }
    }

    async fn render(
        &self,
        job: &JobDescriptor,
        token: &str,
        workspace: &Workspace,
        spec: &RenditionSpec,
    ) -> RenditionResult {
        let span = info_span!("rendition", label = %spec.label);

        async {
            let mut result = RenditionResult {
                label: spec.label.clone(),
                success: false,
                output_dir: PathBuf::new(),
                manifest_name: MANIFEST_NAME.to_string(),
                locator: None,
            };

            match self.render_stages(job, token, workspace, spec, &mut result).await {
                Ok(()) => {
                    result.success = true;
                    info!(locator = ?result.locator, "Rendition ready");
                }
                Err(e) => warn!(stage = e.stage(), error = %e, "Rendition failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn render_stages(
        &self,
        job: &JobDescriptor,
        token: &str,
        workspace: &Workspace,
        spec: &RenditionSpec,
        result: &mut RenditionResult,
    ) -> Result<(), RenditionError> {
        let output_dir = workspace
            .allocate_rendition_dir(&job.base_name(), &spec.label)
            .await
            .map_err(|e| RenditionError::Transcode(format!("cannot create output dir: {}", e)))?;
        result.output_dir = output_dir.clone();

        let request = TranscodeRequest {
            input: workspace.source_path().to_path_buf(),
            output_manifest: output_dir.join(MANIFEST_NAME),
            dimensions: spec.dimensions,
        };
        if let TranscodeOutcome::Failure(diagnostics) = self.transcoder.transcode(&request).await {
            return Err(RenditionError::Transcode(diagnostics));
        }

        let locator =
            publish_rendition(&self.storage, &output_dir, &job.rendition_folder(&spec.label))
                .await?;
        result.locator = Some(locator.clone());

        let record = RenditionRecord {
            streaming_path: locator,
            file_id: job.file_id.clone(),
            format: self.settings.format_tag.clone(),
            resolution: spec.label.clone(),
        };
        self.notifier.notify_rendition_ready(token, &record).await
    }
}
