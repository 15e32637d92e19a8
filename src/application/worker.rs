use crate::application::pipeline::TranscodePipeline;
use crate::ports::identity::CredentialProvider;
use crate::ports::locator::FetchLocator;
use crate::ports::metadata::MetadataNotifier;
use crate::ports::queue::{Delivery, JobSource};
use crate::ports::storage::StoragePort;
use crate::ports::transcoder::TranscoderRunner;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// Pause before polling again after a queue error
const QUEUE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Pulls jobs from a [`JobSource`] and runs each on its own task,
/// at most `max_concurrent_jobs` at a time.
pub struct WorkerService<J, C, L, S, T, N> {
    source: Arc<J>,
    pipeline: Arc<TranscodePipeline<C, L, S, T, N>>,
    permits: Arc<Semaphore>,
    max_concurrent_jobs: usize,
    poll_timeout: Duration,
}

impl<J, C, L, S, T, N> WorkerService<J, C, L, S, T, N>
where
    J: JobSource + 'static,
    C: CredentialProvider + 'static,
    L: FetchLocator + 'static,
    S: StoragePort + 'static,
    T: TranscoderRunner + 'static,
    N: MetadataNotifier + 'static,
{
    pub fn new(
        source: J,
        pipeline: TranscodePipeline<C, L, S, T, N>,
        max_concurrent_jobs: usize,
        poll_timeout: Duration,
    ) -> Self {
        let max_concurrent_jobs = max_concurrent_jobs.max(1);
        Self {
            source: Arc::new(source),
            pipeline: Arc::new(pipeline),
            permits: Arc::new(Semaphore::new(max_concurrent_jobs)),
            max_concurrent_jobs,
            poll_timeout,
        }
    }

    /// Process jobs until `shutdown` resolves, then wait for in-flight jobs.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        info!(max_concurrent_jobs = self.max_concurrent_jobs, "Worker started");
        tokio::pin!(shutdown);

        loop {
            // Only poll the queue once a job slot is free
            let permit = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                permit = self.permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let next = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                next = self.source.next_job(self.poll_timeout) => next,
            };

            match next {
                Ok(Some(delivery)) => {
                    let source = self.source.clone();
                    let pipeline = self.pipeline.clone();
                    tokio::spawn(async move {
                        process(source.as_ref(), pipeline.as_ref(), delivery).await;
                        drop(permit);
                    });
                }
                Ok(None) => continue,
                Err(e) => {
                    error!(error = %e, "Queue error");
                    tokio::time::sleep(QUEUE_ERROR_BACKOFF).await;
                }
            }
        }

        info!("Worker stopping, waiting for in-flight jobs");
        let _ = self
            .permits
            .acquire_many(self.max_concurrent_jobs as u32)
            .await;
        info!("Worker stopped");
    }
}

/// Run one delivery and acknowledge it whatever the outcome.
async fn process<J, C, L, S, T, N>(
    source: &J,
    pipeline: &TranscodePipeline<C, L, S, T, N>,
    delivery: Delivery,
) where
    J: JobSource,
    C: CredentialProvider,
    L: FetchLocator,
    S: StoragePort,
    T: TranscoderRunner,
    N: MetadataNotifier,
{
    // Failures are logged inside the job span
    let job = pipeline.run(&delivery.job);
    tokio::pin!(job);

    match source.renewal_interval() {
        Some(every) if !every.is_zero() => {
            let first = tokio::time::Instant::now() + every;
            let mut renewals = tokio::time::interval_at(first, every);
            loop {
                tokio::select! {
                    _ = &mut job => break,
                    _ = renewals.tick() => {
                        if let Err(e) = source.renew(&delivery).await {
                            warn!(
                                file_id = %delivery.job.file_id,
                                error = %e,
                                "Failed to renew delivery"
                            );
                        }
                    }
                }
            }
        }
        _ => {
            let _ = job.await;
        }
    }

    if let Err(e) = source.complete(&delivery).await {
        warn!(file_id = %delivery.job.file_id, error = %e, "Failed to acknowledge job");
    }
}
