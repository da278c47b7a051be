use std::time::Duration;

use report_core::JobProgress;
use report_logging::{report_debug, report_info};
use tokio_util::sync::CancellationToken;

use crate::{ApiError, EngineEvent, FailureKind, ReportApi};

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
    /// Upper bound on progress requests before the job is given up.
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            max_attempts: 1200,
        }
    }
}

/// Delay between polls; injectable so tests need not wait.
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelProgressSink {
    tx: std::sync::mpsc::Sender<EngineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: std::sync::mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Polls `job_id` until the server reports a terminal status.
///
/// Every response is emitted as [`EngineEvent::Progress`] with a 1-based
/// attempt number. A failed request ends the loop; nothing is retried.
/// Returns the terminal progress, or an error after `max_attempts` polls or
/// when `cancel` fires.
pub async fn poll_job(
    api: &dyn ReportApi,
    job_id: &str,
    settings: &PollSettings,
    sleeper: &dyn Sleeper,
    sink: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<JobProgress, ApiError> {
    let max_attempts = settings.max_attempts.max(1);
    for attempt in 1..=max_attempts {
        let progress = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(job_id)),
            result = api.progress(job_id) => result?,
        };
        report_debug!(
            "Job {} poll {}: {:?} {}/{}",
            job_id,
            attempt,
            progress.status,
            progress.progress,
            progress.total_steps
        );
        let terminal = progress.status.is_terminal();
        sink.emit(EngineEvent::Progress {
            job_id: job_id.to_string(),
            attempt,
            progress: progress.clone(),
        });
        if terminal {
            report_info!("Job {} finished after {} polls", job_id, attempt);
            return Ok(progress);
        }
        if attempt < max_attempts {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(job_id)),
                _ = sleeper.sleep(settings.interval) => {}
            }
        }
    }
    Err(ApiError::new(
        FailureKind::PollLimitExceeded {
            attempts: max_attempts,
        },
        format!("Job {job_id} did not finish after {max_attempts} progress checks"),
    ))
}

fn cancelled(job_id: &str) -> ApiError {
    ApiError::new(
        FailureKind::Cancelled,
        format!("Polling for job {job_id} was cancelled"),
    )
}
