use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use report_core::{CpuId, JobId, Ticket};
use report_logging::{report_debug, report_info, report_warn};
use tokio_util::sync::CancellationToken;

use crate::client::{ClientSettings, ReportApi, ReqwestApi};
use crate::persist::{checked_file_name, AtomicFileWriter, PersistError};
use crate::poll::{poll_job, ChannelProgressSink, PollSettings, Sleeper, TokioSleeper};
use crate::{ApiError, EngineEvent, FailureKind};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub client: ClientSettings,
    pub poll: PollSettings,
    pub output_dir: PathBuf,
}

enum EngineCommand {
    Upload {
        ticket: Ticket,
        path: PathBuf,
    },
    Submit {
        ticket: Ticket,
        filename: String,
        cpus: Vec<CpuId>,
    },
    StartPolling {
        job_id: JobId,
    },
    CancelPolling {
        job_id: JobId,
    },
    FetchPreview {
        job_id: JobId,
        filename: String,
        cpu: CpuId,
    },
    Download {
        filename: String,
    },
}

/// Running poll loops by job, tagged with a generation so a finished loop
/// never removes the token of a loop that replaced it.
type PollTokens = Arc<Mutex<HashMap<JobId, (u64, CancellationToken)>>>;

/// Shared pieces every spawned task needs.
#[derive(Clone)]
struct Worker {
    api: Arc<dyn ReportApi>,
    sleeper: Arc<dyn Sleeper>,
    poll: PollSettings,
    writer: AtomicFileWriter,
    events: mpsc::Sender<EngineEvent>,
    polls: PollTokens,
    poll_generation: Arc<AtomicU64>,
}

/// Runs backend requests on a background tokio runtime.
///
/// Commands go in through the handle's methods; results come back as
/// [`EngineEvent`]s via [`EngineHandle::try_recv`] / [`EngineHandle::recv_timeout`].
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: Arc<Mutex<mpsc::Receiver<EngineEvent>>>,
}

impl EngineHandle {
    pub fn new(config: EngineConfig) -> Result<Self, ApiError> {
        let api = Arc::new(ReqwestApi::new(config.client)?);
        Self::with_api(api, Arc::new(TokioSleeper), config.poll, config.output_dir)
    }

    /// Builds a handle over any [`ReportApi`]; used with fakes in tests.
    pub fn with_api(
        api: Arc<dyn ReportApi>,
        sleeper: Arc<dyn Sleeper>,
        poll: PollSettings,
        output_dir: PathBuf,
    ) -> Result<Self, ApiError> {
        let runtime = tokio::runtime::Runtime::new()
            .map_err(|err| ApiError::new(FailureKind::Io, format!("tokio runtime: {err}")))?;
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let worker = Worker {
            api,
            sleeper,
            poll,
            writer: AtomicFileWriter::new(output_dir),
            events: event_tx,
            polls: Arc::new(Mutex::new(HashMap::new())),
            poll_generation: Arc::new(AtomicU64::new(0)),
        };

        thread::spawn(move || {
            while let Ok(command) = cmd_rx.recv() {
                worker.dispatch(&runtime, command);
            }
            report_debug!("Engine command channel closed");
        });

        Ok(Self {
            cmd_tx,
            event_rx: Arc::new(Mutex::new(event_rx)),
        })
    }

    pub fn upload(&self, ticket: Ticket, path: PathBuf) {
        self.send(EngineCommand::Upload { ticket, path });
    }

    pub fn submit(&self, ticket: Ticket, filename: String, cpus: Vec<CpuId>) {
        self.send(EngineCommand::Submit {
            ticket,
            filename,
            cpus,
        });
    }

    pub fn start_polling(&self, job_id: JobId) {
        self.send(EngineCommand::StartPolling { job_id });
    }

    pub fn cancel_polling(&self, job_id: JobId) {
        self.send(EngineCommand::CancelPolling { job_id });
    }

    pub fn fetch_preview(&self, job_id: JobId, filename: String, cpu: CpuId) {
        self.send(EngineCommand::FetchPreview {
            job_id,
            filename,
            cpu,
        });
    }

    pub fn download(&self, filename: String) {
        self.send(EngineCommand::Download { filename });
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.lock().ok()?.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.lock().ok()?.recv_timeout(timeout).ok()
    }

    fn send(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            report_warn!("Engine thread is gone; command dropped");
        }
    }
}

impl Worker {
    fn dispatch(&self, runtime: &tokio::runtime::Runtime, command: EngineCommand) {
        match command {
            EngineCommand::Upload { ticket, path } => {
                let worker = self.clone();
                runtime.spawn(async move {
                    let result = worker.upload(&path).await;
                    worker.emit(EngineEvent::UploadFinished { ticket, result });
                });
            }
            EngineCommand::Submit {
                ticket,
                filename,
                cpus,
            } => {
                let worker = self.clone();
                runtime.spawn(async move {
                    let result = worker.api.submit(&filename, &cpus).await;
                    if let Ok(submitted) = &result {
                        report_info!("Job {} submitted for {}", submitted.job_id, filename);
                    }
                    worker.emit(EngineEvent::JobSubmitted { ticket, result });
                });
            }
            EngineCommand::StartPolling { job_id } => {
                let token = CancellationToken::new();
                let generation = self.poll_generation.fetch_add(1, Ordering::Relaxed);
                if let Ok(mut polls) = self.polls.lock() {
                    if let Some((_, previous)) =
                        polls.insert(job_id.clone(), (generation, token.clone()))
                    {
                        previous.cancel();
                    }
                }
                let worker = self.clone();
                runtime.spawn(async move {
                    worker.poll(job_id, generation, token).await;
                });
            }
            EngineCommand::CancelPolling { job_id } => {
                let token = self.polls.lock().ok().and_then(|mut polls| polls.remove(&job_id));
                if let Some((_, token)) = token {
                    report_info!("Cancelling polling for job {}", job_id);
                    token.cancel();
                }
            }
            EngineCommand::FetchPreview {
                job_id,
                filename,
                cpu,
            } => {
                let worker = self.clone();
                runtime.spawn(async move {
                    let result = worker.api.preview(&filename, &cpu).await;
                    if let Err(err) = &result {
                        report_warn!("Preview for {} failed: {}", cpu, err);
                    }
                    worker.emit(EngineEvent::PreviewLoaded {
                        job_id,
                        cpu,
                        result,
                    });
                });
            }
            EngineCommand::Download { filename } => {
                let worker = self.clone();
                runtime.spawn(async move {
                    let result = worker.download(&filename).await;
                    worker.emit(EngineEvent::DownloadFinished { filename, result });
                });
            }
        }
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }

    async fn upload(&self, path: &std::path::Path) -> Result<(String, Vec<CpuId>), ApiError> {
        let filename = self.api.upload(path).await?;
        report_info!("Uploaded {} as {}", path.display(), filename);
        let cpus = self.api.available_cpus(&filename).await?;
        Ok((filename, cpus))
    }

    async fn poll(&self, job_id: JobId, generation: u64, token: CancellationToken) {
        let sink = ChannelProgressSink::new(self.events.clone());
        let outcome = poll_job(
            self.api.as_ref(),
            &job_id,
            &self.poll,
            self.sleeper.as_ref(),
            &sink,
            &token,
        )
        .await;
        if let Ok(mut polls) = self.polls.lock() {
            if polls.get(&job_id).is_some_and(|(current, _)| *current == generation) {
                polls.remove(&job_id);
            }
        }
        match outcome {
            Ok(_) => {}
            Err(err) if err.kind == FailureKind::Cancelled => {
                report_debug!("{}", err);
            }
            Err(error) => {
                report_warn!("Polling job {} failed: {}", job_id, error);
                self.emit(EngineEvent::PollFailed { job_id, error });
            }
        }
    }

    async fn download(&self, filename: &str) -> Result<PathBuf, ApiError> {
        checked_file_name(filename).map_err(persist_error)?;
        let bytes = self.api.download(filename).await?;
        let path = self.writer.write(filename, &bytes).map_err(persist_error)?;
        report_info!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}

fn persist_error(err: PersistError) -> ApiError {
    match err {
        PersistError::InvalidFileName(name) => {
            ApiError::malformed(format!("refusing to save server file name {name:?}"))
        }
        other => ApiError::new(FailureKind::Io, other.to_string()),
    }
}
