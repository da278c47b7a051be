use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use report_core::{Effect, Failure, FailureCause, Msg, UploadedFile};
use report_engine::{ApiError, EngineEvent, EngineHandle, FailureKind};
use report_logging::{report_debug, report_info, report_warn};

/// Executes controller effects on the engine and feeds engine events back as
/// messages. Dropping the runner stops the forwarding thread.
pub struct EffectRunner {
    engine: EngineHandle,
    stop: Arc<AtomicBool>,
    forwarder: Option<JoinHandle<()>>,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle, msg_tx: mpsc::Sender<Msg>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let forwarder = spawn_event_loop(engine.clone(), msg_tx, Arc::clone(&stop));
        Self {
            engine,
            stop,
            forwarder: Some(forwarder),
        }
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Upload { ticket, path } => {
                    report_info!("Uploading {} (ticket {})", path.display(), ticket);
                    self.engine.upload(ticket, path);
                }
                Effect::SubmitJob {
                    ticket,
                    filename,
                    cpus,
                } => {
                    report_debug!("Submitting {} cpus={:?} (ticket {})", filename, cpus, ticket);
                    self.engine.submit(ticket, filename, cpus);
                }
                Effect::StartPolling { job_id } => self.engine.start_polling(job_id),
                Effect::CancelPolling { job_id } => self.engine.cancel_polling(job_id),
                Effect::FetchPreview {
                    job_id,
                    filename,
                    cpu,
                } => self.engine.fetch_preview(job_id, filename, cpu),
                Effect::Download { filename } => {
                    report_info!("Downloading {}", filename);
                    self.engine.download(filename);
                }
            }
        }
    }
}

impl Drop for EffectRunner {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(forwarder) = self.forwarder.take() {
            if forwarder.join().is_err() {
                report_warn!("Event forwarding thread panicked");
            }
        }
    }
}

fn spawn_event_loop(
    engine: EngineHandle,
    msg_tx: mpsc::Sender<Msg>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            let Some(event) = engine.recv_timeout(Duration::from_millis(50)) else {
                continue;
            };
            if msg_tx.send(event_to_msg(event)).is_err() {
                break;
            }
        }
        report_debug!("Event forwarding stopped");
    })
}

pub(crate) fn event_to_msg(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::UploadFinished { ticket, result } => Msg::UploadFinished {
            ticket,
            result: result
                .map(|(filename, cpus)| UploadedFile { filename, cpus })
                .map_err(failure),
        },
        EngineEvent::JobSubmitted { ticket, result } => Msg::JobSubmitted {
            ticket,
            result: result.map_err(failure),
        },
        EngineEvent::Progress {
            job_id,
            attempt,
            progress,
        } => Msg::ProgressPolled {
            job_id,
            attempt,
            progress,
        },
        EngineEvent::PollFailed { job_id, error } => Msg::PollFailed {
            job_id,
            failure: failure(error),
        },
        EngineEvent::PreviewLoaded {
            job_id,
            cpu,
            result,
        } => Msg::PreviewLoaded {
            job_id,
            cpu,
            result: result.map_err(failure),
        },
        EngineEvent::DownloadFinished { filename, result } => {
            if let Err(err) = &result {
                report_warn!("Download of {} failed: {}", filename, err);
            }
            Msg::DownloadFinished {
                filename,
                result: result.map_err(failure),
            }
        }
    }
}

pub(crate) fn failure(error: ApiError) -> Failure {
    Failure::new(map_cause(&error.kind), error.message)
}

fn map_cause(kind: &FailureKind) -> FailureCause {
    match kind {
        FailureKind::HttpStatus(_) => FailureCause::Server,
        FailureKind::Timeout | FailureKind::PollLimitExceeded { .. } => FailureCause::Timeout,
        FailureKind::Network => FailureCause::Network,
        FailureKind::MalformedResponse => FailureCause::MalformedResponse,
        FailureKind::Cancelled => FailureCause::Cancelled,
        FailureKind::InvalidUrl
        | FailureKind::UnsupportedFile
        | FailureKind::TooLarge { .. }
        | FailureKind::Io => FailureCause::Local,
    }
}
