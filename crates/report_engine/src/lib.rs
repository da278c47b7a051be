//! CPU report engine: backend HTTP client, job polling and effect execution.
mod client;
mod engine;
mod persist;
mod poll;
mod types;
mod wire;

pub use client::{ClientSettings, ReportApi, ReqwestApi, DEFAULT_API_URL};
pub use engine::{EngineConfig, EngineHandle};
pub use persist::{checked_file_name, ensure_output_dir, AtomicFileWriter, PersistError};
pub use poll::{poll_job, ChannelProgressSink, PollSettings, ProgressSink, Sleeper, TokioSleeper};
pub use types::{ApiError, EngineEvent, FailureKind, HealthStatus, HistoryEntry, SectionPage};
