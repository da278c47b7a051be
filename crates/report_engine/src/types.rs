use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use report_core::{CpuId, JobId, JobProgress, PreviewEntry, ProcessResult, Ticket};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
}

impl ApiError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::new(FailureKind::MalformedResponse, message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    /// The body did not have the documented shape.
    MalformedResponse,
    UnsupportedFile,
    TooLarge { max_bytes: u64, actual: u64 },
    PollLimitExceeded { attempts: u32 },
    Cancelled,
    Io,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::MalformedResponse => write!(f, "malformed response"),
            FailureKind::UnsupportedFile => write!(f, "unsupported file"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "too large (max {max_bytes}, actual {actual})")
            }
            FailureKind::PollLimitExceeded { attempts } => {
                write!(f, "gave up after {attempts} polls")
            }
            FailureKind::Cancelled => write!(f, "cancelled"),
            FailureKind::Io => write!(f, "io error"),
        }
    }
}

/// One entry of `GET /history/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub filename: String,
    pub date: String,
    pub selected_cpus: Vec<CpuId>,
    pub input_location: String,
}

/// One page of `GET /data/{filename}/{cpu}`; each row maps column to cell text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionPage {
    pub rows: Vec<BTreeMap<String, String>>,
    pub total_rows: usize,
    pub page: usize,
    pub page_size: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: Option<String>,
}

/// Events emitted by the [`crate::EngineHandle`] background runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    UploadFinished {
        ticket: Ticket,
        result: Result<(String, Vec<CpuId>), ApiError>,
    },
    JobSubmitted {
        ticket: Ticket,
        result: Result<ProcessResult, ApiError>,
    },
    Progress {
        job_id: JobId,
        attempt: u32,
        progress: JobProgress,
    },
    PollFailed {
        job_id: JobId,
        error: ApiError,
    },
    PreviewLoaded {
        job_id: JobId,
        cpu: CpuId,
        result: Result<PreviewEntry, ApiError>,
    },
    DownloadFinished {
        filename: String,
        result: Result<PathBuf, ApiError>,
    },
}
