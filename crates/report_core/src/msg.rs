use std::path::PathBuf;

use crate::preview::{PreviewEntry, Section};
use crate::{CpuId, Failure, JobId, JobProgress, ProcessResult, Ticket, UploadedFile};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User picked a spreadsheet. Legal at any time; resets everything.
    FileSelected(PathBuf),
    /// Upload plus CPU-list retrieval finished.
    UploadFinished {
        ticket: Ticket,
        result: Result<UploadedFile, Failure>,
    },
    /// User ticked or unticked a CPU checkbox.
    CpuToggled(CpuId),
    SelectAllCpus,
    ClearCpuSelection,
    /// User clicked Process.
    ProcessClicked,
    /// Backend accepted (or refused) the job.
    JobSubmitted {
        ticket: Ticket,
        result: Result<ProcessResult, Failure>,
    },
    /// One poll response; `attempt` is 1-based and increases per poll.
    ProgressPolled {
        job_id: JobId,
        attempt: u32,
        progress: JobProgress,
    },
    /// Polling itself failed (network, malformed response, attempt limit).
    PollFailed { job_id: JobId, failure: Failure },
    PreviewLoaded {
        job_id: JobId,
        cpu: CpuId,
        result: Result<PreviewEntry, Failure>,
    },
    /// User asked to reload one CPU's preview.
    PreviewRequested(CpuId),
    PreviewFocusChanged(CpuId),
    SectionChanged(Section),
    SearchChanged(String),
    DownloadClicked(CpuId),
    DownloadAllClicked,
    DownloadFinished {
        filename: String,
        result: Result<PathBuf, Failure>,
    },
    /// UI/render tick to coalesce rendering.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
