//! CPU report core: pure job lifecycle state machine and view-model helpers.
mod effect;
mod msg;
mod preview;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use msg::Msg;
pub use preview::{BitUsage, PreviewEntry, PreviewRow, Section, SectionTotals, UsageStats};
pub use state::{
    is_supported_spreadsheet, AppState, CpuId, ErrorBanner, ErrorStage, Failure, FailureCause,
    JobId, JobProgress, JobStatus, Phase, ProcessResult, Ticket, UploadedFile,
    ACCEPTED_EXTENSIONS, FALLBACK_JOB_ERROR,
};
pub use update::update;
pub use view_model::{
    AppViewModel, CpuOptionView, DownloadView, DownloadsView, FocusedPreview, PreviewTabState,
    PreviewTabView, PreviewView, ProgressView, SectionTabView, ESTIMATED_MS_PER_STEP,
};
