use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use report_logging::report_debug;

use crate::preview::{PreviewEntry, Section};
use crate::view_model::{
    AppViewModel, CpuOptionView, DownloadView, DownloadsView, FocusedPreview, PreviewTabState,
    PreviewTabView, PreviewView, ProgressView, SectionTabView,
};

pub type CpuId = String;
pub type JobId = String;
/// Monotonic counter tagging upload and submission requests.
pub type Ticket = u64;

/// Extensions accepted for upload (lower case, without the dot).
pub const ACCEPTED_EXTENSIONS: [&str; 2] = ["xlsx", "xlsm"];

/// Message shown when the server reports `error` without any text.
pub const FALLBACK_JOB_ERROR: &str = "An error occurred during processing";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Uploading,
    Ready,
    Processing,
    Completed,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Starting,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

/// One poll response for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobProgress {
    pub status: JobStatus,
    pub current_step: String,
    pub progress: u32,
    pub total_steps: u32,
    pub current_cpu: Option<CpuId>,
    pub completed_cpus: Vec<CpuId>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub filename: String,
    pub cpus: Vec<CpuId>,
}

/// Output files announced when a job is submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    pub job_id: JobId,
    pub individual_files: BTreeMap<CpuId, String>,
    pub zip_file: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    Network,
    Timeout,
    /// Non-success HTTP status or a server-reported failure.
    Server,
    MalformedResponse,
    /// Rejected before any request was made.
    Local,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub cause: FailureCause,
    pub message: String,
}

impl Failure {
    pub fn new(cause: FailureCause, message: impl Into<String>) -> Self {
        Self {
            cause,
            message: message.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Where in the workflow an error surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStage {
    Upload,
    Submission,
    Poll,
    Preview,
    Download,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorBanner {
    pub stage: ErrorStage,
    pub cause: FailureCause,
    pub message: String,
}

impl ErrorBanner {
    fn from_failure(stage: ErrorStage, failure: Failure) -> Self {
        Self {
            stage,
            cause: failure.cause,
            message: failure.message,
        }
    }
}

/// The tracked job; present from the first submission until the next upload.
#[derive(Debug, Clone, PartialEq)]
struct TrackedJob {
    result: ProcessResult,
    progress: Option<JobProgress>,
    last_attempt: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    dirty: bool,
    phase: Phase,
    ticket: Ticket,
    upload_path: Option<PathBuf>,
    uploaded: Option<UploadedFile>,
    selection: Vec<CpuId>,
    awaiting_submission: bool,
    job: Option<TrackedJob>,
    error: Option<ErrorBanner>,
    previews: BTreeMap<CpuId, PreviewEntry>,
    preview_errors: BTreeMap<CpuId, String>,
    preview_reloads: BTreeSet<CpuId>,
    preview_focus: Option<CpuId>,
    section: Section,
    search: String,
    downloads_in_flight: BTreeSet<String>,
    saved_files: Vec<PathBuf>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job.as_ref().map(|job| job.result.job_id.as_str())
    }

    pub fn selected_cpus(&self) -> &[CpuId] {
        &self.selection
    }

    /// Returns and clears the re-render flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn is_current_ticket(&self, ticket: Ticket) -> bool {
        self.ticket == ticket
    }

    pub(crate) fn is_current_job(&self, job_id: &str) -> bool {
        let current = self.job_id() == Some(job_id);
        if !current {
            report_debug!("Discarding response for stale job {}", job_id);
        }
        current
    }

    pub(crate) fn job_in_flight(&self) -> bool {
        matches!(self.phase, Phase::Uploading | Phase::Processing)
    }

    pub(crate) fn can_process(&self) -> bool {
        self.uploaded.is_some()
            && !self.selection.is_empty()
            && matches!(self.phase, Phase::Ready | Phase::Completed | Phase::Error)
    }

    /// Resets everything and starts a new upload. Returns the new ticket and
    /// the job id whose polling should be cancelled, if any.
    pub(crate) fn begin_upload(&mut self, path: PathBuf) -> (Ticket, Option<JobId>) {
        let superseded = self.job_id().map(ToOwned::to_owned);
        let ticket = self.ticket + 1;
        *self = AppState {
            dirty: true,
            phase: Phase::Uploading,
            ticket,
            upload_path: Some(path),
            ..AppState::default()
        };
        (ticket, superseded)
    }

    /// Local rejection of an unsupported file; no request is made.
    pub(crate) fn reject_file(&mut self, path: &Path) -> Option<JobId> {
        let superseded = self.job_id().map(ToOwned::to_owned);
        let ticket = self.ticket + 1;
        *self = AppState {
            dirty: true,
            ticket,
            error: Some(ErrorBanner {
                stage: ErrorStage::Upload,
                cause: FailureCause::Local,
                message: format!(
                    "Unsupported file {:?}: expected one of .xlsx, .xlsm",
                    path.file_name().unwrap_or(path.as_os_str())
                ),
            }),
            ..AppState::default()
        };
        superseded
    }

    pub(crate) fn apply_upload(&mut self, result: Result<UploadedFile, Failure>) {
        match result {
            Ok(uploaded) => {
                self.phase = Phase::Ready;
                self.uploaded = Some(uploaded);
            }
            Err(failure) => {
                // Logically idle so the user can pick another file.
                self.phase = Phase::Idle;
                self.error = Some(ErrorBanner::from_failure(ErrorStage::Upload, failure));
            }
        }
        self.mark_dirty();
    }

    pub(crate) fn toggle_cpu(&mut self, cpu: &str) {
        if !self.is_available(cpu) {
            return;
        }
        if let Some(pos) = self.selection.iter().position(|c| c == cpu) {
            self.selection.remove(pos);
        } else {
            self.selection.push(cpu.to_owned());
        }
        self.mark_dirty();
    }

    pub(crate) fn select_all(&mut self) {
        if let Some(uploaded) = &self.uploaded {
            self.selection = uploaded.cpus.clone();
            self.mark_dirty();
        }
    }

    pub(crate) fn clear_selection(&mut self) {
        if !self.selection.is_empty() {
            self.selection.clear();
            self.mark_dirty();
        }
    }

    fn is_available(&self, cpu: &str) -> bool {
        self.uploaded
            .as_ref()
            .is_some_and(|uploaded| uploaded.cpus.iter().any(|c| c == cpu))
    }

    /// Clears artefacts of any previous job and waits for the submission.
    pub(crate) fn begin_submission(&mut self) -> Option<(Ticket, String, Vec<CpuId>)> {
        let filename = self.uploaded.as_ref()?.filename.clone();
        self.ticket += 1;
        self.phase = Phase::Processing;
        self.awaiting_submission = true;
        self.job = None;
        self.error = None;
        self.clear_previews();
        self.downloads_in_flight.clear();
        self.mark_dirty();
        Some((self.ticket, filename, self.selection.clone()))
    }

    pub(crate) fn is_awaiting_submission(&self) -> bool {
        self.awaiting_submission && self.phase == Phase::Processing
    }

    pub(crate) fn apply_submission(&mut self, result: Result<ProcessResult, Failure>) -> Option<JobId> {
        self.awaiting_submission = false;
        self.mark_dirty();
        match result {
            Ok(result) => {
                let job_id = result.job_id.clone();
                self.job = Some(TrackedJob {
                    result,
                    progress: None,
                    last_attempt: 0,
                });
                Some(job_id)
            }
            Err(failure) => {
                self.phase = Phase::Error;
                self.error = Some(ErrorBanner::from_failure(ErrorStage::Submission, failure));
                None
            }
        }
    }

    /// Applies a poll result for the current job. Returns the job's terminal
    /// status when this poll completed or failed it.
    pub(crate) fn apply_progress(
        &mut self,
        attempt: u32,
        progress: JobProgress,
    ) -> Option<JobStatus> {
        if self.phase != Phase::Processing {
            return None;
        }
        let job = self.job.as_mut()?;
        if attempt <= job.last_attempt {
            report_debug!(
                "Ignoring out-of-order poll {} (last applied {})",
                attempt,
                job.last_attempt
            );
            return None;
        }
        job.last_attempt = attempt;
        let status = progress.status;
        let server_error = progress.error.clone();
        job.progress = Some(progress);
        self.mark_dirty();

        match status {
            JobStatus::Completed => {
                self.phase = Phase::Completed;
                self.preview_focus = self.selection.first().cloned();
                Some(status)
            }
            JobStatus::Error => {
                self.phase = Phase::Error;
                let message = server_error
                    .filter(|text| !text.trim().is_empty())
                    .unwrap_or_else(|| FALLBACK_JOB_ERROR.to_string());
                self.error = Some(ErrorBanner {
                    stage: ErrorStage::Poll,
                    cause: FailureCause::Server,
                    message,
                });
                Some(status)
            }
            JobStatus::Starting | JobStatus::Processing => None,
        }
    }

    pub(crate) fn apply_poll_failure(&mut self, failure: Failure) {
        if self.phase != Phase::Processing {
            return;
        }
        self.phase = Phase::Error;
        self.error = Some(ErrorBanner::from_failure(ErrorStage::Poll, failure));
        self.mark_dirty();
    }

    /// Filename previews are keyed by, once the job has completed.
    pub(crate) fn preview_source(&self) -> Option<(JobId, String)> {
        if self.phase != Phase::Completed {
            return None;
        }
        let job_id = self.job_id()?.to_owned();
        let filename = self.uploaded.as_ref()?.filename.clone();
        Some((job_id, filename))
    }

    pub(crate) fn is_selected(&self, cpu: &str) -> bool {
        self.selection.iter().any(|c| c == cpu)
    }

    pub(crate) fn apply_preview(&mut self, cpu: CpuId, result: Result<PreviewEntry, Failure>) {
        if self.phase != Phase::Completed || !self.is_selected(&cpu) {
            return;
        }
        self.preview_reloads.remove(&cpu);
        match result {
            Ok(entry) => {
                self.preview_errors.remove(&cpu);
                self.previews.insert(cpu, entry);
            }
            Err(failure) => {
                self.previews.remove(&cpu);
                self.preview_errors.insert(cpu, failure.message);
            }
        }
        self.mark_dirty();
    }

    pub(crate) fn begin_preview_reload(&mut self, cpu: &str) {
        self.preview_errors.remove(cpu);
        if self.previews.contains_key(cpu) {
            self.preview_reloads.insert(cpu.to_string());
        }
        self.mark_dirty();
    }

    fn clear_previews(&mut self) {
        self.previews.clear();
        self.preview_errors.clear();
        self.preview_reloads.clear();
        self.preview_focus = None;
        self.section = Section::default();
        self.search.clear();
    }

    pub(crate) fn focus_preview(&mut self, cpu: CpuId) {
        if self.phase == Phase::Completed
            && self.is_selected(&cpu)
            && self.preview_focus.as_ref() != Some(&cpu)
        {
            self.preview_focus = Some(cpu);
            self.mark_dirty();
        }
    }

    pub(crate) fn set_section(&mut self, section: Section) {
        if self.section != section {
            self.section = section;
            self.mark_dirty();
        }
    }

    pub(crate) fn set_search(&mut self, search: String) {
        if self.search != search {
            self.search = search;
            self.mark_dirty();
        }
    }

    fn exposed_result(&self) -> Option<&ProcessResult> {
        if self.phase != Phase::Completed {
            return None;
        }
        self.job.as_ref().map(|job| &job.result)
    }

    pub(crate) fn resolve_download(&self, cpu: &str) -> Option<String> {
        self.exposed_result()?.individual_files.get(cpu).cloned()
    }

    pub(crate) fn resolve_archive(&self) -> Option<String> {
        let result = self.exposed_result()?;
        archive_available(result).then(|| result.zip_file.clone())
    }

    /// Marks a download as started; false when it is already running.
    pub(crate) fn start_download(&mut self, filename: &str) -> bool {
        let started = self.downloads_in_flight.insert(filename.to_owned());
        if started {
            self.mark_dirty();
        }
        started
    }

    pub(crate) fn apply_download(&mut self, filename: &str, result: Result<PathBuf, Failure>) {
        if !self.downloads_in_flight.remove(filename) {
            report_debug!("Ignoring download result for untracked file {}", filename);
            return;
        }
        match result {
            Ok(path) => self.saved_files.push(path),
            Err(failure) => {
                self.error = Some(ErrorBanner::from_failure(ErrorStage::Download, failure));
            }
        }
        self.mark_dirty();
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            phase: self.phase,
            upload_path: self.upload_path.clone(),
            filename: self.uploaded.as_ref().map(|u| u.filename.clone()),
            cpus: self.cpu_options(),
            selected_count: self.selection.len(),
            can_process: self.can_process(),
            processing: self.phase == Phase::Processing,
            progress: self
                .job
                .as_ref()
                .and_then(|job| job.progress.as_ref())
                .map(ProgressView::from_progress),
            error: self.error.clone(),
            downloads: self.exposed_result().map(downloads_view),
            downloads_in_flight: self.downloads_in_flight.iter().cloned().collect(),
            preview: self.preview_view(),
            saved_files: self.saved_files.clone(),
            dirty: self.dirty,
        }
    }

    fn cpu_options(&self) -> Vec<CpuOptionView> {
        self.uploaded
            .as_ref()
            .map(|uploaded| {
                uploaded
                    .cpus
                    .iter()
                    .map(|cpu| CpuOptionView {
                        cpu: cpu.clone(),
                        selected: self.is_selected(cpu),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn preview_view(&self) -> Option<PreviewView> {
        if self.phase != Phase::Completed {
            return None;
        }
        let focus = self.preview_focus.clone()?;
        let tabs = self
            .selection
            .iter()
            .map(|cpu| PreviewTabView {
                cpu: cpu.clone(),
                state: if self.preview_reloads.contains(cpu) {
                    PreviewTabState::Reloading
                } else if self.previews.contains_key(cpu) {
                    PreviewTabState::Loaded
                } else if let Some(message) = self.preview_errors.get(cpu) {
                    PreviewTabState::Failed(message.clone())
                } else {
                    PreviewTabState::Loading
                },
            })
            .collect();
        let focused = self.previews.get(&focus).map(|entry| {
            let rows: Vec<_> = entry
                .filter_rows(self.section, &self.search)
                .into_iter()
                .cloned()
                .collect();
            let section_len = entry.rows(self.section).len();
            FocusedPreview {
                columns: entry.columns.clone(),
                usage: entry.usage,
                sections: Section::ALL
                    .into_iter()
                    .map(|section| SectionTabView {
                        section,
                        label: section.label(),
                        total: entry.total_rows.get(section),
                    })
                    .collect(),
                section: self.section,
                search: self.search.clone(),
                showing: rows.len(),
                total: entry.total_rows.get(self.section),
                filtered_from: (!self.search.trim().is_empty()).then_some(section_len),
                rows,
            }
        });
        Some(PreviewView {
            tabs,
            focus,
            focused,
        })
    }
}

fn archive_available(result: &ProcessResult) -> bool {
    result.individual_files.len() > 1 && !result.zip_file.is_empty()
}

fn downloads_view(result: &ProcessResult) -> DownloadsView {
    DownloadsView {
        files: result
            .individual_files
            .iter()
            .map(|(cpu, filename)| DownloadView {
                cpu: cpu.clone(),
                filename: filename.clone(),
            })
            .collect(),
        zip_file: archive_available(result).then(|| result.zip_file.clone()),
    }
}

/// True when the path carries one of [`ACCEPTED_EXTENSIONS`].
pub fn is_supported_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ACCEPTED_EXTENSIONS
                .iter()
                .any(|accepted| accepted.eq_ignore_ascii_case(ext))
        })
}
