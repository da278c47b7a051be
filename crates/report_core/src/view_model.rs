use std::path::PathBuf;

use crate::preview::{PreviewRow, Section, UsageStats};
use crate::{CpuId, ErrorBanner, JobProgress, Phase};

/// Rough server time per processing step, used for the remaining-time hint.
pub const ESTIMATED_MS_PER_STEP: u32 = 500;

/// Read-only projection of [`crate::AppState`] for rendering.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub phase: Phase,
    pub upload_path: Option<PathBuf>,
    pub filename: Option<String>,
    pub cpus: Vec<CpuOptionView>,
    pub selected_count: usize,
    pub can_process: bool,
    pub processing: bool,
    pub progress: Option<ProgressView>,
    pub error: Option<ErrorBanner>,
    /// Present only once the job has completed.
    pub downloads: Option<DownloadsView>,
    pub downloads_in_flight: Vec<String>,
    pub preview: Option<PreviewView>,
    pub saved_files: Vec<PathBuf>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuOptionView {
    pub cpu: CpuId,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressView {
    pub current_step: String,
    pub progress: u32,
    pub total_steps: u32,
    /// Whole percent, clamped to 0..=100.
    pub percent: u8,
    pub current_cpu: Option<CpuId>,
    pub completed_cpus: Vec<CpuId>,
    pub eta_seconds: Option<u32>,
}

impl ProgressView {
    pub(crate) fn from_progress(progress: &JobProgress) -> Self {
        let percent = if progress.total_steps == 0 {
            0
        } else {
            let scaled = u64::from(progress.progress) * 100 / u64::from(progress.total_steps);
            scaled.min(100) as u8
        };
        let eta_seconds = (progress.progress > 0 && progress.progress < progress.total_steps)
            .then(|| {
                let remaining_ms = u64::from(progress.total_steps - progress.progress)
                    * u64::from(ESTIMATED_MS_PER_STEP);
                u32::try_from(remaining_ms.div_ceil(1000)).unwrap_or(u32::MAX)
            });
        Self {
            current_step: progress.current_step.clone(),
            progress: progress.progress,
            total_steps: progress.total_steps,
            percent,
            current_cpu: progress.current_cpu.clone(),
            completed_cpus: progress.completed_cpus.clone(),
            eta_seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadsView {
    pub files: Vec<DownloadView>,
    /// Offered only when more than one CPU was processed.
    pub zip_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadView {
    pub cpu: CpuId,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreviewView {
    pub tabs: Vec<PreviewTabView>,
    pub focus: CpuId,
    /// `None` while the focused CPU's preview is loading or failed.
    pub focused: Option<FocusedPreview>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewTabView {
    pub cpu: CpuId,
    pub state: PreviewTabState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewTabState {
    Loading,
    Loaded,
    /// A refetch is in flight; the previous rows stay visible until it lands.
    Reloading,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FocusedPreview {
    pub columns: Vec<String>,
    pub usage: UsageStats,
    pub sections: Vec<SectionTabView>,
    pub section: Section,
    pub search: String,
    pub rows: Vec<PreviewRow>,
    pub showing: usize,
    pub total: usize,
    /// Row count before the search filter, when a search is active.
    pub filtered_from: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionTabView {
    pub section: Section,
    pub label: &'static str,
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JobStatus;

    fn progress(progress: u32, total_steps: u32) -> JobProgress {
        JobProgress {
            status: JobStatus::Processing,
            current_step: "Processing CPU1... (1/3)".into(),
            progress,
            total_steps,
            current_cpu: None,
            completed_cpus: Vec::new(),
            error: None,
        }
    }

    #[test]
    fn eta_rounds_up_half_seconds() {
        let view = ProgressView::from_progress(&progress(1, 4));
        assert_eq!(view.percent, 25);
        assert_eq!(view.eta_seconds, Some(2));

        let view = ProgressView::from_progress(&progress(2, 5));
        assert_eq!(view.eta_seconds, Some(2));
    }

    #[test]
    fn eta_for_huge_step_counts_does_not_overflow() {
        let view = ProgressView::from_progress(&progress(1, 10_000_000));
        assert_eq!(view.percent, 0);
        assert_eq!(view.eta_seconds, Some(5_000_000));

        let view = ProgressView::from_progress(&progress(1, u32::MAX));
        assert_eq!(view.eta_seconds, Some(2_147_483_647));
    }

    #[test]
    fn no_eta_before_start_or_after_end() {
        assert_eq!(ProgressView::from_progress(&progress(0, 3)).eta_seconds, None);
        assert_eq!(ProgressView::from_progress(&progress(3, 3)).eta_seconds, None);
    }

    #[test]
    fn zero_total_steps_renders_zero_percent() {
        assert_eq!(ProgressView::from_progress(&progress(0, 0)).percent, 0);
    }
}
