#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;

use bytes::Bytes;
use report_core::{
    BitUsage, CpuId, JobProgress, JobStatus, PreviewEntry, ProcessResult, Section, SectionTotals,
    UsageStats,
};
use report_engine::{
    ApiError, EngineEvent, FailureKind, HealthStatus, HistoryEntry, ProgressSink, ReportApi,
    SectionPage, Sleeper,
};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(report_logging::initialize_for_tests);
}

pub fn progress(status: JobStatus, step: u32, total: u32) -> JobProgress {
    JobProgress {
        status,
        current_step: format!("step {step}"),
        progress: step,
        total_steps: total,
        current_cpu: None,
        completed_cpus: Vec::new(),
        error: None,
    }
}

pub fn api_error(kind: FailureKind, message: &str) -> ApiError {
    ApiError {
        kind,
        message: message.to_string(),
    }
}

pub fn preview_entry() -> PreviewEntry {
    let bits = BitUsage {
        total: 4,
        used: 1,
        spare: 3,
        spare_percentage: 75.0,
    };
    PreviewEntry {
        columns: vec!["Description".into()],
        faults: Vec::new(),
        manual_interventions: Vec::new(),
        warnings: Vec::new(),
        total_rows: SectionTotals::default(),
        usage: UsageStats {
            fault_bits: bits,
            manual_intervention_bits: bits,
            warning_bits: bits,
        },
    }
}

/// Scripted backend. Progress responses are served in order; once the
/// script runs out the last response repeats.
#[derive(Default)]
pub struct FakeApi {
    pub progress_script: Mutex<VecDeque<Result<JobProgress, ApiError>>>,
    pub last_progress: Mutex<Option<Result<JobProgress, ApiError>>>,
    pub progress_calls: AtomicUsize,
    pub failing_previews: Vec<CpuId>,
    pub downloads: BTreeMap<String, Vec<u8>>,
}

impl FakeApi {
    pub fn with_progress(script: Vec<Result<JobProgress, ApiError>>) -> Self {
        Self {
            progress_script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    pub fn progress_calls(&self) -> usize {
        self.progress_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ReportApi for FakeApi {
    async fn upload(&self, path: &Path) -> Result<String, ApiError> {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| api_error(FailureKind::UnsupportedFile, "no file name"))
    }

    async fn available_cpus(&self, _filename: &str) -> Result<Vec<CpuId>, ApiError> {
        Ok(vec!["CPU1".into(), "CPU2".into()])
    }

    async fn submit(&self, filename: &str, cpus: &[CpuId]) -> Result<ProcessResult, ApiError> {
        Ok(ProcessResult {
            job_id: "job_1".into(),
            individual_files: cpus
                .iter()
                .map(|cpu| (cpu.clone(), format!("{cpu}_{filename}")))
                .collect(),
            zip_file: format!("{filename}.zip"),
        })
    }

    async fn progress(&self, _job_id: &str) -> Result<JobProgress, ApiError> {
        self.progress_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.progress_script.lock().unwrap().pop_front();
        let mut last = self.last_progress.lock().unwrap();
        if let Some(next) = next {
            *last = Some(next);
        }
        last.clone()
            .unwrap_or_else(|| Err(api_error(FailureKind::Network, "no script")))
    }

    async fn preview(&self, _filename: &str, cpu: &str) -> Result<PreviewEntry, ApiError> {
        if self.failing_previews.iter().any(|failing| failing == cpu) {
            return Err(api_error(FailureKind::HttpStatus(404), "No data for CPU"));
        }
        Ok(preview_entry())
    }

    async fn download(&self, filename: &str) -> Result<Bytes, ApiError> {
        self.downloads
            .get(filename)
            .map(|content| Bytes::from(content.clone()))
            .ok_or_else(|| api_error(FailureKind::HttpStatus(404), "File not found"))
    }

    async fn history(&self) -> Result<Vec<HistoryEntry>, ApiError> {
        Ok(Vec::new())
    }

    async fn section_page(
        &self,
        _filename: &str,
        _cpu: &str,
        _section: Section,
        page: usize,
        page_size: usize,
    ) -> Result<SectionPage, ApiError> {
        Ok(SectionPage {
            rows: Vec::new(),
            total_rows: 0,
            page,
            page_size,
            has_more: false,
        })
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        Ok(HealthStatus {
            status: "healthy".into(),
            timestamp: None,
        })
    }
}

/// Returns immediately and records every requested delay.
#[derive(Default)]
pub struct RecordingSleeper {
    pub sleeps: Mutex<Vec<Duration>>,
}

#[async_trait::async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        tokio::task::yield_now().await;
    }
}

/// Sleeps for real so a poll loop stays alive long enough to be cancelled.
pub struct RealSleeper;

#[async_trait::async_trait]
impl Sleeper for RealSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Default)]
pub struct VecSink {
    pub events: Mutex<Vec<EngineEvent>>,
}

impl ProgressSink for VecSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}
