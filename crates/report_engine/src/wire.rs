//! Wire records for the backend's JSON bodies and their validation into
//! domain types. Anything that does not match the documented shape is
//! rejected as [`FailureKind::MalformedResponse`](crate::FailureKind).

use std::collections::BTreeMap;

use report_core::{
    BitUsage, CpuId, JobProgress, JobStatus, PreviewEntry, PreviewRow, ProcessResult,
    SectionTotals, UsageStats,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ApiError, HealthStatus, HistoryEntry, SectionPage};

type Record = Map<String, Value>;

pub(crate) fn decode<T: DeserializeOwned>(endpoint: &str, body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|err| ApiError::malformed(format!("unexpected {endpoint} response: {err}")))
}

/// FastAPI error body: `{"detail": "..."}`; `detail` may also be a list.
pub(crate) fn error_detail(body: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        detail: Value,
    }
    let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
    match parsed.detail {
        Value::String(text) if !text.trim().is_empty() => Some(text),
        Value::Null | Value::String(_) => None,
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadResponse {
    pub filename: String,
}

impl UploadResponse {
    pub(crate) fn validate(self) -> Result<String, ApiError> {
        if self.filename.trim().is_empty() {
            return Err(ApiError::malformed("upload returned an empty filename"));
        }
        Ok(self.filename)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CpuListResponse {
    pub cpus: Vec<String>,
}

impl CpuListResponse {
    /// Drops blank and repeated names, keeping server order.
    pub(crate) fn validate(self) -> Vec<CpuId> {
        let mut cpus: Vec<CpuId> = Vec::with_capacity(self.cpus.len());
        for cpu in self.cpus {
            if !cpu.trim().is_empty() && !cpus.contains(&cpu) {
                cpus.push(cpu);
            }
        }
        cpus
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ProcessRequest<'a> {
    pub filename: &'a str,
    pub selected_cpus: &'a [CpuId],
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProcessResponse {
    pub job_id: String,
    pub individual_files: BTreeMap<String, String>,
    pub zip_file: String,
}

impl ProcessResponse {
    pub(crate) fn validate(self, selected: &[CpuId]) -> Result<ProcessResult, ApiError> {
        if self.job_id.trim().is_empty() {
            return Err(ApiError::malformed("process returned an empty job id"));
        }
        if let Some(missing) = selected
            .iter()
            .find(|cpu| !self.individual_files.contains_key(*cpu))
        {
            return Err(ApiError::malformed(format!(
                "process returned no output file for {missing}"
            )));
        }
        Ok(ProcessResult {
            job_id: self.job_id,
            individual_files: self.individual_files,
            zip_file: self.zip_file,
        })
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum RawStatus {
    Starting,
    Processing,
    Completed,
    Error,
}

impl From<RawStatus> for JobStatus {
    fn from(status: RawStatus) -> Self {
        match status {
            RawStatus::Starting => JobStatus::Starting,
            RawStatus::Processing => JobStatus::Processing,
            RawStatus::Completed => JobStatus::Completed,
            RawStatus::Error => JobStatus::Error,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProgressResponse {
    pub status: RawStatus,
    #[serde(default)]
    pub current_step: Option<String>,
    pub progress: u32,
    pub total_steps: u32,
    #[serde(default)]
    pub current_cpu: Option<String>,
    #[serde(default)]
    pub completed_cpus: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ProgressResponse {
    pub(crate) fn validate(self) -> Result<JobProgress, ApiError> {
        let status = JobStatus::from(self.status);
        if self.total_steps == 0 && !status.is_terminal() {
            return Err(ApiError::malformed("progress reported zero total steps"));
        }
        if self.progress > self.total_steps {
            return Err(ApiError::malformed(format!(
                "progress {} exceeds total steps {}",
                self.progress, self.total_steps
            )));
        }
        Ok(JobProgress {
            status,
            current_step: self.current_step.unwrap_or_default(),
            progress: self.progress,
            total_steps: self.total_steps,
            current_cpu: self.current_cpu.filter(|cpu| !cpu.is_empty()),
            completed_cpus: self.completed_cpus,
            error: self.error,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PreviewResponse {
    pub columns: Vec<String>,
    pub data: RawSections,
    pub total_rows: RawTotals,
    pub usage_stats: RawUsageStats,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSections {
    pub faults: Vec<Record>,
    pub manual_interventions: Vec<Record>,
    pub warnings: Vec<Record>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTotals {
    pub faults: usize,
    pub manual_interventions: usize,
    pub warnings: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawUsageStats {
    pub fault_bits: RawBitUsage,
    pub manual_intervention_bits: RawBitUsage,
    pub warning_bits: RawBitUsage,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct RawBitUsage {
    pub total: u32,
    pub used: u32,
    pub spare: u32,
    pub spare_percentage: f64,
}

impl From<RawBitUsage> for BitUsage {
    fn from(raw: RawBitUsage) -> Self {
        Self {
            total: raw.total,
            used: raw.used,
            spare: raw.spare,
            spare_percentage: raw.spare_percentage,
        }
    }
}

impl PreviewResponse {
    pub(crate) fn validate(self) -> Result<PreviewEntry, ApiError> {
        if self.columns.is_empty() {
            return Err(ApiError::malformed("preview has no columns"));
        }
        let columns = self.columns;
        let rows = |records: Vec<Record>| -> Vec<PreviewRow> {
            records
                .into_iter()
                .map(|record| {
                    PreviewRow::new(
                        columns
                            .iter()
                            .map(|column| record.get(column).map(cell_text).unwrap_or_default())
                            .collect(),
                    )
                })
                .collect()
        };
        let faults = rows(self.data.faults);
        let manual_interventions = rows(self.data.manual_interventions);
        let warnings = rows(self.data.warnings);
        Ok(PreviewEntry {
            faults,
            manual_interventions,
            warnings,
            total_rows: SectionTotals {
                faults: self.total_rows.faults,
                manual_interventions: self.total_rows.manual_interventions,
                warnings: self.total_rows.warnings,
            },
            usage: UsageStats {
                fault_bits: self.usage_stats.fault_bits.into(),
                manual_intervention_bits: self.usage_stats.manual_intervention_bits.into(),
                warning_bits: self.usage_stats.warning_bits.into(),
            },
            columns,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SectionPageResponse {
    pub data: Vec<Record>,
    pub total_rows: usize,
    pub page: usize,
    pub page_size: usize,
    pub has_more: bool,
}

impl SectionPageResponse {
    pub(crate) fn validate(self) -> SectionPage {
        SectionPage {
            rows: self
                .data
                .into_iter()
                .map(|record| {
                    record
                        .iter()
                        .map(|(key, value)| (key.clone(), cell_text(value)))
                        .collect()
                })
                .collect(),
            total_rows: self.total_rows,
            page: self.page,
            page_size: self.page_size,
            has_more: self.has_more,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryResponse {
    pub history: Vec<RawHistoryEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawHistoryEntry {
    pub filename: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub selected_cpus: Vec<String>,
    #[serde(default)]
    pub input_location: String,
}

impl HistoryResponse {
    pub(crate) fn validate(self) -> Vec<HistoryEntry> {
        self.history
            .into_iter()
            .map(|entry| HistoryEntry {
                filename: entry.filename,
                date: entry.date,
                selected_cpus: entry.selected_cpus,
                input_location: entry.input_location,
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl From<HealthResponse> for HealthStatus {
    fn from(raw: HealthResponse) -> Self {
        Self {
            status: raw.status,
            timestamp: raw.timestamp,
        }
    }
}

/// Display text for a JSON cell; strings are unquoted and null is empty.
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
