#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Once;

use report_core::{
    update, AppState, Effect, Failure, FailureCause, JobProgress, JobStatus, Msg, PreviewEntry,
    PreviewRow, ProcessResult, SectionTotals, UploadedFile,
};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(report_logging::initialize_for_tests);
}

/// Selects `file` and answers the upload with `cpus`.
pub fn uploaded(file: &str, cpus: &[&str]) -> AppState {
    let (state, effects) = update(AppState::new(), Msg::FileSelected(PathBuf::from(file)));
    let ticket = upload_ticket(&effects);
    let (state, _) = update(
        state,
        Msg::UploadFinished {
            ticket,
            result: Ok(UploadedFile {
                filename: file.to_string(),
                cpus: cpus.iter().map(|c| c.to_string()).collect(),
            }),
        },
    );
    state
}

pub fn upload_ticket(effects: &[Effect]) -> u64 {
    effects
        .iter()
        .find_map(|effect| match effect {
            Effect::Upload { ticket, .. } => Some(*ticket),
            _ => None,
        })
        .expect("upload effect")
}

pub fn submit_ticket(effects: &[Effect]) -> u64 {
    effects
        .iter()
        .find_map(|effect| match effect {
            Effect::SubmitJob { ticket, .. } => Some(*ticket),
            _ => None,
        })
        .expect("submit effect")
}

pub fn select(mut state: AppState, cpus: &[&str]) -> AppState {
    for cpu in cpus {
        state = update(state, Msg::CpuToggled(cpu.to_string())).0;
    }
    state
}

pub fn process_result(job_id: &str, files: &[(&str, &str)], zip: &str) -> ProcessResult {
    ProcessResult {
        job_id: job_id.to_string(),
        individual_files: files
            .iter()
            .map(|(cpu, file)| (cpu.to_string(), file.to_string()))
            .collect::<BTreeMap<_, _>>(),
        zip_file: zip.to_string(),
    }
}

/// Clicks Process and accepts the submission with `result`.
pub fn submitted(state: AppState, result: ProcessResult) -> (AppState, Vec<Effect>) {
    let (state, effects) = update(state, Msg::ProcessClicked);
    let ticket = submit_ticket(&effects);
    update(
        state,
        Msg::JobSubmitted {
            ticket,
            result: Ok(result),
        },
    )
}

pub fn progress(status: JobStatus, progress: u32, total_steps: u32) -> JobProgress {
    JobProgress {
        status,
        current_step: format!("step {progress}"),
        progress,
        total_steps,
        current_cpu: None,
        completed_cpus: Vec::new(),
        error: None,
    }
}

pub fn poll(
    state: AppState,
    job_id: &str,
    attempt: u32,
    progress: JobProgress,
) -> (AppState, Vec<Effect>) {
    update(
        state,
        Msg::ProgressPolled {
            job_id: job_id.to_string(),
            attempt,
            progress,
        },
    )
}

pub fn failure(message: &str) -> Failure {
    Failure::new(FailureCause::Network, message)
}

pub fn row(cells: &[&str]) -> PreviewRow {
    PreviewRow::new(cells.iter().map(|c| c.to_string()).collect())
}

pub fn preview(faults: Vec<PreviewRow>) -> PreviewEntry {
    PreviewEntry {
        columns: vec!["Trigger Value".to_string(), "Description".to_string()],
        total_rows: SectionTotals {
            faults: faults.len(),
            ..SectionTotals::default()
        },
        faults,
        ..PreviewEntry::default()
    }
}
