use report_logging::{report_debug, report_info};

use crate::state::is_supported_spreadsheet;
use crate::{AppState, Effect, JobStatus, Msg};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::FileSelected(path) => {
            if !is_supported_spreadsheet(&path) {
                let superseded = state.reject_file(&path);
                return (state, cancel_effect(superseded));
            }
            let (ticket, superseded) = state.begin_upload(path.clone());
            let mut effects = cancel_effect(superseded);
            effects.push(Effect::Upload { ticket, path });
            effects
        }
        Msg::UploadFinished { ticket, result } => {
            if state.is_current_ticket(ticket) && state.phase() == crate::Phase::Uploading {
                state.apply_upload(result);
            } else {
                report_debug!("Discarding stale upload result (ticket {})", ticket);
            }
            Vec::new()
        }
        Msg::CpuToggled(cpu) => {
            if !state.job_in_flight() {
                state.toggle_cpu(&cpu);
            }
            Vec::new()
        }
        Msg::SelectAllCpus => {
            if !state.job_in_flight() {
                state.select_all();
            }
            Vec::new()
        }
        Msg::ClearCpuSelection => {
            if !state.job_in_flight() {
                state.clear_selection();
            }
            Vec::new()
        }
        Msg::ProcessClicked => {
            if !state.can_process() {
                return (state, Vec::new());
            }
            match state.begin_submission() {
                Some((ticket, filename, cpus)) => {
                    report_info!("Submitting {} with {} CPU(s)", filename, cpus.len());
                    vec![Effect::SubmitJob {
                        ticket,
                        filename,
                        cpus,
                    }]
                }
                None => Vec::new(),
            }
        }
        Msg::JobSubmitted { ticket, result } => {
            if !(state.is_current_ticket(ticket) && state.is_awaiting_submission()) {
                report_debug!("Discarding stale submission (ticket {})", ticket);
                return (state, Vec::new());
            }
            match state.apply_submission(result) {
                Some(job_id) => vec![Effect::StartPolling { job_id }],
                None => Vec::new(),
            }
        }
        Msg::ProgressPolled {
            job_id,
            attempt,
            progress,
        } => {
            if !state.is_current_job(&job_id) {
                return (state, Vec::new());
            }
            match state.apply_progress(attempt, progress) {
                Some(JobStatus::Completed) => {
                    report_info!("Job {} completed", job_id);
                    preview_effects(&state, state.selected_cpus())
                }
                Some(status) => {
                    report_info!("Job {} ended with status {:?}", job_id, status);
                    Vec::new()
                }
                None => Vec::new(),
            }
        }
        Msg::PollFailed { job_id, failure } => {
            if state.is_current_job(&job_id) {
                state.apply_poll_failure(failure);
            }
            Vec::new()
        }
        Msg::PreviewLoaded {
            job_id,
            cpu,
            result,
        } => {
            if state.is_current_job(&job_id) {
                state.apply_preview(cpu, result);
            }
            Vec::new()
        }
        Msg::PreviewRequested(cpu) => {
            if !state.is_selected(&cpu) {
                return (state, Vec::new());
            }
            let effects = preview_effects(&state, std::slice::from_ref(&cpu));
            if !effects.is_empty() {
                state.begin_preview_reload(&cpu);
            }
            effects
        }
        Msg::PreviewFocusChanged(cpu) => {
            state.focus_preview(cpu);
            Vec::new()
        }
        Msg::SectionChanged(section) => {
            state.set_section(section);
            Vec::new()
        }
        Msg::SearchChanged(search) => {
            state.set_search(search);
            Vec::new()
        }
        Msg::DownloadClicked(cpu) => match state.resolve_download(&cpu) {
            Some(filename) => download_effect(&mut state, filename),
            None => Vec::new(),
        },
        Msg::DownloadAllClicked => match state.resolve_archive() {
            Some(filename) => download_effect(&mut state, filename),
            None => Vec::new(),
        },
        Msg::DownloadFinished { filename, result } => {
            state.apply_download(&filename, result);
            Vec::new()
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn cancel_effect(superseded: Option<crate::JobId>) -> Vec<Effect> {
    superseded
        .map(|job_id| Effect::CancelPolling { job_id })
        .into_iter()
        .collect()
}

fn preview_effects(state: &AppState, cpus: &[crate::CpuId]) -> Vec<Effect> {
    let Some((job_id, filename)) = state.preview_source() else {
        return Vec::new();
    };
    cpus.iter()
        .map(|cpu| Effect::FetchPreview {
            job_id: job_id.clone(),
            filename: filename.clone(),
            cpu: cpu.clone(),
        })
        .collect()
}

fn download_effect(state: &mut AppState, filename: String) -> Vec<Effect> {
    if state.start_download(&filename) {
        vec![Effect::Download { filename }]
    } else {
        Vec::new()
    }
}
