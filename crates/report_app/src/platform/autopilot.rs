//! Scripted user for the `process` command: picks the file, ticks CPUs,
//! clicks Process, walks every preview tab and section, then downloads
//! everything the job produced.

use std::collections::VecDeque;
use std::path::PathBuf;

use report_core::{AppViewModel, CpuId, Msg, Phase, PreviewTabState, Section};

use super::ui::render;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessPlan {
    pub file: PathBuf,
    pub cpus: Vec<CpuId>,
    pub all: bool,
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Finished { saved: Vec<PathBuf> },
    Failed(String),
}

/// What to do after looking at one view.
#[derive(Debug, Default, PartialEq)]
pub struct Step {
    pub msgs: Vec<Msg>,
    pub output: Vec<String>,
    pub outcome: Option<Outcome>,
}

#[derive(Debug)]
enum Stage {
    Start,
    AwaitUpload,
    AwaitJob,
    Previews {
        queue: VecDeque<(CpuId, Section)>,
        pending: Option<(CpuId, Section)>,
    },
    AwaitDownloads,
    Done,
}

pub struct Autopilot {
    plan: ProcessPlan,
    stage: Stage,
}

impl Autopilot {
    pub fn new(plan: ProcessPlan) -> Self {
        Self {
            plan,
            stage: Stage::Start,
        }
    }

    pub fn react(&mut self, view: &AppViewModel) -> Step {
        let mut step = Step::default();
        match &mut self.stage {
            Stage::Start => {
                step.msgs.push(Msg::FileSelected(self.plan.file.clone()));
                self.stage = Stage::AwaitUpload;
            }
            Stage::AwaitUpload => match view.phase {
                Phase::Ready => {
                    step = self.select_and_process(view);
                    if step.outcome.is_none() {
                        self.stage = Stage::AwaitJob;
                    }
                }
                Phase::Idle => {
                    if let Some(error) = &view.error {
                        step.outcome = Some(Outcome::Failed(render::format_error(error)));
                    }
                }
                _ => {}
            },
            Stage::AwaitJob => match view.phase {
                Phase::Completed => {
                    if let Some(downloads) = &view.downloads {
                        step.output.push("Results:".to_string());
                        step.output.extend(render::downloads(downloads));
                    }
                    if let Some(search) = &self.plan.search {
                        step.msgs.push(Msg::SearchChanged(search.clone()));
                    }
                    let queue = view
                        .preview
                        .iter()
                        .flat_map(|preview| preview.tabs.iter())
                        .flat_map(|tab| Section::ALL.map(|section| (tab.cpu.clone(), section)))
                        .collect();
                    self.stage = Stage::Previews {
                        queue,
                        pending: None,
                    };
                }
                Phase::Error => {
                    let message = view
                        .error
                        .as_ref()
                        .map(render::format_error)
                        .unwrap_or_else(|| "Processing failed".to_string());
                    step.outcome = Some(Outcome::Failed(message));
                }
                _ => {}
            },
            Stage::Previews { queue, pending } => {
                let Some(preview) = &view.preview else {
                    step.outcome = Some(Outcome::Failed("No previews available".to_string()));
                    self.stage = Stage::Done;
                    return step;
                };
                if preview
                    .tabs
                    .iter()
                    .any(|tab| {
                        matches!(
                            tab.state,
                            PreviewTabState::Loading | PreviewTabState::Reloading
                        )
                    })
                {
                    return step;
                }
                if let Some((cpu, section)) = pending.clone() {
                    let focused_section = preview.focused.as_ref().map(|focused| focused.section);
                    if preview.focus != cpu
                        || focused_section.is_some_and(|current| current != section)
                    {
                        return step;
                    }
                    if section == Section::ALL[0] {
                        step.output.extend(render::preview_header(preview));
                    }
                    match &preview.focused {
                        Some(focused) => step.output.extend(render::section_table(focused)),
                        None => queue.retain(|(queued, _)| queued != &cpu),
                    }
                    *pending = None;
                }
                match queue.pop_front() {
                    Some((cpu, section)) => {
                        step.msgs.push(Msg::PreviewFocusChanged(cpu.clone()));
                        step.msgs.push(Msg::SectionChanged(section));
                        *pending = Some((cpu, section));
                    }
                    None => {
                        step.msgs = download_msgs(view);
                        self.stage = Stage::AwaitDownloads;
                    }
                }
            }
            Stage::AwaitDownloads => {
                if view.downloads_in_flight.is_empty() {
                    step.output.extend(
                        view.saved_files
                            .iter()
                            .map(|path| format!("Saved {}", path.display())),
                    );
                    step.outcome = Some(match &view.error {
                        Some(error) => Outcome::Failed(render::format_error(error)),
                        None => Outcome::Finished {
                            saved: view.saved_files.clone(),
                        },
                    });
                }
            }
            Stage::Done => {}
        }
        if step.outcome.is_some() {
            self.stage = Stage::Done;
        }
        step
    }

    fn select_and_process(&self, view: &AppViewModel) -> Step {
        let mut step = Step::default();
        let available: Vec<&str> = view.cpus.iter().map(|cpu| cpu.cpu.as_str()).collect();
        step.output.push(format!("CPUs in {}:", view.filename.as_deref().unwrap_or("file")));
        step.output.extend(render::cpu_list(view));
        if available.is_empty() {
            step.outcome = Some(Outcome::Failed("The file lists no CPUs".to_string()));
            return step;
        }

        if self.plan.all {
            step.msgs.push(Msg::SelectAllCpus);
        } else {
            let mut chosen: Vec<&str> = Vec::new();
            for cpu in &self.plan.cpus {
                if !available.contains(&cpu.as_str()) {
                    step.output.push(format!("Skipping unknown CPU {cpu}"));
                } else if !chosen.contains(&cpu.as_str()) {
                    chosen.push(cpu);
                    step.msgs.push(Msg::CpuToggled(cpu.clone()));
                }
            }
            if chosen.is_empty() {
                step.outcome = Some(Outcome::Failed(format!(
                    "No CPU selected; pick from {} with --cpu NAME or use --all",
                    available.join(", ")
                )));
                return step;
            }
        }
        step.msgs.push(Msg::ProcessClicked);
        step
    }
}

fn download_msgs(view: &AppViewModel) -> Vec<Msg> {
    let Some(downloads) = &view.downloads else {
        return Vec::new();
    };
    let mut msgs: Vec<Msg> = downloads
        .files
        .iter()
        .map(|file| Msg::DownloadClicked(file.cpu.clone()))
        .collect();
    if downloads.zip_file.is_some() {
        msgs.push(Msg::DownloadAllClicked);
    }
    msgs
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use pretty_assertions::assert_eq;
    use report_core::{
        update, AppState, Effect, Failure, FailureCause, JobProgress, JobStatus, PreviewEntry,
        PreviewRow, ProcessResult, UploadedFile,
    };

    /// Answers effects the way a healthy backend would.
    struct FakeBackend {
        cpus: Vec<CpuId>,
        fail_job: bool,
        failing_preview: Option<CpuId>,
        submitted: Vec<Vec<CpuId>>,
        downloads: Vec<String>,
    }

    impl FakeBackend {
        fn new(cpus: &[&str]) -> Self {
            Self {
                cpus: cpus.iter().map(|cpu| cpu.to_string()).collect(),
                fail_job: false,
                failing_preview: None,
                submitted: Vec::new(),
                downloads: Vec::new(),
            }
        }

        fn answer(&mut self, effect: Effect) -> Vec<Msg> {
            match effect {
                Effect::Upload { ticket, path } => vec![Msg::UploadFinished {
                    ticket,
                    result: Ok(UploadedFile {
                        filename: path.display().to_string(),
                        cpus: self.cpus.clone(),
                    }),
                }],
                Effect::SubmitJob { ticket, cpus, .. } => {
                    self.submitted.push(cpus.clone());
                    vec![Msg::JobSubmitted {
                        ticket,
                        result: Ok(ProcessResult {
                            job_id: "job_1".into(),
                            individual_files: cpus
                                .iter()
                                .map(|cpu| (cpu.clone(), format!("{cpu}.xlsx")))
                                .collect::<BTreeMap<_, _>>(),
                            zip_file: "all.zip".into(),
                        }),
                    }]
                }
                Effect::StartPolling { job_id } => {
                    let mut last = progress(JobStatus::Completed, 2);
                    if self.fail_job {
                        last.status = JobStatus::Error;
                        last.error = Some("Sheet missing".into());
                    }
                    vec![
                        Msg::ProgressPolled {
                            job_id: job_id.clone(),
                            attempt: 1,
                            progress: progress(JobStatus::Processing, 1),
                        },
                        Msg::ProgressPolled {
                            job_id,
                            attempt: 2,
                            progress: last,
                        },
                    ]
                }
                Effect::CancelPolling { .. } => Vec::new(),
                Effect::FetchPreview { job_id, cpu, .. } => {
                    let result = if self.failing_preview.as_ref() == Some(&cpu) {
                        Err(Failure::new(FailureCause::Server, "No data"))
                    } else {
                        Ok(preview_entry())
                    };
                    vec![Msg::PreviewLoaded {
                        job_id,
                        cpu,
                        result,
                    }]
                }
                Effect::Download { filename } => {
                    self.downloads.push(filename.clone());
                    vec![Msg::DownloadFinished {
                        result: Ok(PathBuf::from("out").join(&filename)),
                        filename,
                    }]
                }
            }
        }
    }

    fn progress(status: JobStatus, step: u32) -> JobProgress {
        JobProgress {
            status,
            current_step: format!("step {step}"),
            progress: step,
            total_steps: 2,
            current_cpu: None,
            completed_cpus: Vec::new(),
            error: None,
        }
    }

    fn preview_entry() -> PreviewEntry {
        PreviewEntry {
            columns: vec!["Description".into()],
            faults: vec![PreviewRow::new(vec!["Overload".into()])],
            warnings: vec![PreviewRow::new(vec!["Low oil".into()])],
            ..PreviewEntry::default()
        }
    }

    fn plan(cpus: &[&str], all: bool) -> ProcessPlan {
        ProcessPlan {
            file: PathBuf::from("data.xlsm"),
            cpus: cpus.iter().map(|cpu| cpu.to_string()).collect(),
            all,
            search: None,
        }
    }

    /// Runs the pilot to completion; returns the outcome and printed lines.
    fn drive(pilot: &mut Autopilot, backend: &mut FakeBackend) -> (Outcome, Vec<String>) {
        let mut state = AppState::new();
        let mut inbox: VecDeque<Msg> = VecDeque::new();
        let mut output = Vec::new();
        for _ in 0..500 {
            let step = pilot.react(&state.view());
            output.extend(step.output);
            inbox.extend(step.msgs);
            if let Some(outcome) = step.outcome {
                return (outcome, output);
            }
            let msg = inbox.pop_front().unwrap_or(Msg::Tick);
            let (next, effects) = update(state, msg);
            state = next;
            for effect in effects {
                inbox.extend(backend.answer(effect));
            }
        }
        panic!("autopilot did not finish");
    }

    #[test]
    fn selected_cpus_are_processed_previewed_and_downloaded() {
        let mut backend = FakeBackend::new(&["CPU1", "CPU2", "CPU3"]);
        let mut pilot = Autopilot::new(plan(&["CPU3", "CPU1", "CPU3"], false));

        let (outcome, output) = drive(&mut pilot, &mut backend);

        assert_eq!(backend.submitted, vec![vec!["CPU3".to_string(), "CPU1".to_string()]]);
        assert_eq!(backend.downloads, vec!["CPU1.xlsx", "CPU3.xlsx", "all.zip"]);
        assert_eq!(
            outcome,
            Outcome::Finished {
                saved: vec![
                    PathBuf::from("out/CPU1.xlsx"),
                    PathBuf::from("out/CPU3.xlsx"),
                    PathBuf::from("out/all.zip"),
                ]
            }
        );
        let headers: Vec<&String> = output
            .iter()
            .filter(|line| line.starts_with("== Preview"))
            .collect();
        assert_eq!(
            headers,
            vec!["== Preview: *CPU3 | CPU1 ==", "== Preview: CPU3 | *CPU1 =="]
        );
        assert_eq!(
            output.iter().filter(|line| line.starts_with("Showing")).count(),
            6
        );
    }

    #[test]
    fn single_cpu_skips_archive() {
        let mut backend = FakeBackend::new(&["CPU1", "CPU2"]);
        let mut pilot = Autopilot::new(plan(&["CPU2"], false));

        let (outcome, _) = drive(&mut pilot, &mut backend);

        assert!(matches!(outcome, Outcome::Finished { .. }));
        assert_eq!(backend.downloads, vec!["CPU2.xlsx"]);
    }

    #[test]
    fn all_flag_selects_every_cpu() {
        let mut backend = FakeBackend::new(&["CPU1", "CPU2"]);
        let mut pilot = Autopilot::new(plan(&[], true));

        drive(&mut pilot, &mut backend);

        assert_eq!(backend.submitted, vec![vec!["CPU1".to_string(), "CPU2".to_string()]]);
    }

    #[test]
    fn unknown_cpus_only_fails_before_processing() {
        let mut backend = FakeBackend::new(&["CPU1"]);
        let mut pilot = Autopilot::new(plan(&["CPU9"], false));

        let (outcome, output) = drive(&mut pilot, &mut backend);

        assert!(backend.submitted.is_empty());
        assert!(output.contains(&"Skipping unknown CPU CPU9".to_string()));
        assert_eq!(
            outcome,
            Outcome::Failed("No CPU selected; pick from CPU1 with --cpu NAME or use --all".into())
        );
    }

    #[test]
    fn server_job_error_fails_the_run() {
        let mut backend = FakeBackend::new(&["CPU1"]);
        backend.fail_job = true;
        let mut pilot = Autopilot::new(plan(&["CPU1"], false));

        let (outcome, _) = drive(&mut pilot, &mut backend);

        assert_eq!(
            outcome,
            Outcome::Failed("Processing failed: Sheet missing".into())
        );
        assert!(backend.downloads.is_empty());
    }

    #[test]
    fn failed_preview_does_not_block_downloads() {
        let mut backend = FakeBackend::new(&["CPU1", "CPU2"]);
        backend.failing_preview = Some("CPU1".into());
        let mut pilot = Autopilot::new(plan(&[], true));

        let (outcome, output) = drive(&mut pilot, &mut backend);

        assert!(output.contains(&"No preview for CPU1: No data".to_string()));
        assert!(matches!(outcome, Outcome::Finished { .. }));
        assert_eq!(backend.downloads.len(), 3);
    }

    #[test]
    fn unsupported_file_is_rejected_without_upload() {
        let mut backend = FakeBackend::new(&["CPU1"]);
        let mut pilot = Autopilot::new(ProcessPlan {
            file: PathBuf::from("notes.csv"),
            ..plan(&["CPU1"], false)
        });

        let (outcome, _) = drive(&mut pilot, &mut backend);

        match outcome {
            Outcome::Failed(message) => assert!(message.starts_with("Upload failed")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
