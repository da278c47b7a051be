use std::collections::VecDeque;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use anyhow::{bail, Context};
use report_core::{update, AppState, Msg, Section};
use report_engine::{EngineHandle, ReportApi, ReqwestApi};
use report_logging::{report_debug, report_info};

use super::autopilot::{Autopilot, Outcome, ProcessPlan};
use super::effects::EffectRunner;
use super::settings::Settings;
use super::ui::render;
use crate::cli::Command;

/// How long the loop waits for an engine event before ticking.
const TICK: Duration = Duration::from_millis(75);

/// Runs the full upload, process, preview and download workflow.
pub fn run_process(settings: &Settings, plan: ProcessPlan) -> anyhow::Result<()> {
    let engine = EngineHandle::new(settings.engine_config()).context("starting engine")?;
    let (msg_tx, msg_rx) = mpsc::channel::<Msg>();
    let runner = EffectRunner::new(engine, msg_tx);
    let mut driver = Driver::new(runner);
    let mut pilot = Autopilot::new(plan);
    let mut pending: VecDeque<Msg> = VecDeque::new();

    let outcome = loop {
        let step = pilot.react(&driver.state.view());
        for line in step.output {
            println!("{line}");
        }
        pending.extend(step.msgs);
        if let Some(outcome) = step.outcome {
            break outcome;
        }

        let msg = match pending.pop_front() {
            Some(msg) => msg,
            None => match msg_rx.recv_timeout(TICK) {
                Ok(msg) => msg,
                Err(RecvTimeoutError::Timeout) => Msg::Tick,
                Err(RecvTimeoutError::Disconnected) => bail!("engine stopped unexpectedly"),
            },
        };
        driver.dispatch(msg);
    };

    match outcome {
        Outcome::Finished { saved } => {
            report_info!("Workflow finished; {} file(s) saved", saved.len());
            Ok(())
        }
        Outcome::Failed(message) => bail!(message),
    }
}

/// Owns the controller state and applies messages one at a time.
struct Driver {
    state: AppState,
    runner: EffectRunner,
    last_status: String,
}

impl Driver {
    fn new(runner: EffectRunner) -> Self {
        Self {
            state: AppState::new(),
            runner,
            last_status: String::new(),
        }
    }

    fn dispatch(&mut self, msg: Msg) {
        if !matches!(msg, Msg::Tick) {
            report_debug!("dispatch {:?}", msg);
        }
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        self.runner.enqueue(effects);
        if self.state.consume_dirty() {
            let line = render::status_line(&self.state.view());
            if line != self.last_status {
                println!("{line}");
                self.last_status = line;
            }
        }
    }
}

/// Runs one of the single-request commands and returns the lines to print.
pub fn run_query(settings: &Settings, command: &Command) -> anyhow::Result<Vec<String>> {
    let api = ReqwestApi::new(settings.client_settings()).context("creating http client")?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting tokio runtime")?;
    runtime.block_on(query(&api, command))
}

async fn query(api: &dyn ReportApi, command: &Command) -> anyhow::Result<Vec<String>> {
    let lines = match command {
        Command::History => render::history(&api.history().await.context("GET /history/")?),
        Command::Rows {
            filename,
            cpu,
            section,
            page,
            page_size,
        } => {
            let section = Section::from(*section);
            let page = api
                .section_page(filename, cpu, section, *page, *page_size)
                .await
                .with_context(|| format!("fetching {} rows for {cpu}", section.key()))?;
            render::section_page(&page)
        }
        Command::Health => vec![render::health(
            &api.health().await.context("GET /health")?,
        )],
        Command::Process { .. } => {
            bail!("not a query command")
        }
    };
    Ok(lines)
}
