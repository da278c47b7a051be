mod app;
mod autopilot;
mod effects;
mod settings;
mod ui;

use log::LevelFilter;
use report_logging::{report_info, LogDestination};

use crate::cli::{Cli, Command};

use autopilot::ProcessPlan;
use settings::Settings;

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = Settings::load(cli.options.config.as_deref())?;
    settings.apply_env(|key| std::env::var(key).ok());
    settings.apply_cli(&cli.options);
    init_logging(&settings, cli.options.verbose);
    report_info!(
        "cpu_report {} using {}",
        env!("CARGO_PKG_VERSION"),
        settings.api_url
    );

    match cli.command {
        Command::Process {
            file,
            cpus,
            all,
            search,
        } => app::run_process(
            &settings,
            ProcessPlan {
                file,
                cpus,
                all,
                search,
            },
        ),
        command => {
            for line in app::run_query(&settings, &command)? {
                println!("{line}");
            }
            Ok(())
        }
    }
}

fn init_logging(settings: &Settings, verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let destination = match (&settings.log_file, verbose) {
        (Some(path), true) => LogDestination::Both(path.clone()),
        (Some(path), false) => LogDestination::File(path.clone()),
        (None, _) => LogDestination::Terminal,
    };
    report_logging::initialize(&destination, level);
}
