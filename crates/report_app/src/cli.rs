//! Command-line parsing for `cpu_report`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use report_core::Section;

pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Parser)]
#[command(
    name = "cpu_report",
    version,
    about = "Uploads a CPU spreadsheet, processes it and downloads the reports"
)]
pub struct Cli {
    #[command(flatten)]
    pub options: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Args)]
pub struct GlobalOptions {
    /// Backend base URL
    #[arg(long = "api", global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Directory for downloaded files
    #[arg(long = "out", global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Settings file (RON)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Upload a workbook, process the selected CPUs and download the results
    Process {
        file: PathBuf,

        /// CPU to process; repeat for several
        #[arg(long = "cpu", value_name = "NAME", conflicts_with = "all")]
        cpus: Vec<String>,

        /// Process every CPU found in the workbook
        #[arg(long)]
        all: bool,

        /// Filters printed preview rows
        #[arg(long, value_name = "TEXT")]
        search: Option<String>,
    },
    /// List previously processed uploads
    History,
    /// Print one page of a section for a processed CPU
    Rows {
        filename: String,
        cpu: String,
        #[arg(value_enum)]
        section: SectionArg,

        #[arg(long, default_value_t = 0)]
        page: usize,

        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: usize,
    },
    /// Check that the backend is reachable
    Health,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum SectionArg {
    Faults,
    ManualInterventions,
    Warnings,
}

impl From<SectionArg> for Section {
    fn from(arg: SectionArg) -> Self {
        match arg {
            SectionArg::Faults => Section::Faults,
            SectionArg::ManualInterventions => Section::ManualInterventions,
            SectionArg::Warnings => Section::Warnings,
        }
    }
}
