//! Settings: built-in defaults, then an optional RON file, then environment,
//! then command-line flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use report_engine::{ClientSettings, EngineConfig, PollSettings, DEFAULT_API_URL};
use report_logging::{report_debug, report_info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::GlobalOptions;

pub const SETTINGS_FILENAME: &str = "cpu_report.ron";
pub const ENV_API_URL: &str = "CPU_REPORT_API_URL";
pub const ENV_OUTPUT_DIR: &str = "CPU_REPORT_OUTPUT_DIR";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse settings from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_url: String,
    pub output_dir: PathBuf,
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_upload_bytes: u64,
    pub max_download_bytes: u64,
    pub log_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        let client = ClientSettings::default();
        let poll = PollSettings::default();
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            output_dir: PathBuf::from("output"),
            poll_interval_ms: poll.interval.as_millis() as u64,
            max_poll_attempts: poll.max_attempts,
            connect_timeout_secs: client.connect_timeout.as_secs(),
            request_timeout_secs: client.request_timeout.as_secs(),
            max_upload_bytes: client.max_upload_bytes,
            max_download_bytes: client.max_download_bytes,
            log_file: Some(PathBuf::from(report_logging::DEFAULT_LOG_FILE)),
        }
    }
}

impl Settings {
    /// Reads `path`, or `cpu_report.ron` in the working directory when no path
    /// is given. Only an explicitly named file has to exist.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(SETTINGS_FILENAME), false),
        };
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && !required => {
                report_debug!("No settings file at {:?}; using defaults", path);
                return Ok(Self::default());
            }
            Err(source) => return Err(SettingsError::Read { path, source }),
        };
        let settings =
            ron::from_str(&content).map_err(|source| SettingsError::Parse {
                path: path.clone(),
                source,
            })?;
        report_info!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Applies environment overrides through `lookup` (normally `std::env::var`).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_url = url;
        }
        if let Some(dir) = lookup(ENV_OUTPUT_DIR).filter(|v| !v.trim().is_empty()) {
            self.output_dir = PathBuf::from(dir);
        }
    }

    pub fn apply_cli(&mut self, options: &GlobalOptions) {
        if let Some(url) = &options.api_url {
            self.api_url = url.clone();
        }
        if let Some(dir) = &options.output_dir {
            self.output_dir = dir.clone();
        }
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.api_url.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_upload_bytes: self.max_upload_bytes,
            max_download_bytes: self.max_download_bytes,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            client: self.client_settings(),
            poll: PollSettings {
                interval: Duration::from_millis(self.poll_interval_ms),
                max_attempts: self.max_poll_attempts,
            },
            output_dir: self.output_dir.clone(),
        }
    }
}
