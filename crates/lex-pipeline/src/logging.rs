//! Tracing subscriber setup for console and file output.
//!
//! ```rust,ignore
//! use lex_pipeline::{LoggingConfig, init_logging};
//!
//! let config = LoggingConfig::builder()
//!     .level("debug")
//!     .log_dir("logs")
//!     .build();
//! let log_file = init_logging(&config)?;
//! ```

use crate::utils::timestamp;
use anyhow::Context;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Where log records go and at which level.
///
/// `RUST_LOG`, when set, takes precedence over `level`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub log_dir: PathBuf,
    /// File name inside `log_dir`; `pipeline_<timestamp>.log` when unset.
    pub log_file: Option<String>,
    pub console: bool,
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            log_file: None,
            console: true,
            file: true,
        }
    }
}

impl LoggingConfig {
    pub fn builder() -> LoggingConfigBuilder {
        LoggingConfigBuilder::default()
    }

    /// Path of the log file, or `None` when file output is off.
    pub fn log_file_path(&self) -> Option<PathBuf> {
        if !self.file {
            return None;
        }
        let name = match &self.log_file {
            Some(name) => name.clone(),
            None => format!("pipeline_{}.log", timestamp()),
        };
        Some(self.log_dir.join(name))
    }
}

/// Builder for [`LoggingConfig`].
#[derive(Debug, Default)]
pub struct LoggingConfigBuilder {
    level: Option<String>,
    log_dir: Option<PathBuf>,
    log_file: Option<String>,
    console: Option<bool>,
    file: Option<bool>,
}

impl LoggingConfigBuilder {
    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn log_file(mut self, name: impl Into<String>) -> Self {
        self.log_file = Some(name.into());
        self
    }

    pub fn console(mut self, enabled: bool) -> Self {
        self.console = Some(enabled);
        self
    }

    pub fn file(mut self, enabled: bool) -> Self {
        self.file = Some(enabled);
        self
    }

    pub fn build(self) -> LoggingConfig {
        let defaults = LoggingConfig::default();
        LoggingConfig {
            level: self.level.unwrap_or(defaults.level),
            log_dir: self.log_dir.unwrap_or(defaults.log_dir),
            log_file: self.log_file,
            console: self.console.unwrap_or(defaults.console),
            file: self.file.unwrap_or(defaults.file),
        }
    }
}

/// Install the global tracing subscriber.
///
/// Returns the path of the log file when file output is enabled. Fails if a
/// global subscriber is already installed or the log file cannot be opened.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<Option<PathBuf>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let console_layer = config
        .console
        .then(|| fmt::layer().with_target(false));

    let log_path = config.log_file_path();
    let file_layer = match &log_path {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(open_log_file(path)?)),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(log_path)
}

fn open_log_file(path: &Path) -> anyhow::Result<fs::File> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("cannot create log directory {}", dir.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file {}", path.display()))
}
