//! Tracing setup shared by the binary and integration tests.
//!
//! Operator output goes to stdout through the console; tracing goes to stderr
//! (human-readable or JSON) and optionally to a JSON log file.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable holding the filter directive.
pub const LOG_ENV: &str = "VPCLAB_LOG";
/// Environment variable holding an optional JSON log file path.
pub const LOG_FILE_ENV: &str = "VPCLAB_LOG_FILE";
/// Set to `json` for JSON lines on stderr.
pub const LOG_FORMAT_ENV: &str = "VPCLAB_LOG_FORMAT";

#[derive(Debug, Error)]
pub enum LogInitError {
    #[error("Invalid log filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },

    #[error("Cannot create log directory {}: {source}", path.display())]
    LogDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to install tracing subscriber: {0}")]
    Init(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `warn` or `vpclab_common=debug`.
    pub level: String,
    pub stderr: bool,
    pub json_stderr: bool,
    pub file: Option<PathBuf>,
}

impl LogConfig {
    /// Read `VPCLAB_LOG`, `VPCLAB_LOG_FILE` and `VPCLAB_LOG_FORMAT`.
    pub fn from_env(default_level: &str) -> Self {
        let level = std::env::var(LOG_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default_level.to_string());
        let file = std::env::var(LOG_FILE_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        let json_stderr = std::env::var(LOG_FORMAT_ENV)
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Self {
            level,
            stderr: false,
            json_stderr,
            file,
        }
    }

    pub fn with_stderr(mut self) -> Self {
        self.stderr = true;
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    fn filter(&self) -> Result<EnvFilter, LogInitError> {
        EnvFilter::try_new(&self.level).map_err(|e| LogInitError::InvalidFilter {
            filter: self.level.clone(),
            message: e.to_string(),
        })
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            stderr: true,
            json_stderr: false,
            file: None,
        }
    }
}

/// Keeps non-blocking writers flushing until dropped.
#[must_use = "dropping the guards stops log file output"]
pub struct LoggingGuards {
    _guards: Vec<WorkerGuard>,
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn file_layer(path: &Path, guards: &mut Vec<WorkerGuard>) -> Result<BoxedLayer, LogInitError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|source| LogInitError::LogDir {
        path: dir.to_path_buf(),
        source,
    })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "vpclab.log".into());

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    guards.push(guard);

    Ok(tracing_subscriber::fmt::layer()
        .json()
        .with_writer(writer)
        .with_current_span(true)
        .with_thread_ids(true)
        .boxed())
}

/// Install the global subscriber described by `config`.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuards, LogInitError> {
    let filter = config.filter()?;
    let mut guards = Vec::new();
    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.stderr {
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false);
        if config.json_stderr {
            layers.push(layer.json().boxed());
        } else {
            layers.push(layer.compact().boxed());
        }
    }

    if let Some(path) = &config.file {
        layers.push(file_layer(path, &mut guards)?);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| LogInitError::Init(e.to_string()))?;

    Ok(LoggingGuards { _guards: guards })
}
