//! Errors raised by the lab harness.
//!
//! Most lab trouble is not an error: probes report booleans and best-effort
//! steps report warnings. [`LabError`] covers only what must stop an action:
//! bad configuration, a topology that cannot start, running a verification
//! against a stopped lab, and failing to persist results.

pub mod catalog;

use std::path::PathBuf;

use thiserror::Error;

pub use catalog::{ErrorCategory, ErrorCode, ErrorEntry};

#[derive(Debug, Error)]
pub enum LabError {
    #[error("Configuration file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    #[error("Failed to read {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in {}: {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },

    #[error("Invalid configuration: {}", problems.join("; "))]
    ConfigInvalid { problems: Vec<String> },

    #[error("Invalid environment: {}", problems.join("; "))]
    ConfigEnv { problems: Vec<String> },

    /// A verification was requested against a stopped lab.
    #[error("Lab is not running. Start it first with --start before running {action}.")]
    TopologyNotRunning { action: String },

    /// The topology-up command failed or hit its deadline.
    #[error("{}", start_failure_message(*exit_code, *timed_out, detail))]
    TopologyStartFailed {
        exit_code: Option<i32>,
        timed_out: bool,
        detail: String,
    },

    #[error("Failed to write report {}: {source}", path.display())]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize report: {0}")]
    ReportSerialize(#[from] serde_json::Error),
}

fn start_failure_message(exit_code: Option<i32>, timed_out: bool, detail: &str) -> String {
    let head = if timed_out {
        "Timed out starting lab".to_string()
    } else {
        match exit_code {
            Some(code) => format!("Failed to start lab (exit code {})", code),
            None => "Failed to start lab (terminated by signal)".to_string(),
        }
    };
    if detail.trim().is_empty() {
        head
    } else {
        format!("{}: {}", head, detail.trim())
    }
}

impl LabError {
    /// Catalog code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Self::ConfigRead { .. } => ErrorCode::ConfigReadError,
            Self::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Self::ConfigInvalid { .. } => ErrorCode::ConfigValidationError,
            Self::ConfigEnv { .. } => ErrorCode::ConfigEnvError,
            Self::TopologyNotRunning { .. } => ErrorCode::TopologyNotRunning,
            Self::TopologyStartFailed {
                timed_out: true, ..
            } => ErrorCode::TopologyStartTimeout,
            Self::TopologyStartFailed { .. } => ErrorCode::TopologyStartFailed,
            Self::ReportWrite { .. } => ErrorCode::ReportWriteError,
            Self::ReportSerialize(_) => ErrorCode::ReportSerializeError,
        }
    }

    /// Catalog entry for this error.
    pub fn entry(&self) -> ErrorEntry {
        self.code().entry()
    }

    /// Precondition failure for `action`.
    pub fn not_running(action: impl Into<String>) -> Self {
        Self::TopologyNotRunning {
            action: action.into(),
        }
    }
}
