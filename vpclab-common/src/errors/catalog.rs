//! Error catalog for the lab harness.
//!
//! Every failure the operator can see has a stable code, a message and
//! remediation steps.
//!
//! # Error Code Ranges
//!
//! | Range      | Category     | Description                            |
//! |------------|--------------|----------------------------------------|
//! | E001-E099  | Config       | Configuration file and environment     |
//! | E100-E199  | Lifecycle    | Topology start/stop                    |
//! | E200-E299  | Verification | Connectivity and route injection       |
//! | E300-E399  | Reporting    | Persisting results                     |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lab documentation home.
pub const LAB_DOCS_URL: &str = "https://www.datum.net/docs/galactic-vpc/";

/// Error code enumeration, one variant per operator-visible failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // Config (E001-E099)
    /// Configuration file not found
    ConfigNotFound,
    /// Configuration file could not be read
    ConfigReadError,
    /// Configuration file contains invalid TOML
    ConfigParseError,
    /// Configuration contains invalid values
    ConfigValidationError,
    /// Environment variable has invalid value
    ConfigEnvError,

    // Lifecycle (E100-E199)
    /// Action needs a running topology
    TopologyNotRunning,
    /// Topology-up command exited non-zero
    TopologyStartFailed,
    /// Topology-up command hit its deadline
    TopologyStartTimeout,

    // Verification (E200-E299)
    /// At least one connectivity case failed
    ConnectivityFailed,
    /// Operator declined to continue without the control agent
    InjectionDeclined,

    // Reporting (E300-E399)
    /// Report file could not be written
    ReportWriteError,
    /// Report could not be serialized
    ReportSerializeError,
}

impl ErrorCode {
    pub const fn code_number(&self) -> u16 {
        match self {
            Self::ConfigNotFound => 1,
            Self::ConfigReadError => 2,
            Self::ConfigParseError => 3,
            Self::ConfigValidationError => 4,
            Self::ConfigEnvError => 5,

            Self::TopologyNotRunning => 101,
            Self::TopologyStartFailed => 102,
            Self::TopologyStartTimeout => 103,

            Self::ConnectivityFailed => 201,
            Self::InjectionDeclined => 202,

            Self::ReportWriteError => 301,
            Self::ReportSerializeError => 302,
        }
    }

    /// All codes, for catalog listings and tests.
    pub fn all() -> &'static [ErrorCode] {
        &[
            Self::ConfigNotFound,
            Self::ConfigReadError,
            Self::ConfigParseError,
            Self::ConfigValidationError,
            Self::ConfigEnvError,
            Self::TopologyNotRunning,
            Self::TopologyStartFailed,
            Self::TopologyStartTimeout,
            Self::ConnectivityFailed,
            Self::InjectionDeclined,
            Self::ReportWriteError,
            Self::ReportSerializeError,
        ]
    }

    /// Formatted code, e.g. `VLAB-E101`.
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("VLAB-E{:03}", self.code_number())
    }

    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self.code_number() {
            1..=99 => ErrorCategory::Config,
            100..=199 => ErrorCategory::Lifecycle,
            200..=299 => ErrorCategory::Verification,
            _ => ErrorCategory::Reporting,
        }
    }

    #[must_use]
    pub fn entry(&self) -> ErrorEntry {
        ErrorEntry {
            code: self.code_string(),
            category: self.category(),
            message: self.message().to_string(),
            remediation: self
                .remediation()
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            doc_url: self.doc_url().map(String::from),
        }
    }

    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::ConfigNotFound => "Configuration file not found",
            Self::ConfigReadError => "Failed to read configuration file",
            Self::ConfigParseError => "Configuration file contains invalid TOML",
            Self::ConfigValidationError => "Configuration contains invalid values",
            Self::ConfigEnvError => "Environment variable has invalid value",

            Self::TopologyNotRunning => "Lab is not running",
            Self::TopologyStartFailed => "Failed to start the lab topology",
            Self::TopologyStartTimeout => "Timed out starting the lab topology",

            Self::ConnectivityFailed => "One or more connectivity tests failed",
            Self::InjectionDeclined => "Route injection skipped without a running agent",

            Self::ReportWriteError => "Failed to write the test report",
            Self::ReportSerializeError => "Failed to serialize the test report",
        }
    }

    #[must_use]
    pub const fn remediation(&self) -> &'static [&'static str] {
        match self {
            Self::ConfigNotFound => &[
                "Check the path passed to --config",
                "Omit --config to use ~/.config/vpclab/config.toml or built-in defaults",
            ],
            Self::ConfigReadError => &["Check file permissions on the configuration file"],
            Self::ConfigParseError => &[
                "Fix the TOML syntax at the reported location",
                "Unknown keys are rejected; check for typos in section and field names",
            ],
            Self::ConfigValidationError => &[
                "Fix each listed field",
                "Every connectivity case must reference a node id declared under [[topology.nodes]]",
            ],
            Self::ConfigEnvError => &[
                "Fix or unset the listed VPCLAB_* variables",
                "VPCLAB_EXECUTION accepts auto, local or bridged",
            ],

            Self::TopologyNotRunning => &[
                "Start the lab first: vpclab --start",
                "Check containers: docker ps --filter 'name=clab-galactic'",
            ],
            Self::TopologyStartFailed => &[
                "Check the container runtime: sudo service docker status",
                "Run netlab manually from the lab directory: sudo netlab up",
                "Clean up a half-started lab: sudo netlab down --cleanup",
            ],
            Self::TopologyStartTimeout => &[
                "Image pulls on first start can be slow; retry once they finish",
                "Raise timeouts.topology_up_secs in the configuration",
                "Clean up a half-started lab: sudo netlab down --cleanup",
            ],

            Self::ConnectivityFailed => &[
                "Check ISIS neighbors: docker exec clab-galactic_vpc-sjc vtysh -c 'show isis neighbor'",
                "Check container status: docker ps",
                "Check bridge: brctl show",
            ],
            Self::InjectionDeclined => &[
                "Start the agent from its directory: sudo ./galactic-agent -config ../galactic-agent-config.yaml",
                "Re-run vpclab --mqtt once the agent is running",
            ],

            Self::ReportWriteError => &[
                "Check that the report directory exists and is writable",
                "Choose another location with --report <path>",
            ],
            Self::ReportSerializeError => &["Re-run with -v and include the log in a bug report"],
        }
    }

    #[must_use]
    pub const fn doc_url(&self) -> Option<&'static str> {
        match self.category() {
            ErrorCategory::Lifecycle | ErrorCategory::Verification => Some(LAB_DOCS_URL),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration file and environment (E001-E099)
    Config,
    /// Topology start/stop (E100-E199)
    Lifecycle,
    /// Connectivity and route injection (E200-E299)
    Verification,
    /// Persisting results (E300-E399)
    Reporting,
}

/// Full catalog entry for one error code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Error code string (e.g., "VLAB-E101")
    pub code: String,
    pub category: ErrorCategory,
    pub message: String,
    pub remediation: Vec<String>,
    pub doc_url: Option<String>,
}

impl ErrorEntry {
    /// Formats the error with numbered remediation steps.
    #[must_use]
    pub fn format_full(&self) -> String {
        let mut output = format!("[{}] {}\n\n", self.code, self.message);

        if !self.remediation.is_empty() {
            output.push_str("Remediation steps:\n");
            for (i, step) in self.remediation.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, step));
            }
        }

        if let Some(url) = &self.doc_url {
            output.push_str(&format!("\nFor more information: {}\n", url));
        }

        output
    }

    #[must_use]
    pub fn format_brief(&self) -> String {
        format!("[{}] {}", self.code, self.message)
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_brief())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_numbers_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for code in ErrorCode::all() {
            assert!(
                seen.insert(code.code_number()),
                "duplicate code number for {:?}",
                code
            );
        }
    }

    #[test]
    fn test_every_code_has_remediation() {
        for code in ErrorCode::all() {
            assert!(!code.remediation().is_empty(), "{:?} has no remediation", code);
            assert!(!code.message().is_empty());
        }
    }

    #[test]
    fn test_code_string_format() {
        assert_eq!(ErrorCode::ConfigNotFound.code_string(), "VLAB-E001");
        assert_eq!(ErrorCode::TopologyNotRunning.code_string(), "VLAB-E101");
        assert_eq!(ErrorCode::ReportWriteError.to_string(), "VLAB-E301");
    }

    #[test]
    fn test_categories_follow_ranges() {
        assert_eq!(ErrorCode::ConfigEnvError.category(), ErrorCategory::Config);
        assert_eq!(
            ErrorCode::TopologyStartTimeout.category(),
            ErrorCategory::Lifecycle
        );
        assert_eq!(
            ErrorCode::InjectionDeclined.category(),
            ErrorCategory::Verification
        );
        assert_eq!(
            ErrorCode::ReportSerializeError.category(),
            ErrorCategory::Reporting
        );
    }

    #[test]
    fn test_format_full_numbers_steps() {
        let text = ErrorCode::TopologyNotRunning.entry().format_full();
        assert!(text.starts_with("[VLAB-E101] Lab is not running"));
        assert!(text.contains("Remediation steps:\n  1. Start the lab first: vpclab --start"));
        assert!(text.contains("For more information: https://www.datum.net/docs/galactic-vpc/"));
    }

    #[test]
    fn test_config_entries_have_no_doc_url() {
        assert!(ErrorCode::ConfigParseError.entry().doc_url.is_none());
    }
}
