//! Configuration for the lab harness.
//!
//! Layering, lowest to highest precedence:
//! - built-in defaults (the galactic three-POP lab)
//! - TOML file (`--config <path>` or `<config_dir>/vpclab/config.toml`)
//! - `VPCLAB_*` environment variables
//!
//! The loaded configuration is validated once and then only read.

pub mod env;
pub mod validate;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::LabError;
use crate::errors::catalog::LAB_DOCS_URL;
use crate::types::{ExecutionTarget, Topology};

pub use env::{EnvError, EnvParser};
pub use validate::{ConfigWarning, Severity, validate_config};

#[cfg(test)]
pub(crate) fn env_test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// How the execution target is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Detect from the host (see [`ExecutionTarget::detect`]).
    #[default]
    Auto,
    Local,
    Bridged,
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "local" => Ok(Self::Local),
            "bridged" | "wsl" => Ok(Self::Bridged),
            other => Err(format!("unknown execution mode '{}'", other)),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Local => write!(f, "local"),
            Self::Bridged => write!(f, "bridged"),
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LabConfig {
    pub lab: LabSection,
    pub topology: TopologySection,
    pub timeouts: TimeoutSection,
    pub waits: WaitSection,
    pub connectivity: ConnectivitySection,
    pub injection: InjectionSection,
}

/// Where the lab lives and how to reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LabSection {
    /// Display name used in banners and the report header.
    pub name: String,
    /// Lab directory inside the execution context (may start with `~`).
    pub lab_dir: String,
    /// Guest distribution used when bridged.
    pub distro: String,
    pub execution: ExecutionMode,
    /// Container name prefix; the node id is appended.
    pub container_prefix: String,
    /// `docker ps` name filter matching every lab container.
    pub container_filter: String,
    /// Service name of the container runtime.
    pub runtime_service: String,
    /// Documentation link shown in the demo closing banner.
    pub docs_url: String,
}

impl Default for LabSection {
    fn default() -> Self {
        Self {
            name: "Datum Galactic VPC Lab".to_string(),
            lab_dir: "~/datum/galantic-vpc".to_string(),
            distro: "Ubuntu-22.04".to_string(),
            execution: ExecutionMode::Auto,
            container_prefix: "clab-galactic_vpc-".to_string(),
            container_filter: "clab-galactic".to_string(),
            runtime_service: "docker".to_string(),
            docs_url: LAB_DOCS_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TopologySection {
    pub nodes: Topology,
    /// Substring of the locator listing that proves SRv6 is configured.
    pub locator_marker: String,
    /// Bridge name pattern for `brctl show | grep -E`.
    pub bridge_filter: String,
}

impl Default for TopologySection {
    fn default() -> Self {
        Self {
            nodes: Topology::galactic(),
            locator_marker: "fc00".to_string(),
            bridge_filter: "galactic|netlab".to_string(),
        }
    }
}

/// Command deadlines, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutSection {
    pub probe_secs: u64,
    pub topology_up_secs: u64,
    pub topology_down_secs: u64,
    pub ping_secs: u64,
    pub injector_secs: u64,
}

impl Default for TimeoutSection {
    fn default() -> Self {
        Self {
            probe_secs: 60,
            topology_up_secs: 180,
            topology_down_secs: 120,
            ping_secs: 30,
            injector_secs: 30,
        }
    }
}

impl TimeoutSection {
    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }

    pub fn topology_up(&self) -> Duration {
        Duration::from_secs(self.topology_up_secs)
    }

    pub fn topology_down(&self) -> Duration {
        Duration::from_secs(self.topology_down_secs)
    }

    pub fn ping(&self) -> Duration {
        Duration::from_secs(self.ping_secs)
    }

    pub fn injector(&self) -> Duration {
        Duration::from_secs(self.injector_secs)
    }
}

/// Fixed waits, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WaitSection {
    /// Control-plane convergence after the topology comes up.
    pub convergence_secs: u64,
    /// Pause after starting a system service before re-probing it.
    pub service_settle_secs: u64,
}

impl Default for WaitSection {
    fn default() -> Self {
        Self {
            convergence_secs: 30,
            service_settle_secs: 2,
        }
    }
}

impl WaitSection {
    pub fn convergence(&self) -> Duration {
        Duration::from_secs(self.convergence_secs)
    }

    pub fn service_settle(&self) -> Duration {
        Duration::from_secs(self.service_settle_secs)
    }
}

/// One configured reachability check. Name and reason are derived from the
/// node descriptors when omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseSpec {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CaseSpec {
    pub fn between(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            name: None,
            reason: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectivitySection {
    /// Echo requests per case.
    pub ping_count: u32,
    /// Text report path; the JSON sidecar sits next to it.
    pub report_path: PathBuf,
    pub cases: Vec<CaseSpec>,
}

impl Default for ConnectivitySection {
    fn default() -> Self {
        Self {
            ping_count: 2,
            report_path: PathBuf::from("test_results.txt"),
            cases: vec![
                CaseSpec::between("sjc", "iad"),
                CaseSpec::between("sjc", "ams"),
                CaseSpec::between("iad", "sjc"),
                CaseSpec::between("iad", "ams"),
                CaseSpec::between("ams", "sjc"),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InjectionSection {
    /// Broker process and service name.
    pub broker: String,
    /// Container name filter for a containerized broker.
    pub broker_container_filter: String,
    /// Agent process name.
    pub agent: String,
    /// Agent directory relative to the lab directory.
    pub agent_dir: String,
    /// Agent config path relative to `agent_dir`.
    pub agent_config: String,
    /// Topic the agent subscribes to for route updates.
    pub topic: String,
    /// Injector command, run from the lab directory.
    pub injector_command: String,
    /// `grep -E` pattern applied to `ip -6 route show`.
    pub route_filter: String,
    /// Prefixes expected to show up after injection.
    pub expected_prefixes: Vec<String>,
}

impl Default for InjectionSection {
    fn default() -> Self {
        Self {
            broker: "mosquitto".to_string(),
            broker_container_filter: "mqtt".to_string(),
            agent: "galactic-agent".to_string(),
            agent_dir: "galactic-agent".to_string(),
            agent_config: "../galactic-agent-config.yaml".to_string(),
            topic: "galactic/routes/wsl".to_string(),
            injector_command: "/usr/local/go/bin/go run test-mqtt-route.go".to_string(),
            route_filter: "192.168.2|192.168.3|fc00".to_string(),
            expected_prefixes: Vec::new(),
        }
    }
}

impl InjectionSection {
    /// Broker name for console output, first letter capitalized.
    pub fn broker_label(&self) -> String {
        let mut chars = self.broker.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => "MQTT broker".to_string(),
        }
    }
}

impl LabConfig {
    /// `<config_dir>/vpclab/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("vpclab").join("config.toml"))
    }

    /// Parse a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(contents: &str, origin: &Path) -> Result<Self, LabError> {
        toml::from_str(contents).map_err(|source| LabError::ConfigParse {
            path: origin.to_path_buf(),
            message: source.to_string(),
        })
    }

    /// Read and parse a config file.
    pub fn from_file(path: &Path) -> Result<Self, LabError> {
        if !path.exists() {
            return Err(LabError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(path).map_err(|source| LabError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents, path)
    }

    /// Full load: file, environment overrides, validation.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// used when present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, LabError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(default) => Self::from_file(&default)?,
                None => {
                    debug!("No config file found, using built-in defaults");
                    Self::default()
                }
            },
        };

        let mut parser = EnvParser::new();
        config.apply_env(&mut parser);
        let env_errors = parser.take_errors();
        if !env_errors.is_empty() {
            return Err(LabError::ConfigEnv {
                problems: env_errors.iter().map(ToString::to_string).collect(),
            });
        }

        config.validated()
    }

    /// Apply `VPCLAB_*` overrides. Bad values are recorded in `parser`.
    pub fn apply_env(&mut self, parser: &mut EnvParser) {
        if let Some(distro) = parser.get_string("DISTRO") {
            self.lab.distro = distro;
        }
        if let Some(dir) = parser.get_string("LAB_DIR") {
            self.lab.lab_dir = dir;
        }
        if let Some(mode) = parser.get_parsed::<ExecutionMode>("EXECUTION", "auto, local or bridged")
        {
            self.lab.execution = mode;
        }
        if let Some(secs) = parser.get_u64_range("CONVERGENCE_SECS", 0, 3600) {
            self.waits.convergence_secs = secs;
        }
        if let Some(path) = parser.get_string("REPORT_PATH") {
            self.connectivity.report_path = PathBuf::from(path);
        }
        if let Some(count) = parser.get_u64_range("PING_COUNT", 1, 100) {
            self.connectivity.ping_count = count as u32;
        }
    }

    /// Run validation; errors abort, warnings are logged.
    pub fn validated(self) -> Result<Self, LabError> {
        let findings = validate_config(&self);
        let mut problems = Vec::new();
        for finding in &findings {
            match finding.severity {
                Severity::Error => problems.push(finding.to_string()),
                Severity::Warning => warn!("Config: {}", finding),
            }
        }
        if problems.is_empty() {
            Ok(self)
        } else {
            Err(LabError::ConfigInvalid { problems })
        }
    }

    /// Resolve the execution target from the configured mode.
    pub fn execution_target(&self) -> ExecutionTarget {
        match self.lab.execution {
            ExecutionMode::Auto => ExecutionTarget::detect(&self.lab.distro),
            ExecutionMode::Local => ExecutionTarget::Local,
            ExecutionMode::Bridged => ExecutionTarget::Bridged(self.lab.distro.clone()),
        }
    }

    /// Report path with `~` expanded.
    pub fn report_path(&self) -> PathBuf {
        let raw = self.connectivity.report_path.to_string_lossy();
        PathBuf::from(shellexpand::tilde(raw.as_ref()).into_owned())
    }

    /// Container name for a node id.
    pub fn container_name(&self, node_id: &str) -> String {
        format!("{}{}", self.lab.container_prefix, node_id)
    }
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use std::env as std_env;

    fn set_env(key: &str, value: &str) {
        // SAFETY: env access is serialized by env_test_lock
        unsafe { std_env::set_var(key, value) };
    }

    fn cleanup_env(vars: &[&str]) {
        for var in vars {
            // SAFETY: env access is serialized by env_test_lock
            unsafe { std_env::remove_var(var) };
        }
    }

    #[test]
    fn defaults_describe_galactic_lab() {
        let config = LabConfig::default();
        assert_eq!(config.lab.distro, "Ubuntu-22.04");
        assert_eq!(config.topology.nodes.len(), 3);
        assert_eq!(config.connectivity.cases.len(), 5);
        assert_eq!(config.timeouts.topology_up(), Duration::from_secs(180));
        assert_eq!(config.waits.convergence(), Duration::from_secs(30));
        assert_eq!(config.container_name("sjc"), "clab-galactic_vpc-sjc");
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let toml = r#"
            [lab]
            distro = "Debian"

            [timeouts]
            ping_secs = 5
        "#;
        let config = LabConfig::from_toml_str(toml, Path::new("inline.toml")).unwrap();
        assert_eq!(config.lab.distro, "Debian");
        assert_eq!(config.lab.container_prefix, "clab-galactic_vpc-");
        assert_eq!(config.timeouts.ping_secs, 5);
        assert_eq!(config.timeouts.probe_secs, 60);
    }

    #[test]
    fn custom_topology_and_cases() {
        let toml = r#"
            [[topology.nodes]]
            id = "lhr"
            display_name = "London"
            loopback = "10.255.0.9"
            locator_prefix = "fc00:0:9::"

            [[topology.nodes]]
            id = "fra"
            display_name = "Frankfurt"
            loopback = "10.255.0.10"
            locator_prefix = "fc00:0:a::"

            [[connectivity.cases]]
            source = "lhr"
            target = "fra"
            reason = "London to Frankfurt"
        "#;
        let config = LabConfig::from_toml_str(toml, Path::new("inline.toml")).unwrap();
        assert_eq!(config.topology.nodes.len(), 2);
        assert_eq!(config.connectivity.cases.len(), 1);
        assert_eq!(
            config.connectivity.cases[0].reason.as_deref(),
            Some("London to Frankfurt")
        );
        assert!(config.validated().is_ok());
    }

    #[test]
    fn unknown_field_is_parse_error() {
        let err = LabConfig::from_toml_str("[lab]\ndistr = 'x'\n", Path::new("bad.toml"))
            .unwrap_err();
        assert!(matches!(err, LabError::ConfigParse { .. }));
    }

    #[test]
    fn explicit_missing_file_is_not_found() {
        let err = LabConfig::load(Some(Path::new("/nonexistent/vpclab.toml"))).unwrap_err();
        assert!(matches!(err, LabError::ConfigNotFound { .. }));
    }

    #[test]
    fn load_reads_file() {
        let _guard = env_test_lock();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[lab]\nname = \"Test Lab\"\n").unwrap();

        let config = LabConfig::load(Some(&path)).unwrap();
        assert_eq!(config.lab.name, "Test Lab");
    }

    #[test]
    fn env_overrides_file_values() {
        let _guard = env_test_lock();
        let vars = [
            "VPCLAB_DISTRO",
            "VPCLAB_EXECUTION",
            "VPCLAB_CONVERGENCE_SECS",
            "VPCLAB_PING_COUNT",
        ];
        set_env("VPCLAB_DISTRO", "Ubuntu-24.04");
        set_env("VPCLAB_EXECUTION", "local");
        set_env("VPCLAB_CONVERGENCE_SECS", "0");
        set_env("VPCLAB_PING_COUNT", "4");

        let mut config = LabConfig::default();
        let mut parser = EnvParser::new();
        config.apply_env(&mut parser);

        assert!(!parser.has_errors());
        assert_eq!(config.lab.distro, "Ubuntu-24.04");
        assert_eq!(config.lab.execution, ExecutionMode::Local);
        assert_eq!(config.waits.convergence_secs, 0);
        assert_eq!(config.connectivity.ping_count, 4);
        assert_eq!(config.execution_target(), ExecutionTarget::Local);

        cleanup_env(&vars);
    }

    #[test]
    fn bad_env_values_are_all_reported() {
        let _guard = env_test_lock();
        let vars = ["VPCLAB_EXECUTION", "VPCLAB_PING_COUNT"];
        set_env("VPCLAB_EXECUTION", "teleport");
        set_env("VPCLAB_PING_COUNT", "0");

        let err = LabConfig::load(Some(Path::new("/nonexistent/vpclab.toml")));
        // File error wins over env errors.
        assert!(matches!(err, Err(LabError::ConfigNotFound { .. })));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();
        match LabConfig::load(Some(&path)) {
            Err(LabError::ConfigEnv { problems }) => assert_eq!(problems.len(), 2),
            other => panic!("expected ConfigEnv, got {other:?}"),
        }

        cleanup_env(&vars);
    }

    #[test]
    fn bridged_mode_uses_distro() {
        let mut config = LabConfig::default();
        config.lab.execution = ExecutionMode::Bridged;
        assert_eq!(
            config.execution_target(),
            ExecutionTarget::Bridged("Ubuntu-22.04".into())
        );
    }

    #[test]
    fn execution_mode_parsing() {
        assert_eq!("AUTO".parse::<ExecutionMode>(), Ok(ExecutionMode::Auto));
        assert_eq!("wsl".parse::<ExecutionMode>(), Ok(ExecutionMode::Bridged));
        assert!("ssh".parse::<ExecutionMode>().is_err());
    }
}
