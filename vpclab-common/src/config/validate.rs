//! Startup validation of a loaded configuration.

use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;

use regex::Regex;

use super::{ExecutionMode, LabConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Suspicious but usable.
    Warning,
    /// Loading must fail.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub severity: Severity,
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ConfigWarning {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a configuration, returning every finding.
pub fn validate_config(config: &LabConfig) -> Vec<ConfigWarning> {
    let mut findings = Vec::new();
    let nodes = &config.topology.nodes;

    if config.lab.lab_dir.trim().is_empty() {
        findings.push(ConfigWarning::error("lab.lab_dir", "must not be empty"));
    }
    if config.lab.execution == ExecutionMode::Bridged && config.lab.distro.trim().is_empty() {
        findings.push(ConfigWarning::error(
            "lab.distro",
            "bridged execution needs a distribution name",
        ));
    }

    if nodes.is_empty() {
        findings.push(ConfigWarning::error(
            "topology.nodes",
            "at least one node is required",
        ));
    }
    for id in nodes.duplicate_ids() {
        findings.push(ConfigWarning::error(
            "topology.nodes",
            format!("duplicate node id '{}'", id),
        ));
    }
    for node in nodes.nodes() {
        if node.loopback.parse::<Ipv4Addr>().is_err() {
            findings.push(ConfigWarning::warning(
                format!("topology.nodes.{}.loopback", node.id),
                format!("'{}' is not an IPv4 address", node.loopback),
            ));
        }
    }
    if config.topology.locator_marker.is_empty() {
        findings.push(ConfigWarning::warning(
            "topology.locator_marker",
            "empty marker matches any locator output",
        ));
    }

    if config.connectivity.cases.is_empty() {
        findings.push(ConfigWarning::error(
            "connectivity.cases",
            "at least one case is required",
        ));
    }
    let mut seen_pairs = HashSet::new();
    for (index, case) in config.connectivity.cases.iter().enumerate() {
        let field = format!("connectivity.cases[{}]", index);
        for endpoint in [&case.source, &case.target] {
            if nodes.get(endpoint).is_none() {
                findings.push(ConfigWarning::error(
                    field.clone(),
                    format!("unknown node '{}'", endpoint),
                ));
            }
        }
        if case.source == case.target {
            findings.push(ConfigWarning::warning(
                field.clone(),
                format!("'{}' pings itself", case.source),
            ));
        }
        if !seen_pairs.insert((case.source.as_str(), case.target.as_str())) {
            findings.push(ConfigWarning::warning(
                field,
                format!("{} -> {} is listed more than once", case.source, case.target),
            ));
        }
    }
    if config.connectivity.ping_count == 0 {
        findings.push(ConfigWarning::error(
            "connectivity.ping_count",
            "must be at least 1",
        ));
    }

    let timeouts = &config.timeouts;
    for (field, secs) in [
        ("timeouts.probe_secs", timeouts.probe_secs),
        ("timeouts.topology_up_secs", timeouts.topology_up_secs),
        ("timeouts.topology_down_secs", timeouts.topology_down_secs),
        ("timeouts.ping_secs", timeouts.ping_secs),
        ("timeouts.injector_secs", timeouts.injector_secs),
    ] {
        if secs == 0 {
            findings.push(ConfigWarning::warning(
                field,
                "0 seconds: every command will time out",
            ));
        }
    }

    if let Err(e) = Regex::new(&config.injection.route_filter) {
        findings.push(ConfigWarning::warning(
            "injection.route_filter",
            format!("not a valid extended regex: {}", e),
        ));
    }
    for prefix in &config.injection.expected_prefixes {
        if prefix.trim().is_empty() {
            findings.push(ConfigWarning::warning(
                "injection.expected_prefixes",
                "empty prefix always matches",
            ));
        }
    }

    findings
}
