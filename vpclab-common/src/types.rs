//! Common types used across the lab harness.

use serde::{Deserialize, Serialize};

/// Where lab commands run.
///
/// Chosen once at startup and handed to the bridge; nothing below the bridge
/// asks the host which context it is in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "context")]
pub enum ExecutionTarget {
    /// Commands run directly on this host.
    Local,
    /// Commands are forwarded into the named guest distribution.
    Bridged(String),
}

impl ExecutionTarget {
    /// Decide the target from what the host looks like.
    ///
    /// `proc_version` is the contents of `/proc/version` (if readable). A
    /// kernel string mentioning Microsoft means we already run inside the
    /// guest. Outside the guest, only a Windows host needs the bridge; a
    /// native Linux host runs the lab commands itself.
    pub fn detect_from(proc_version: Option<&str>, is_windows: bool, context: &str) -> Self {
        let inside_guest = proc_version
            .map(|v| v.to_lowercase().contains("microsoft"))
            .unwrap_or(false);

        if inside_guest || !is_windows {
            Self::Local
        } else {
            Self::Bridged(context.to_string())
        }
    }

    /// Detect the target for the current process.
    pub fn detect(context: &str) -> Self {
        let proc_version = std::fs::read_to_string("/proc/version").ok();
        Self::detect_from(proc_version.as_deref(), cfg!(windows), context)
    }

    pub fn is_bridged(&self) -> bool {
        matches!(self, Self::Bridged(_))
    }
}

impl std::fmt::Display for ExecutionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Bridged(context) => write!(f, "bridged({})", context),
        }
    }
}

/// One router of the emulated topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    /// Short code, also the container suffix (e.g. "sjc").
    pub id: String,
    /// Human-readable site name.
    pub display_name: String,
    /// IPv4 loopback used as the ping target.
    pub loopback: String,
    /// SRv6 locator prefix advertised by the node.
    pub locator_prefix: String,
}

impl NodeDescriptor {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        loopback: impl Into<String>,
        locator_prefix: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            loopback: loopback.into(),
            locator_prefix: locator_prefix.into(),
        }
    }

    /// Upper-case label used in test names ("SJC").
    pub fn label(&self) -> String {
        self.id.to_uppercase()
    }
}

/// Ordered set of nodes, addressable by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topology {
    nodes: Vec<NodeDescriptor>,
}

impl Topology {
    pub fn new(nodes: Vec<NodeDescriptor>) -> Self {
        Self { nodes }
    }

    /// The three-POP galactic lab: San Jose, N. Virginia, Amsterdam.
    pub fn galactic() -> Self {
        Self::new(vec![
            NodeDescriptor::new("sjc", "San Jose", "10.255.0.1", "fc00:0:1::"),
            NodeDescriptor::new("iad", "N. Virginia", "10.255.0.2", "fc00:0:2::"),
            NodeDescriptor::new("ams", "Amsterdam", "10.255.0.3", "fc00:0:3::"),
        ])
    }

    pub fn get(&self, id: &str) -> Option<&NodeDescriptor> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn nodes(&self) -> &[NodeDescriptor] {
        &self.nodes
    }

    pub fn first(&self) -> Option<&NodeDescriptor> {
        self.nodes.first()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids that appear more than once, in first-seen order.
    pub fn duplicate_ids(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut dupes = Vec::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) && !dupes.contains(&node.id) {
                dupes.push(node.id.clone());
            }
        }
        dupes
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self::galactic()
    }
}

/// Point-in-time view of every external subsystem the harness depends on.
///
/// Always re-derived from fresh probes; never cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessState {
    pub runtime_up: bool,
    pub topology_up: bool,
    pub broker_up: bool,
    pub agent_up: bool,
}

/// Lifecycle of the emulated topology.
///
/// Only `Stopped` and `Running` are ever observed from outside a transition;
/// the controller re-derives the state from a probe on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl LifecycleState {
    pub fn from_topology_up(up: bool) -> Self {
        if up { Self::Running } else { Self::Stopped }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
        }
    }
}
