//! Every shell command the harness issues, built from configuration.

use crate::config::LabConfig;
use crate::types::NodeDescriptor;

/// Command builder bound to one configuration.
#[derive(Debug, Clone, Copy)]
pub struct LabCommands<'a> {
    config: &'a LabConfig,
}

impl<'a> LabCommands<'a> {
    pub fn new(config: &'a LabConfig) -> Self {
        Self { config }
    }

    fn lab_dir(&self) -> &str {
        &self.config.lab.lab_dir
    }

    pub fn runtime_status(&self) -> String {
        format!("sudo service {} status", self.config.lab.runtime_service)
    }

    pub fn runtime_start(&self) -> String {
        format!("sudo service {} start", self.config.lab.runtime_service)
    }

    /// Names of running lab containers, one per line.
    pub fn list_containers(&self) -> String {
        format!(
            "docker ps --filter 'name={}' --format '{{{{.Names}}}}'",
            self.config.lab.container_filter
        )
    }

    /// Container names with their status column.
    pub fn container_table(&self) -> String {
        format!(
            "docker ps --filter 'name={}' --format 'table {{{{.Names}}}}\\t{{{{.Status}}}}'",
            self.config.lab.container_filter
        )
    }

    pub fn topology_up(&self) -> String {
        format!("cd {} && sudo netlab up", self.lab_dir())
    }

    pub fn topology_down(&self) -> String {
        format!("cd {} && sudo netlab down --cleanup", self.lab_dir())
    }

    /// Run a vtysh command on a router container.
    pub fn vtysh(&self, node_id: &str, show: &str) -> String {
        format!(
            "docker exec {} vtysh -c '{}'",
            self.config.container_name(node_id),
            show
        )
    }

    pub fn isis_neighbors(&self, node_id: &str) -> String {
        self.vtysh(node_id, "show isis neighbor")
    }

    /// First lines of the neighbor table, errors discarded.
    pub fn isis_neighbor_summary(&self, node_id: &str) -> String {
        format!("{} 2>/dev/null | head -5", self.isis_neighbors(node_id))
    }

    pub fn srv6_locators(&self, node_id: &str) -> String {
        self.vtysh(node_id, "show segment-routing srv6 locator")
    }

    pub fn bridges(&self) -> String {
        format!(
            "brctl show | grep -E '{}'",
            self.config.topology.bridge_filter
        )
    }

    /// Ping `target`'s loopback from inside `source`'s container.
    pub fn ping(&self, source: &NodeDescriptor, target: &NodeDescriptor) -> String {
        format!(
            "docker exec {} ping -c {} {}",
            self.config.container_name(&source.id),
            self.config.connectivity.ping_count,
            target.loopback
        )
    }

    /// Broker running as a process or as a container.
    pub fn broker_probe(&self) -> String {
        let injection = &self.config.injection;
        format!(
            "pgrep -x {} || docker ps --filter 'name={}' --format '{{{{.Names}}}}' | grep -q {} && echo 'running'",
            injection.broker, injection.broker_container_filter, injection.broker_container_filter
        )
    }

    pub fn broker_start(&self) -> String {
        format!("sudo service {} start", self.config.injection.broker)
    }

    /// `pgrep -f` for the agent.
    ///
    /// The first character is bracketed so the pattern does not match the
    /// `bash -c` process carrying it.
    pub fn agent_probe(&self) -> String {
        format!("pgrep -f '{}'", bracket_first_char(&self.config.injection.agent))
    }

    /// Operator instructions for starting the agent by hand.
    pub fn agent_start_hint(&self) -> [String; 2] {
        let injection = &self.config.injection;
        [
            format!("cd {}/{}", self.lab_dir(), injection.agent_dir),
            format!(
                "sudo ./{} -config {}",
                injection.agent, injection.agent_config
            ),
        ]
    }

    pub fn injector(&self) -> String {
        format!(
            "cd {} && {}",
            self.lab_dir(),
            self.config.injection.injector_command
        )
    }

    pub fn route_table(&self) -> String {
        format!(
            "ip -6 route show | grep -E '{}'",
            self.config.injection.route_filter
        )
    }
}

/// `galactic-agent` -> `[g]alactic-agent`.
fn bracket_first_char(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {
            format!("[{}]{}", first, chars.as_str())
        }
        _ => name.to_string(),
    }
}
