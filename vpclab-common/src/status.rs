//! Read-only view of the running lab.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::LabContext;
use crate::parse;
use crate::probes::LivenessProbes;
use crate::types::LivenessState;

/// Adjacency count for one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAdjacency {
    pub id: String,
    pub display_name: String,
    /// `None` when the node printed nothing.
    pub neighbors_up: Option<usize>,
}

/// Everything `--status` shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub liveness: LivenessState,
    /// Container table; `None` when no lab container runs.
    pub containers: Option<String>,
    pub bridges: Option<String>,
    pub adjacencies: Vec<NodeAdjacency>,
    pub locators_present: bool,
}

impl StatusSnapshot {
    /// Query the lab. Per-node queries are skipped when nothing runs.
    pub fn collect(ctx: LabContext<'_>) -> Self {
        let liveness = LivenessProbes::new(ctx).snapshot();
        let mut snapshot = Self {
            liveness,
            containers: None,
            bridges: None,
            adjacencies: Vec::new(),
            locators_present: false,
        };
        if !liveness.topology_up {
            debug!("No lab containers running; skipping per-node status");
            return snapshot;
        }

        let commands = ctx.commands();
        let probe_timeout = ctx.config.timeouts.probe();

        let table = ctx.bridge.execute(&commands.container_table(), probe_timeout);
        snapshot.containers = Some(table.stdout.trim_end().to_string());

        let bridges = ctx.bridge.execute(&commands.bridges(), probe_timeout);
        if parse::has_output(&bridges) {
            snapshot.bridges = Some(bridges.stdout.trim_end().to_string());
        }

        for node in ctx.config.topology.nodes.nodes() {
            let result = ctx
                .bridge
                .execute(&commands.isis_neighbor_summary(&node.id), probe_timeout);
            let neighbors_up = parse::has_output(&result)
                .then(|| parse::count_up_adjacencies(&result.stdout));
            snapshot.adjacencies.push(NodeAdjacency {
                id: node.id.clone(),
                display_name: node.display_name.clone(),
                neighbors_up,
            });
        }

        if let Some(first) = ctx.config.topology.nodes.first() {
            let result = ctx
                .bridge
                .execute(&commands.srv6_locators(&first.id), probe_timeout);
            snapshot.locators_present = !result.timed_out
                && parse::locator_present(&result.stdout, &ctx.config.topology.locator_marker);
        }

        snapshot
    }

    pub fn is_running(&self) -> bool {
        self.containers.is_some()
    }
}

/// Presents a status snapshot to the operator.
pub struct StatusReporter<'a> {
    ctx: LabContext<'a>,
}

impl<'a> StatusReporter<'a> {
    pub fn new(ctx: LabContext<'a>) -> Self {
        Self { ctx }
    }

    /// Collect and print: containers, bridges, adjacency, locators.
    pub fn report(&self) -> StatusSnapshot {
        let console = self.ctx.console;
        console.header("Lab Status");
        console.step(1, "Checking container status...");

        let snapshot = StatusSnapshot::collect(self.ctx);
        self.present(&snapshot);
        snapshot
    }

    /// Print an already collected snapshot (steps after the first).
    pub fn present(&self, snapshot: &StatusSnapshot) {
        let console = self.ctx.console;

        let Some(containers) = &snapshot.containers else {
            console.warning("No lab containers running");
            self.present_services(&snapshot.liveness);
            return;
        };
        console.block("Running Containers:", containers);

        console.step(2, "Checking Linux bridges...");
        match &snapshot.bridges {
            Some(bridges) => console.block("Lab Bridges:", bridges),
            None => console.info("No lab bridges found"),
        }

        console.step(3, "Checking ISIS status...");
        for node in &snapshot.adjacencies {
            match node.neighbors_up {
                Some(count) => console.success(&format!(
                    "{} ({}): {} ISIS neighbors",
                    node.display_name, node.id, count
                )),
                None => console.warning(&format!(
                    "{} ({}): no ISIS neighbor output",
                    node.display_name, node.id
                )),
            }
        }

        console.step(4, "Checking SRv6 locators...");
        if snapshot.locators_present {
            console.success("SRv6 locators configured");
        } else {
            console.warning("SRv6 locators may not be configured");
        }

        self.present_services(&snapshot.liveness);
    }

    fn present_services(&self, liveness: &LivenessState) {
        let console = self.ctx.console;
        let updown = |up: bool| if up { "running" } else { "not running" };
        console.detail("Container runtime", updown(liveness.runtime_up));
        console.detail("MQTT broker", updown(liveness.broker_up));
        console.detail("Galactic agent", updown(liveness.agent_up));
    }
}
