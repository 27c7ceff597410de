//! Topology lifecycle: Stopped -> Starting -> Running -> Stopping -> Stopped.
//!
//! The state is never stored. Every call re-derives it from a fresh topology
//! probe, so start and stop are idempotent.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::context::LabContext;
use crate::errors::LabError;
use crate::parse;
use crate::probes::LivenessProbes;
use crate::status::StatusSnapshot;
use crate::types::LifecycleState;

/// Characters of stderr carried into a start failure.
const FAILURE_DETAIL_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum StartOutcome {
    /// Topology was already up; nothing was started.
    AlreadyRunning,
    /// Topology came up. `adjacencies_seen` is false when the routing
    /// protocol had not yet formed adjacencies after the convergence wait.
    Started { adjacencies_seen: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum StopOutcome {
    AlreadyStopped,
    Stopped,
    /// Teardown exited non-zero or timed out.
    StoppedWithWarnings {
        exit_code: Option<i32>,
        timed_out: bool,
    },
}

pub struct TopologyController<'a> {
    ctx: LabContext<'a>,
    probes: LivenessProbes<'a>,
}

impl<'a> TopologyController<'a> {
    pub fn new(ctx: LabContext<'a>) -> Self {
        Self {
            ctx,
            probes: LivenessProbes::new(ctx),
        }
    }

    /// Current state from a fresh probe.
    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_topology_up(self.probes.topology_up())
    }

    /// Fail with [`LabError::TopologyNotRunning`] unless the topology is up.
    ///
    /// Costs exactly one bridge call.
    pub fn ensure_running(&self, action: &str) -> Result<(), LabError> {
        if self.probes.topology_up() {
            Ok(())
        } else {
            warn!(action, "Refusing to run against a stopped lab");
            Err(LabError::not_running(action))
        }
    }

    /// Bring the topology up and wait for convergence.
    ///
    /// Only the topology-up command itself can fail the start; runtime and
    /// adjacency trouble are reported as warnings.
    pub fn start(&self) -> Result<StartOutcome, LabError> {
        let console = self.ctx.console;
        let config = self.ctx.config;
        let commands = self.ctx.commands();
        console.header(&format!("Starting {}", config.lab.name));

        if self.probes.topology_up() {
            console.warning("Lab is already running");
            info!(state = %LifecycleState::Running, "Start requested; already running");
            return Ok(StartOutcome::AlreadyRunning);
        }
        info!(
            from = %LifecycleState::Stopped,
            to = %LifecycleState::Starting,
            "Lifecycle transition"
        );

        console.step(1, "Checking Docker service...");
        if self.probes.runtime_up() {
            console.success("Docker is running");
        } else {
            console.info("Starting Docker service...");
            let started = self
                .ctx
                .bridge
                .execute(&commands.runtime_start(), config.timeouts.probe());
            if !started.success() {
                warn!(exit_code = ?started.exit_code, "Runtime start command failed");
            }
            console.pause(config.waits.service_settle());
            if self.probes.runtime_up() {
                console.success("Docker is running");
            } else {
                warn!("Container runtime still down after start attempt");
                console.warning("Docker still does not report running; continuing anyway");
            }
        }

        console.step(2, "Starting lab topology with netlab...");
        console.info("This may take 1-2 minutes...");
        let up = self
            .ctx
            .bridge
            .execute(&commands.topology_up(), config.timeouts.topology_up());
        if !up.success() {
            console.error("Failed to start lab");
            if !up.stderr.trim().is_empty() {
                console.block("netlab output:", up.stderr.trim_end());
            }
            warn!(
                exit_code = ?up.exit_code,
                timed_out = up.timed_out,
                "Topology start failed"
            );
            return Err(LabError::TopologyStartFailed {
                exit_code: up.exit_code,
                timed_out: up.timed_out,
                detail: parse::excerpt(&up.stderr, FAILURE_DETAIL_CHARS),
            });
        }
        console.success("Lab topology started");

        console.step(3, "Waiting for ISIS adjacencies to form...");
        console.countdown(config.waits.convergence(), "Waiting for ISIS convergence");

        console.step(4, "Verifying ISIS neighbors...");
        let adjacencies_seen = self.verify_adjacencies();

        info!(
            from = %LifecycleState::Starting,
            to = %LifecycleState::Running,
            adjacencies_seen,
            "Lifecycle transition"
        );
        Ok(StartOutcome::Started { adjacencies_seen })
    }

    /// One look at the first node's neighbor table.
    fn verify_adjacencies(&self) -> bool {
        let console = self.ctx.console;
        let nodes = &self.ctx.config.topology.nodes;
        let Some(first) = nodes.first() else {
            return false;
        };

        let result = self.ctx.bridge.execute(
            &self.ctx.commands().isis_neighbors(&first.id),
            self.ctx.config.timeouts.probe(),
        );
        if !result.stdout.trim().is_empty() {
            console.block(
                &format!("ISIS Neighbors on {}:", first.label()),
                result.stdout.trim_end(),
            );
        }

        let peers = nodes
            .nodes()
            .iter()
            .filter(|n| n.id != first.id)
            .map(|n| n.id.as_str());
        let seen = !result.timed_out && parse::mentions_any_peer(&result.stdout, peers);
        if seen {
            console.success("ISIS adjacencies established");
        } else {
            warn!(node = %first.id, "No ISIS adjacencies seen after convergence wait");
            console.warning("ISIS adjacencies may still be forming");
        }
        seen
    }

    /// Tear the topology down. Never fails.
    pub fn stop(&self) -> StopOutcome {
        let console = self.ctx.console;
        let config = self.ctx.config;
        console.header(&format!("Stopping {}", config.lab.name));

        if !self.probes.topology_up() {
            console.warning("Lab is not running");
            info!(state = %LifecycleState::Stopped, "Stop requested; already stopped");
            return StopOutcome::AlreadyStopped;
        }
        info!(
            from = %LifecycleState::Running,
            to = %LifecycleState::Stopping,
            "Lifecycle transition"
        );

        console.step(1, "Stopping lab topology...");
        let down = self.ctx.bridge.execute(
            &self.ctx.commands().topology_down(),
            config.timeouts.topology_down(),
        );

        let outcome = if down.success() {
            console.success("Lab stopped successfully");
            StopOutcome::Stopped
        } else {
            warn!(
                exit_code = ?down.exit_code,
                timed_out = down.timed_out,
                "Topology teardown reported a problem"
            );
            console.warning("Lab may not have stopped cleanly");
            StopOutcome::StoppedWithWarnings {
                exit_code: down.exit_code,
                timed_out: down.timed_out,
            }
        };
        info!(
            from = %LifecycleState::Stopping,
            to = %LifecycleState::Stopped,
            "Lifecycle transition"
        );
        outcome
    }

    /// Read-only status query.
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot::collect(self.ctx)
    }
}
