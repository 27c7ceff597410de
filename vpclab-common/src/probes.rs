//! Liveness probes.
//!
//! Each probe is one fresh bridge call read by one `parse` function. A probe
//! never fails: not found, command failure and timeout all read as `false`.

use tracing::debug;

use crate::bridge::CommandResult;
use crate::context::LabContext;
use crate::parse;
use crate::types::LivenessState;

/// Named predicates over the external subsystems.
#[derive(Clone, Copy)]
pub struct LivenessProbes<'a> {
    ctx: LabContext<'a>,
}

impl<'a> LivenessProbes<'a> {
    pub fn new(ctx: LabContext<'a>) -> Self {
        Self { ctx }
    }

    fn probe(&self, name: &str, command: &str, read: fn(&CommandResult) -> bool) -> bool {
        let result = self
            .ctx
            .bridge
            .execute(command, self.ctx.config.timeouts.probe());
        let up = read(&result);
        debug!(
            probe = name,
            up,
            exit_code = ?result.exit_code,
            timed_out = result.timed_out,
            "Probe finished"
        );
        up
    }

    /// Container runtime service is running.
    pub fn runtime_up(&self) -> bool {
        let command = self.ctx.commands().runtime_status();
        self.probe("runtime", &command, parse::runtime_running)
    }

    /// At least one lab container is running.
    pub fn topology_up(&self) -> bool {
        let command = self.ctx.commands().list_containers();
        self.probe("topology", &command, parse::has_output)
    }

    /// Message broker is running as a process or container.
    pub fn broker_up(&self) -> bool {
        let command = self.ctx.commands().broker_probe();
        self.probe("broker", &command, parse::has_output)
    }

    /// Control agent process is running.
    pub fn agent_up(&self) -> bool {
        let command = self.ctx.commands().agent_probe();
        self.probe("agent", &command, parse::has_output)
    }

    /// Fresh state of every subsystem.
    pub fn snapshot(&self) -> LivenessState {
        LivenessState {
            runtime_up: self.runtime_up(),
            topology_up: self.topology_up(),
            broker_up: self.broker_up(),
            agent_up: self.agent_up(),
        }
    }
}
