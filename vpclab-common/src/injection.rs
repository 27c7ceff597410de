//! Route-injection verifier.
//!
//! Exercises the broker -> agent -> kernel path: make sure the broker runs,
//! check the agent, publish test routes with the external injector, then look
//! for the routes in the kernel table. Route messages are never built here;
//! only their effect on the routing table is observed.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bridge::InteractiveOutcome;
use crate::context::LabContext;
use crate::errors::LabError;
use crate::lifecycle::TopologyController;
use crate::parse;
use crate::probes::LivenessProbes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionStatus {
    /// Every step ran. Says nothing about whether routes appeared.
    Completed,
    /// Agent was down and the operator chose not to continue.
    DeclinedWithoutAgent,
}

/// Whether a configured prefix showed up in the kernel table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedRoute {
    pub prefix: String,
    pub present: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionReport {
    pub status: InjectionStatus,
    /// Broker state after any start attempt.
    pub broker_up: bool,
    pub agent_up: bool,
    /// `None` when the injector never ran.
    pub injector: Option<InteractiveOutcome>,
    pub route_matches: Vec<String>,
    pub expected: Vec<ExpectedRoute>,
}

impl InjectionReport {
    fn declined(broker_up: bool) -> Self {
        Self {
            status: InjectionStatus::DeclinedWithoutAgent,
            broker_up,
            agent_up: false,
            injector: None,
            route_matches: Vec::new(),
            expected: Vec::new(),
        }
    }

    pub fn completed(&self) -> bool {
        self.status == InjectionStatus::Completed
    }

    /// Every configured prefix was found. Vacuously true with none configured.
    pub fn all_expected_present(&self) -> bool {
        self.expected.iter().all(|e| e.present)
    }
}

/// Match configured prefixes against route lines by substring.
pub fn check_expected(prefixes: &[String], routes: &[String]) -> Vec<ExpectedRoute> {
    prefixes
        .iter()
        .map(|prefix| ExpectedRoute {
            prefix: prefix.clone(),
            present: routes.iter().any(|line| line.contains(prefix.as_str())),
        })
        .collect()
}

pub struct InjectionVerifier<'a> {
    ctx: LabContext<'a>,
    probes: LivenessProbes<'a>,
}

impl<'a> InjectionVerifier<'a> {
    pub fn new(ctx: LabContext<'a>) -> Self {
        Self {
            ctx,
            probes: LivenessProbes::new(ctx),
        }
    }

    pub fn run(&self) -> Result<InjectionReport, LabError> {
        let console = self.ctx.console;
        let config = self.ctx.config;
        let commands = self.ctx.commands();
        console.header("MQTT Route Injection Test");

        if let Err(err) = TopologyController::new(self.ctx).ensure_running("route injection") {
            console.error(&err.to_string());
            return Err(err);
        }

        console.step(
            1,
            &format!("Checking {} MQTT broker...", config.injection.broker_label()),
        );
        let broker_up = self.ensure_broker();

        console.step(2, "Checking galactic-agent...");
        let agent_up = self.probes.agent_up();
        if agent_up {
            console.success("galactic-agent is running");
        } else {
            console.warning(&format!("{} is not running", config.injection.agent));
            console.info("Start it in another terminal with:");
            for line in commands.agent_start_hint() {
                console.info(&format!("  {}", line));
            }
            if !console.confirm("Continue without agent?", false) {
                info!("Route injection declined without agent");
                return Ok(InjectionReport::declined(broker_up));
            }
        }

        console.step(3, "Injecting test routes via MQTT...");
        console.detail("Topic", &config.injection.topic);
        let injector = self
            .ctx
            .bridge
            .execute_interactive(&commands.injector(), Some(config.timeouts.injector()));
        if injector.success() {
            console.success("MQTT route injection completed");
        } else {
            warn!(
                exit_code = ?injector.exit_code,
                timed_out = injector.timed_out,
                "Injector did not finish cleanly"
            );
            console.warning("MQTT injection may have issues");
        }

        console.step(4, "Checking kernel routing table...");
        let routes = self
            .ctx
            .bridge
            .execute(&commands.route_table(), config.timeouts.probe());
        let route_matches = if routes.timed_out {
            Vec::new()
        } else {
            parse::route_lines(&routes.stdout)
        };
        if route_matches.is_empty() {
            console.info("No matching routes found (agent may not be running)");
        } else {
            console.block("Kernel Routes:", &route_matches.join("\n"));
        }

        let expected = check_expected(&config.injection.expected_prefixes, &route_matches);
        for route in &expected {
            if route.present {
                console.success(&format!("Expected route {} present", route.prefix));
            } else {
                console.warning(&format!("Expected route {} not found", route.prefix));
            }
        }

        info!(
            broker_up,
            agent_up,
            routes = route_matches.len(),
            "Route injection finished"
        );
        Ok(InjectionReport {
            status: InjectionStatus::Completed,
            broker_up,
            agent_up,
            injector: Some(injector),
            route_matches,
            expected,
        })
    }

    /// Probe the broker, starting it once if absent.
    fn ensure_broker(&self) -> bool {
        let console = self.ctx.console;
        let config = self.ctx.config;
        let broker = config.injection.broker_label();
        if self.probes.broker_up() {
            console.success(&format!("{} is running", broker));
            return true;
        }

        console.info(&format!("Starting {}...", broker));
        let started = self
            .ctx
            .bridge
            .execute(&self.ctx.commands().broker_start(), config.timeouts.probe());
        if !started.success() {
            warn!(exit_code = ?started.exit_code, "Broker start command failed");
        }
        console.pause(config.waits.service_settle());

        let up = self.probes.broker_up();
        if up {
            console.success(&format!("{} started", broker));
        } else {
            console.warning(&format!(
                "{} still not running; injected routes may not be delivered",
                broker
            ));
        }
        up
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::CommandResult;
    use crate::commands::LabCommands;
    use crate::config::LabConfig;
    use crate::mock::{RecordingConsole, ScriptedBridge};
    use std::time::Duration;

    fn lab_running(config: &LabConfig) -> ScriptedBridge {
        let cmds = LabCommands::new(config);
        ScriptedBridge::new().on(
            cmds.list_containers(),
            CommandResult::ok("clab-galactic_vpc-sjc\n"),
        )
    }

    #[test]
    fn refuses_when_lab_down() {
        let config = LabConfig::default();
        let bridge = ScriptedBridge::new();
        let console = RecordingConsole::answering(true);

        let err = InjectionVerifier::new(LabContext::new(&bridge, &config, &console))
            .run()
            .unwrap_err();

        assert!(matches!(err, LabError::TopologyNotRunning { .. }));
        assert_eq!(bridge.call_count(), 1);
        assert!(bridge.interactive_calls().is_empty());
    }

    #[test]
    fn full_path_completes_and_lists_routes() {
        let mut config = LabConfig::default();
        config.injection.expected_prefixes = vec!["192.168.2.0/24".into(), "10.9.9.0/24".into()];
        let cmds = LabCommands::new(&config);
        let bridge = lab_running(&config)
            .on(cmds.broker_probe(), CommandResult::ok("1234\n"))
            .on(cmds.agent_probe(), CommandResult::ok("5678\n"))
            .on(
                cmds.route_table(),
                CommandResult::ok("192.168.2.0/24 via fc00::1 dev galactic0\nfc00:0:2::/48 dev eth1\n"),
            );
        let console = RecordingConsole::new();

        let report = InjectionVerifier::new(LabContext::new(&bridge, &config, &console))
            .run()
            .unwrap();

        assert!(report.completed());
        assert!(report.broker_up && report.agent_up);
        assert_eq!(report.injector, Some(InteractiveOutcome::exited(0)));
        assert_eq!(report.route_matches.len(), 2);
        assert_eq!(
            report.expected,
            vec![
                ExpectedRoute { prefix: "192.168.2.0/24".into(), present: true },
                ExpectedRoute { prefix: "10.9.9.0/24".into(), present: false },
            ]
        );
        assert!(!report.all_expected_present());
        assert_eq!(bridge.interactive_calls(), vec![cmds.injector()]);
        assert!(console.contains("MQTT route injection completed"));
        assert!(console.contains("Kernel Routes:"));
        assert!(console.prompts().is_empty());
    }

    #[test]
    fn starts_missing_broker_once() {
        let config = LabConfig::default();
        let cmds = LabCommands::new(&config);
        let bridge = lab_running(&config)
            .on_sequence(
                cmds.broker_probe(),
                vec![CommandResult::exited(1, "", ""), CommandResult::ok("running\n")],
            )
            .on(cmds.broker_start(), CommandResult::ok(""))
            .on(cmds.agent_probe(), CommandResult::ok("5678\n"));
        let console = RecordingConsole::new();

        let report = InjectionVerifier::new(LabContext::new(&bridge, &config, &console))
            .run()
            .unwrap();

        assert!(report.broker_up);
        assert_eq!(bridge.calls_matching(&cmds.broker_start()), 1);
        assert_eq!(console.pauses(), vec![Duration::from_secs(2)]);
        assert!(console.contains("Starting Mosquitto..."));
    }

    #[test]
    fn broker_messages_follow_configured_name() {
        let mut config = LabConfig::default();
        config.injection.broker = "emqx".into();
        let cmds = LabCommands::new(&config);
        let bridge = lab_running(&config)
            .on_sequence(
                cmds.broker_probe(),
                vec![CommandResult::exited(1, "", ""), CommandResult::exited(1, "", "")],
            )
            .on(cmds.agent_probe(), CommandResult::ok("5678\n"));
        let console = RecordingConsole::new();

        let report = InjectionVerifier::new(LabContext::new(&bridge, &config, &console))
            .run()
            .unwrap();

        assert!(!report.broker_up);
        assert!(console.contains("Checking Emqx MQTT broker..."));
        assert!(console.contains("Starting Emqx..."));
        assert!(console.contains("Emqx still not running"));
        assert!(!console.contains("Mosquitto"));
    }

    #[test]
    fn declining_without_agent_skips_injection() {
        let config = LabConfig::default();
        let cmds = LabCommands::new(&config);
        let bridge = lab_running(&config).on(cmds.broker_probe(), CommandResult::ok("1\n"));
        let console = RecordingConsole::new();

        let report = InjectionVerifier::new(LabContext::new(&bridge, &config, &console))
            .run()
            .unwrap();

        assert_eq!(report.status, InjectionStatus::DeclinedWithoutAgent);
        assert!(report.injector.is_none());
        assert!(bridge.interactive_calls().is_empty());
        assert_eq!(console.prompts(), vec!["Continue without agent?"]);
        assert!(console.contains("sudo ./galactic-agent -config ../galactic-agent-config.yaml"));
    }

    #[test]
    fn continuing_without_agent_reports_no_routes() {
        let config = LabConfig::default();
        let cmds = LabCommands::new(&config);
        let bridge = lab_running(&config)
            .on(cmds.broker_probe(), CommandResult::ok("1\n"))
            .on_interactive("go run", InteractiveOutcome::timeout());
        let console = RecordingConsole::answering(true);

        let report = InjectionVerifier::new(LabContext::new(&bridge, &config, &console))
            .run()
            .unwrap();

        assert!(report.completed());
        assert!(!report.agent_up);
        assert!(report.route_matches.is_empty());
        assert!(report.all_expected_present());
        assert!(console.contains("MQTT injection may have issues"));
        assert!(console.contains("No matching routes found (agent may not be running)"));
    }

    #[test]
    fn expected_prefixes_match_by_substring() {
        let routes = vec!["fc00:0:3::/48 via fe80::1 dev eth2".to_string()];
        let checked = check_expected(&["fc00:0:3::/48".to_string()], &routes);
        assert!(checked[0].present);
        assert!(check_expected(&[], &routes).is_empty());
    }
}
