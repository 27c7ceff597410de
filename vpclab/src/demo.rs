//! Guided demo: every action in order, paced by the operator.

use tracing::{info, warn};
use vpclab_common::{
    ConnectivityRunner, InjectionVerifier, LabContext, StatusReporter, TopologyController,
};

use crate::{shell, topology};

const CONTINUE: &str = "Press Enter to continue...";

/// What the demo is about to do.
pub const OUTLINE: [&str; 6] = [
    "Show the lab topology",
    "Start the lab (if not running)",
    "Verify ISIS adjacencies",
    "Run connectivity tests",
    "Test MQTT route injection",
    "Open interactive shell",
];

/// Run the whole tour. Failures in one stage are shown and the tour goes on.
pub fn run(ctx: LabContext<'_>) {
    let console = ctx.console;
    let config = ctx.config;

    console.header(&format!("{} - Full Demo", config.lab.name));
    let outline = OUTLINE
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item))
        .collect::<Vec<_>>()
        .join("\n");
    console.block("This demo will:", &outline);
    console.warning("Press Ctrl+C at any time to stop the demo.");
    console.wait_for_enter("Press Enter to start the demo...");

    topology::show(ctx);
    console.wait_for_enter(CONTINUE);

    if let Err(err) = TopologyController::new(ctx).start() {
        warn!(error = %err, "Demo start stage failed");
    }
    console.wait_for_enter(CONTINUE);

    StatusReporter::new(ctx).report();
    console.wait_for_enter(CONTINUE);

    if let Err(err) = ConnectivityRunner::new(ctx).run() {
        warn!(error = %err, "Demo connectivity stage failed");
    }
    console.wait_for_enter(CONTINUE);

    if let Err(err) = InjectionVerifier::new(ctx).run() {
        warn!(error = %err, "Demo injection stage failed");
    }
    console.wait_for_enter("Press Enter to open interactive shell...");

    let outcome = shell::open(ctx);
    info!(exit_code = ?outcome.exit_code, "Demo shell closed");

    farewell(ctx);
}

/// Closing output after Ctrl+C ends the tour.
pub fn interrupted(ctx: LabContext<'_>) {
    ctx.console.warning("Demo interrupted by user.");
    farewell(ctx);
}

/// Closing banner.
pub fn farewell(ctx: LabContext<'_>) {
    let console = ctx.console;
    let config = ctx.config;
    console.header("Demo Complete");
    console.success(&format!("Thank you for trying the {}!", config.lab.name));
    console.block(
        "Resources:",
        &format!(
            "Tutorial:     {}/TUTORIAL.md\nDocs:         {}",
            config.lab.lab_dir, config.lab.docs_url
        ),
    );
    console.block("To stop the lab:", "vpclab --stop");
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpclab_common::commands::LabCommands;
    use vpclab_common::mock::{RecordedCall, RecordingConsole, ScriptedBridge};
    use vpclab_common::{CommandResult, LabConfig};

    #[test]
    fn tour_visits_every_stage_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LabConfig::default();
        config.connectivity.report_path = dir.path().join("test_results.txt");
        let cmds = LabCommands::new(&config);
        let bridge = ScriptedBridge::new()
            .on(cmds.list_containers(), CommandResult::ok("clab-galactic_vpc-sjc\n"));
        let console = RecordingConsole::new();

        run(LabContext::new(&bridge, &config, &console));

        let headers = console.lines_of("header");
        assert_eq!(
            headers,
            vec![
                "Datum Galactic VPC Lab - Full Demo",
                "Lab Topology",
                "Starting Datum Galactic VPC Lab",
                "Lab Status",
                "Running Connectivity Tests",
                "MQTT Route Injection Test",
                "Interactive Shell",
                "Demo Complete",
            ]
        );
        let pauses = console.lines_of("enter");
        assert_eq!(pauses.len(), 6);
        assert_eq!(pauses[0], "Press Enter to start the demo...");
        assert_eq!(pauses[5], "Press Enter to open interactive shell...");
        assert!(matches!(bridge.recorded().last(), Some(RecordedCall::Shell(_))));
        assert!(console.contains("vpclab --stop"));
        assert!(dir.path().join("test_results.txt").exists());
    }

    #[test]
    fn interrupt_still_shows_the_closing_banner() {
        let config = LabConfig::default();
        let bridge = ScriptedBridge::new();
        let console = RecordingConsole::new();

        interrupted(LabContext::new(&bridge, &config, &console));

        assert_eq!(console.lines_of("warning"), vec!["Demo interrupted by user."]);
        assert_eq!(console.lines_of("header"), vec!["Demo Complete"]);
        assert!(console.contains("vpclab --stop"));
        assert_eq!(bridge.call_count(), 0);
    }

    #[test]
    fn stopped_lab_does_not_end_the_tour() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LabConfig::default();
        config.connectivity.report_path = dir.path().join("test_results.txt");
        config.waits.convergence_secs = 0;
        let cmds = LabCommands::new(&config);
        let bridge = ScriptedBridge::new()
            .on(cmds.topology_up(), CommandResult::exited(1, "", "netlab: error"));
        let console = RecordingConsole::new();

        run(LabContext::new(&bridge, &config, &console));

        assert!(console.contains("Failed to start lab"));
        assert!(console.contains("Lab is not running. Start it first with --start"));
        assert_eq!(console.lines_of("header").last().map(String::as_str), Some("Demo Complete"));
        assert!(!dir.path().join("test_results.txt").exists());
    }
}
