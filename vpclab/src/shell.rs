//! `--shell`: login shell in the lab's execution context.

use vpclab_common::{InteractiveOutcome, LabContext};

const HINT_COLUMN: usize = 46;

fn hint(command: &str, note: &str) -> String {
    format!("{:<w$}# {}", command, note, w = HINT_COLUMN)
}

/// Commands worth knowing inside the lab shell.
pub fn useful_commands(ctx: &LabContext<'_>) -> Vec<String> {
    let config = ctx.config;
    let mut hints = Vec::new();
    if let Some(first) = config.topology.nodes.first() {
        hints.push(hint(
            &format!("docker exec -it {} vtysh", config.container_name(&first.id)),
            &format!("FRR shell on {}", first.label()),
        ));
    }
    hints.push(hint("brctl show", "Show bridges"));
    hints.push(hint("ip -6 route show", "Show IPv6 routes"));
    hints.push(hint("sudo netlab status", "Lab status"));
    hints
}

/// Print hints, then hand the terminal to a login shell until it exits.
pub fn open(ctx: LabContext<'_>) -> InteractiveOutcome {
    let console = ctx.console;
    let lab_dir = &ctx.config.lab.lab_dir;
    console.header("Interactive Shell");
    if ctx.bridge.target().is_bridged() {
        console.info("Opening WSL shell. Type 'exit' to return.");
    } else {
        console.info("Opening shell. Type 'exit' to return.");
    }
    console.info(&format!("Lab directory: {}", lab_dir));
    console.block("Useful Commands:", &useful_commands(&ctx).join("\n"));
    console.block(
        "To Exit:",
        &[hint("exit", "Return to demo"), hint("Ctrl+D", "Alternative exit")].join("\n"),
    );

    ctx.bridge.open_shell(lab_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpclab_common::mock::{RecordedCall, RecordingConsole, ScriptedBridge};
    use vpclab_common::{ExecutionTarget, LabConfig};

    #[test]
    fn prints_hints_and_opens_shell_in_lab_dir() {
        let config = LabConfig::default();
        let bridge = ScriptedBridge::new()
            .with_target(ExecutionTarget::Bridged("Ubuntu-22.04".into()))
            .shell_outcome(InteractiveOutcome::exited(3));
        let console = RecordingConsole::new();

        let outcome = open(LabContext::new(&bridge, &config, &console));

        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(
            bridge.recorded(),
            vec![RecordedCall::Shell("~/datum/galantic-vpc".into())]
        );
        assert!(console.contains("Opening WSL shell"));
        assert!(console.contains("docker exec -it clab-galactic_vpc-sjc vtysh"));
        assert!(console.contains("# FRR shell on SJC"));
        assert!(console.contains("Ctrl+D"));
    }

    #[test]
    fn hints_align_comments() {
        let config = LabConfig::default();
        let bridge = ScriptedBridge::new();
        let console = RecordingConsole::new();
        let hints = useful_commands(&LabContext::new(&bridge, &config, &console));
        assert_eq!(hints.len(), 4);
        assert!(hints.iter().all(|h| h.find('#') == Some(HINT_COLUMN)));
    }
}
