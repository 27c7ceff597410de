//! VPC Lab - lifecycle control and verification for the SRv6 router lab.
//!
//! Starts and stops the containerized topology, reports its status, runs the
//! connectivity suite and the route-injection check, and opens a shell in the
//! lab's execution context. Without an action flag it runs the guided demo.

#![forbid(unsafe_code)]

mod demo;
mod interrupt;
mod shell;
mod topology;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Result;
use clap::{ArgGroup, Parser};
use colored::Colorize;
use serde::Serialize;
use tracing::{info, warn};
use vpclab_common::{
    CommandBridge, ConnectivityRunner, Console, ErrorCode, InjectionVerifier, LabConfig,
    LabContext, LabError, LogConfig, ShellBridge, StatusReporter, TopologyController,
    init_logging,
};

use crate::interrupt::{ForegroundBridge, run_until_interrupted};
use crate::ui::ColoredConsole;

const EXIT_OK: i32 = 0;
const EXIT_FAILURE: i32 = 1;
const EXIT_CONFIG: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "vpclab")]
#[command(author, version, about = "Datum Galactic VPC lab - start, verify and explore")]
#[command(group(
    ArgGroup::new("action")
        .args(["start", "stop", "status", "test", "mqtt", "topology", "shell"])
        .multiple(false)
))]
struct Cli {
    /// Start the lab topology and wait for ISIS convergence
    #[arg(long)]
    start: bool,

    /// Stop the lab topology
    #[arg(long)]
    stop: bool,

    /// Show containers, bridges, ISIS adjacencies and SRv6 locators
    #[arg(long)]
    status: bool,

    /// Run the connectivity tests and write the report
    #[arg(long)]
    test: bool,

    /// Test route injection through the MQTT broker and agent
    #[arg(long)]
    mqtt: bool,

    /// Show the lab topology and control-plane status
    #[arg(long)]
    topology: bool,

    /// Open an interactive shell in the lab environment
    #[arg(long)]
    shell: bool,

    /// Configuration file (default: <config dir>/vpclab/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Print the status snapshot or test report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Where to write the connectivity report
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Demo,
    Start,
    Stop,
    Status,
    Test,
    Mqtt,
    Topology,
    Shell,
}

impl Cli {
    fn action(&self) -> Action {
        if self.start {
            Action::Start
        } else if self.stop {
            Action::Stop
        } else if self.status {
            Action::Status
        } else if self.test {
            Action::Test
        } else if self.mqtt {
            Action::Mqtt
        } else if self.topology {
            Action::Topology
        } else if self.shell {
            Action::Shell
        } else {
            Action::Demo
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env("warn").with_stderr();
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    let logging_guards = init_logging(&log_config)?;

    let mut config = match LabConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            report_error(&err);
            drop(logging_guards);
            std::process::exit(EXIT_CONFIG);
        }
    };
    if let Some(report) = cli.report.clone() {
        config.connectivity.report_path = report;
    }

    let action = cli.action();
    let json = cli.json;
    let target = config.execution_target();
    info!(%target, ?action, "vpclab starting");

    let foreground = Arc::new(AtomicBool::new(false));
    let bridge = ForegroundBridge::new(ShellBridge::new(target), Arc::clone(&foreground));
    let closing_config = config.clone();
    let task = tokio::task::spawn_blocking(move || run_action(action, json, &bridge, &config));
    let code = run_until_interrupted(task, &foreground, || {
        report_interrupt(action, json, &closing_config)
    })
    .await?;

    drop(logging_guards);
    std::process::exit(code);
}

/// Run one action to completion and map its outcome to an exit status.
fn run_action(action: Action, json: bool, bridge: &dyn CommandBridge, config: &LabConfig) -> i32 {
    let console = ColoredConsole::new(json);
    let ctx = LabContext::new(bridge, config, &console);

    match action {
        Action::Demo => {
            demo::run(ctx);
            EXIT_OK
        }
        Action::Start => match TopologyController::new(ctx).start() {
            Ok(_) => EXIT_OK,
            Err(err) => {
                report_error(&err);
                EXIT_FAILURE
            }
        },
        Action::Stop => {
            TopologyController::new(ctx).stop();
            EXIT_OK
        }
        Action::Status => {
            let snapshot = StatusReporter::new(ctx).report();
            if json {
                print_json(&snapshot);
            }
            EXIT_OK
        }
        Action::Test => match ConnectivityRunner::new(ctx).run() {
            Ok(report) => {
                if json {
                    print_json(&report);
                }
                if report.all_passed() {
                    EXIT_OK
                } else {
                    eprintln!("{}", ErrorCode::ConnectivityFailed.entry().format_brief());
                    EXIT_FAILURE
                }
            }
            Err(err) => {
                report_error(&err);
                EXIT_FAILURE
            }
        },
        Action::Mqtt => match InjectionVerifier::new(ctx).run() {
            Ok(report) => {
                if json {
                    print_json(&report);
                }
                if report.completed() {
                    EXIT_OK
                } else {
                    eprintln!("{}", ErrorCode::InjectionDeclined.entry().format_full());
                    EXIT_FAILURE
                }
            }
            Err(err) => {
                report_error(&err);
                EXIT_FAILURE
            }
        },
        Action::Topology => {
            topology::show(ctx);
            EXIT_OK
        }
        Action::Shell => shell::open(ctx).exit_code.unwrap_or(EXIT_FAILURE),
    }
}

fn report_interrupt(action: Action, json: bool, config: &LabConfig) {
    let console = ColoredConsole::new(json);
    if action == Action::Demo {
        let bridge = ShellBridge::new(config.execution_target());
        demo::interrupted(LabContext::new(&bridge, config, &console));
    } else {
        console.warning("Interrupted by user.");
    }
}

fn report_error(err: &LabError) {
    eprintln!("{} {}", "error:".red().bold(), err);
    eprintln!();
    eprint!("{}", err.entry().format_full());
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(err) => warn!(error = %err, "Failed to serialize JSON output"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_flag_runs_the_demo() {
        let cli = Cli::try_parse_from(["vpclab"]).unwrap();
        assert_eq!(cli.action(), Action::Demo);
    }

    #[test]
    fn each_flag_selects_its_action() {
        let cases = [
            ("--start", Action::Start),
            ("--stop", Action::Stop),
            ("--status", Action::Status),
            ("--test", Action::Test),
            ("--mqtt", Action::Mqtt),
            ("--topology", Action::Topology),
            ("--shell", Action::Shell),
        ];
        for (flag, action) in cases {
            let cli = Cli::try_parse_from(["vpclab", flag]).unwrap();
            assert_eq!(cli.action(), action, "{flag}");
        }
    }

    #[test]
    fn actions_are_mutually_exclusive() {
        let err = Cli::try_parse_from(["vpclab", "--start", "--stop"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn global_options_combine_with_actions() {
        let cli = Cli::try_parse_from([
            "vpclab",
            "--test",
            "--json",
            "-v",
            "--report",
            "/tmp/out.txt",
            "--config",
            "lab.toml",
        ])
        .unwrap();
        assert_eq!(cli.action(), Action::Test);
        assert!(cli.json && cli.verbose);
        assert_eq!(cli.report, Some(PathBuf::from("/tmp/out.txt")));
        assert_eq!(cli.config, Some(PathBuf::from("lab.toml")));
    }
}
