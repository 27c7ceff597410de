//! Connectivity test runner.
//!
//! Runs an ordered batch of pings between router loopbacks, classifies each
//! one, and persists a report. Cases run one at a time in declaration order.

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bridge::CommandResult;
use crate::commands::LabCommands;
use crate::config::{CaseSpec, LabConfig};
use crate::context::LabContext;
use crate::errors::LabError;
use crate::lifecycle::TopologyController;
use crate::parse;
use crate::report;
use crate::types::Topology;

/// Output recorded when a ping produced nothing usable.
pub const NO_RESPONSE: &str = "No response";

/// Summary status of a run with no cases.
pub const NO_TESTS_RUN: &str = "NO TESTS RUN";

/// One reachability check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub source: String,
    pub target: String,
    pub command: String,
    pub reason: String,
}

impl TestCase {
    /// Resolve a configured case against the topology. `None` if either
    /// endpoint is unknown.
    pub fn resolve(entry: &CaseSpec, config: &LabConfig) -> Option<Self> {
        let nodes = &config.topology.nodes;
        let source = nodes.get(&entry.source)?;
        let target = nodes.get(&entry.target)?;
        Some(Self {
            name: entry
                .name
                .clone()
                .unwrap_or_else(|| format!("{} → {}", source.label(), target.label())),
            source: source.id.clone(),
            target: target.id.clone(),
            command: LabCommands::new(config).ping(source, target),
            reason: entry.reason.clone().unwrap_or_else(|| {
                format!("{} to {} via ISIS", source.display_name, target.display_name)
            }),
        })
    }
}

/// The configured suite, in declaration order.
pub fn suite(config: &LabConfig) -> Vec<TestCase> {
    config
        .connectivity
        .cases
        .iter()
        .filter_map(|entry| {
            let case = TestCase::resolve(entry, config);
            if case.is_none() {
                warn!(source = %entry.source, target = %entry.target, "Skipping case with unknown node");
            }
            case
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestStatus {
    Passed,
    Failed,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "PASSED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Result of one case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    /// 1-based position in the suite.
    pub number: usize,
    pub name: String,
    pub source: String,
    pub target: String,
    pub command: String,
    pub reason: String,
    pub status: TestStatus,
    /// Packet-loss line on success, output excerpt or `No response` on failure.
    pub output: String,
    pub timestamp: DateTime<Local>,
}

impl TestOutcome {
    /// Classify one ping result.
    pub fn classify(number: usize, case: &TestCase, result: &CommandResult) -> Self {
        let (status, output) = if parse::ping_passed(result) {
            let line = parse::packet_loss_line(&result.stdout)
                .unwrap_or("0% packet loss")
                .to_string();
            (TestStatus::Passed, line)
        } else if result.timed_out || result.stdout.trim().is_empty() {
            (TestStatus::Failed, NO_RESPONSE.to_string())
        } else {
            (
                TestStatus::Failed,
                parse::excerpt(&result.stdout, parse::OUTPUT_EXCERPT_CHARS),
            )
        };

        Self {
            number,
            name: case.name.clone(),
            source: case.source.clone(),
            target: case.target.clone(),
            command: case.command.clone(),
            reason: case.reason.clone(),
            status,
            output,
            timestamp: Local::now(),
        }
    }

    pub fn passed(&self) -> bool {
        self.status == TestStatus::Passed
    }
}

/// Aggregate of one run. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReport {
    pub lab_name: String,
    pub generated_at: DateTime<Local>,
    /// `ALL PASSED`, `k/n PASSED` or `NO TESTS RUN`.
    pub summary_status: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub explanation: String,
    pub outcomes: Vec<TestOutcome>,
}

impl TestReport {
    pub fn new(
        lab_name: impl Into<String>,
        generated_at: DateTime<Local>,
        explanation: impl Into<String>,
        outcomes: Vec<TestOutcome>,
    ) -> Self {
        let total = outcomes.len();
        let passed = outcomes.iter().filter(|o| o.passed()).count();
        let summary_status = if total == 0 {
            NO_TESTS_RUN.to_string()
        } else if passed == total {
            "ALL PASSED".to_string()
        } else {
            format!("{}/{} PASSED", passed, total)
        };
        Self {
            lab_name: lab_name.into(),
            generated_at,
            summary_status,
            total,
            passed,
            failed: total - passed,
            explanation: explanation.into(),
            outcomes,
        }
    }

    /// False for an empty run: nothing was verified.
    pub fn all_passed(&self) -> bool {
        self.total > 0 && self.passed == self.total
    }

    /// `ALL PASSED (5/5 tests)`.
    pub fn summary_line(&self) -> String {
        format!("{} ({}/{} tests)", self.summary_status, self.passed, self.total)
    }
}

/// What is tested and how it is judged.
pub fn explanation(topology: &Topology) -> String {
    let path = topology
        .nodes()
        .iter()
        .map(|n| format!("{} ({})", n.label(), n.loopback))
        .collect::<Vec<_>>()
        .join(" <-> ");
    format!(
        "Purpose: Verify ISIS/SRv6 underlay connectivity between POPs\n\
         \n\
         What we test:\n\
         \x20 • Ping IPv4 loopback addresses between routers\n\
         \x20 • These packets traverse the ISIS/SRv6 underlay network\n\
         \n\
         Pass criteria:\n\
         \x20 • ping returns exit code 0\n\
         \x20 • Output contains \"0% packet loss\"\n\
         \n\
         Network topology:\n\
         \x20 {}\n",
        path
    )
}

pub struct ConnectivityRunner<'a> {
    ctx: LabContext<'a>,
}

impl<'a> ConnectivityRunner<'a> {
    pub fn new(ctx: LabContext<'a>) -> Self {
        Self { ctx }
    }

    /// Run the configured suite and persist the report.
    pub fn run(&self) -> Result<TestReport, LabError> {
        self.run_cases(&suite(self.ctx.config))
    }

    /// Run `cases` in order and persist the report.
    ///
    /// Fails fast with [`LabError::TopologyNotRunning`] after a single probe
    /// when the lab is down. A report that cannot be written is logged and the
    /// aggregate is still returned.
    pub fn run_cases(&self, cases: &[TestCase]) -> Result<TestReport, LabError> {
        let console = self.ctx.console;
        let config = self.ctx.config;
        console.header("Running Connectivity Tests");

        if let Err(err) = TopologyController::new(self.ctx).ensure_running("connectivity tests") {
            console.error(&err.to_string());
            return Err(err);
        }

        let generated_at = Local::now();
        let explanation = explanation(&config.topology.nodes);
        console.block("Test Case Explanation", &explanation);

        let mut outcomes = Vec::with_capacity(cases.len());
        for (index, case) in cases.iter().enumerate() {
            let outcome = self.run_case(index + 1, case);
            outcomes.push(outcome);
        }

        let report = TestReport::new(&config.lab.name, generated_at, explanation, outcomes);
        self.present_summary(&report);
        info!(
            total = report.total,
            passed = report.passed,
            failed = report.failed,
            "Connectivity run finished"
        );

        let path = config.report_path();
        match report::write_report(&report, &path, &report::troubleshooting(config)) {
            Ok(sidecar) => {
                console.info(&format!("Test results saved to: {}", path.display()));
                debug!(json = %sidecar.display(), "Wrote JSON sidecar");
            }
            Err(err) => {
                warn!(error = %err, path = %path.display(), "Failed to save test results");
                console.warning(&format!("Test results not saved: {}", err));
            }
        }

        Ok(report)
    }

    fn run_case(&self, number: usize, case: &TestCase) -> TestOutcome {
        let console = self.ctx.console;
        console.step(number, &format!("Testing {}...", case.name));
        console.detail("Input", &case.command);
        console.detail("Reason", &case.reason);

        let result = self
            .ctx
            .bridge
            .execute(&case.command, self.ctx.config.timeouts.ping());
        let outcome = TestOutcome::classify(number, case, &result);
        debug!(
            case = %case.name,
            status = %outcome.status,
            exit_code = ?result.exit_code,
            timed_out = result.timed_out,
            "Case classified"
        );

        console.detail("Output", &outcome.output);
        match outcome.status {
            TestStatus::Passed => console.success(&format!("{}: PASSED ✓", case.name)),
            TestStatus::Failed => console.error(&format!("{}: FAILED ✗", case.name)),
        }
        outcome
    }

    fn present_summary(&self, report: &TestReport) {
        let console = self.ctx.console;
        if report.all_passed() {
            console.success(&format!("All {} tests passed!", report.total));
            for line in report::CONCLUSIONS {
                console.info(line);
            }
        } else {
            console.warning(&format!("{}/{} tests passed", report.passed, report.total));
            for line in report::troubleshooting(self.ctx.config) {
                console.info(&line);
            }
        }
    }
}
