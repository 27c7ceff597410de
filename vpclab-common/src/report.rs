//! Persisted connectivity report: fixed-layout text plus a JSON sidecar.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::commands::LabCommands;
use crate::config::LabConfig;
use crate::connectivity::TestReport;
use crate::errors::LabError;

const HEAVY_RULE: &str =
    "================================================================================";
const LIGHT_RULE: &str =
    "--------------------------------------------------------------------------------";

/// What an all-green run demonstrates.
pub const CONCLUSIONS: [&str; 3] = [
    "✓ ISIS adjacencies are working",
    "✓ SRv6 underlay is functional",
    "✓ All POPs can communicate",
];

/// Where to look when something failed.
pub fn troubleshooting(config: &LabConfig) -> Vec<String> {
    let first = config
        .topology
        .nodes
        .first()
        .map(|n| n.id.as_str())
        .unwrap_or("sjc");
    vec![
        format!(
            "→ Check ISIS neighbors: {}",
            LabCommands::new(config).isis_neighbors(first)
        ),
        "→ Check container status: docker ps".to_string(),
        "→ Check bridge: brctl show".to_string(),
    ]
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "{}", LIGHT_RULE);
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(out, "{}", LIGHT_RULE);
}

/// Render the text report.
pub fn render_text(report: &TestReport, troubleshooting: &[String]) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", HEAVY_RULE);
    let _ = writeln!(
        out,
        "  {} - CONNECTIVITY TEST RESULTS",
        report.lab_name.to_uppercase()
    );
    let _ = writeln!(out, "{}", HEAVY_RULE);
    out.push('\n');

    let _ = writeln!(
        out,
        "Timestamp: {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(out, "Summary:   {}", report.summary_line());
    out.push('\n');

    section(&mut out, "TEST CASE EXPLANATION");
    let _ = writeln!(out, "{}", report.explanation.trim_end());

    section(&mut out, "DETAILED TEST RESULTS");
    out.push('\n');
    for outcome in &report.outcomes {
        let _ = writeln!(out, "[Test {}] {}", outcome.number, outcome.name);
        let _ = writeln!(out, "  Status: {}", outcome.status);
        let _ = writeln!(out, "  Input:  {}", outcome.command);
        let _ = writeln!(out, "  Reason: {}", outcome.reason);
        let _ = writeln!(out, "  Output: {}", outcome.output);
        out.push('\n');
    }

    section(&mut out, "SUMMARY");
    let _ = writeln!(out, "Total Tests:  {}", report.total);
    let _ = writeln!(out, "Passed:       {}", report.passed);
    let _ = writeln!(out, "Failed:       {}", report.failed);
    let _ = writeln!(out, "Status:       {}", report.summary_status);
    out.push('\n');

    if report.all_passed() {
        let _ = writeln!(out, "Conclusions:");
        for line in CONCLUSIONS {
            let _ = writeln!(out, "  {}", line);
        }
    } else {
        let _ = writeln!(out, "Troubleshooting:");
        for line in troubleshooting {
            let _ = writeln!(out, "  {}", line);
        }
    }

    out.push('\n');
    let _ = writeln!(out, "{}", HEAVY_RULE);
    let _ = writeln!(out, "  End of Test Report");
    let _ = writeln!(out, "{}", HEAVY_RULE);
    out
}

/// `results.txt` -> `results.json`; a `.json` report gets `.json.json`.
pub fn sidecar_path(path: &Path) -> PathBuf {
    let candidate = path.with_extension("json");
    if candidate == path {
        let mut name = path.as_os_str().to_os_string();
        name.push(".json");
        PathBuf::from(name)
    } else {
        candidate
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), LabError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| LabError::ReportWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, contents).map_err(|source| LabError::ReportWrite {
        path: path.to_path_buf(),
        source,
    })
}

/// Write (overwriting) the text report and its JSON sidecar.
///
/// Returns the sidecar path.
pub fn write_report(
    report: &TestReport,
    path: &Path,
    troubleshooting: &[String],
) -> Result<PathBuf, LabError> {
    write_file(path, &render_text(report, troubleshooting))?;

    let sidecar = sidecar_path(path);
    let json = serde_json::to_string_pretty(report)?;
    write_file(&sidecar, &json)?;
    Ok(sidecar)
}
