//! Text contracts of the external tools.
//!
//! One function per tool output. Nothing else in the crate inspects raw
//! command output, so a tool changing its wording is a one-line fix here.

use std::sync::OnceLock;

use regex::Regex;

use crate::bridge::CommandResult;

/// Excerpt length for failed test output.
pub const OUTPUT_EXCERPT_CHARS: usize = 100;

/// `service <runtime> status`: running iff it exited 0 within the deadline
/// and does not say otherwise.
pub fn runtime_running(result: &CommandResult) -> bool {
    result.success() && !result.combined_output().contains("is not running")
}

/// `docker ps --format '{{.Names}}'`, `pgrep` and `echo running` probes: up
/// iff anything was printed.
pub fn has_output(result: &CommandResult) -> bool {
    !result.timed_out && result.has_output()
}

/// Container names listed one per line.
pub fn container_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// `vtysh -c 'show isis neighbor'`: does the output mention any of `peers`?
///
/// The neighbor table lists system ids which, in this lab, are the node ids.
pub fn mentions_any_peer<'a>(output: &str, peers: impl IntoIterator<Item = &'a str>) -> bool {
    let lowered = output.to_lowercase();
    peers
        .into_iter()
        .any(|peer| !peer.is_empty() && lowered.contains(&peer.to_lowercase()))
}

/// Number of adjacencies in state `Up` in a neighbor table.
pub fn count_up_adjacencies(output: &str) -> usize {
    static UP: OnceLock<Regex> = OnceLock::new();
    let re = UP.get_or_init(|| Regex::new(r"\bUp\b").expect("valid regex"));
    re.find_iter(output).count()
}

/// `show segment-routing srv6 locator`: is the marker present?
pub fn locator_present(output: &str, marker: &str) -> bool {
    !marker.is_empty() && output.contains(marker)
}

fn zero_loss_regex() -> &'static Regex {
    static ZERO_LOSS: OnceLock<Regex> = OnceLock::new();
    // A lone "0%" so "50%" and "100%" do not count.
    ZERO_LOSS.get_or_init(|| {
        Regex::new(r"(^|[^0-9.])0(\.0+)?% packet loss").expect("valid regex")
    })
}

/// ping: zero packet loss reported.
pub fn zero_packet_loss(output: &str) -> bool {
    zero_loss_regex().is_match(output)
}

/// ping passed: exit 0 and the zero-loss figure.
pub fn ping_passed(result: &CommandResult) -> bool {
    result.success() && zero_packet_loss(&result.stdout)
}

/// The `N packets transmitted, ...` summary line of a ping run.
pub fn packet_loss_line(output: &str) -> Option<&str> {
    output
        .lines()
        .map(str::trim)
        .find(|line| line.contains("packet loss"))
}

/// First `max` characters of `text`, trimmed.
pub fn excerpt(text: &str, max: usize) -> String {
    text.trim().chars().take(max).collect()
}

/// Lines of `ip -6 route show | grep` output.
pub fn route_lines(stdout: &str) -> Vec<String> {
    container_names(stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    const PING_OK: &str = "PING 10.255.0.2 (10.255.0.2) 56(84) bytes of data.\n\
        64 bytes from 10.255.0.2: icmp_seq=1 ttl=64 time=0.071 ms\n\
        64 bytes from 10.255.0.2: icmp_seq=2 ttl=64 time=0.052 ms\n\
        \n\
        --- 10.255.0.2 ping statistics ---\n\
        2 packets transmitted, 2 received, 0% packet loss, time 1001ms\n\
        rtt min/avg/max/mdev = 0.052/0.061/0.071/0.009 ms\n";

    #[test]
    fn runtime_status_variants() {
        assert!(runtime_running(&CommandResult::ok(" * Docker is running\n")));
        assert!(!runtime_running(&CommandResult::exited(
            3,
            " * Docker is not running\n",
            ""
        )));
        assert!(!runtime_running(&CommandResult::ok(" * Docker is not running\n")));
        assert!(!runtime_running(&CommandResult::timeout(Duration::from_secs(60))));
    }

    #[test]
    fn has_output_probe() {
        assert!(has_output(&CommandResult::ok("clab-galactic_vpc-sjc\n")));
        assert!(!has_output(&CommandResult::ok("\n")));
        assert!(!has_output(&CommandResult::exited(1, "", "")));
    }

    #[test]
    fn container_names_skip_blank_lines() {
        assert_eq!(
            container_names("clab-galactic_vpc-sjc\n\n clab-galactic_vpc-iad \n"),
            vec!["clab-galactic_vpc-sjc", "clab-galactic_vpc-iad"]
        );
    }

    #[test]
    fn isis_neighbor_mentions() {
        let output = "Area 1:\n  System Id           Interface   L  State        Holdtime SNPA\n  \
            iad                 eth1        2  Up            28       2020.2020.2020\n  \
            ams                 eth2        2  Up            29       2020.2020.2020\n";
        assert!(mentions_any_peer(output, ["iad", "ams"]));
        assert!(mentions_any_peer("  IAD  eth1  2  Up", ["iad"]));
        assert!(!mentions_any_peer("Area 1:\n", ["iad", "ams"]));
        assert!(!mentions_any_peer("anything", [""]));
        assert_eq!(count_up_adjacencies(output), 2);
    }

    #[test]
    fn up_count_is_word_based() {
        assert_eq!(count_up_adjacencies("Up Up Initializing Down"), 2);
        assert_eq!(count_up_adjacencies("Uptime 5s"), 0);
    }

    #[test]
    fn locator_marker() {
        assert!(locator_present("Locator:\nName  ID  Prefix\nMAIN  1  fc00:0:1::/48  Up", "fc00"));
        assert!(!locator_present("Locator:\n", "fc00"));
        assert!(!locator_present("fc00", ""));
    }

    #[test]
    fn ping_classification() {
        assert!(ping_passed(&CommandResult::ok(PING_OK)));
        let half = PING_OK.replace(" 0% packet loss", " 50% packet loss");
        assert!(!ping_passed(&CommandResult::ok(half)));
        let total = PING_OK.replace(" 0% packet loss", " 100% packet loss");
        assert!(!ping_passed(&CommandResult::exited(1, total, "")));
        // Exit code 0 alone is not enough.
        assert!(!ping_passed(&CommandResult::ok("")));
        // Nor is the marker with a non-zero exit.
        assert!(!ping_passed(&CommandResult::exited(1, PING_OK, "")));
        assert!(!ping_passed(&CommandResult::timeout(Duration::from_secs(30))));
    }

    #[test]
    fn busybox_style_zero_loss() {
        assert!(zero_packet_loss("2 packets transmitted, 2 packets received, 0% packet loss"));
        assert!(zero_packet_loss("0.0% packet loss"));
        assert!(!zero_packet_loss("10.0% packet loss"));
    }

    #[test]
    fn packet_loss_line_extraction() {
        assert_eq!(
            packet_loss_line(PING_OK),
            Some("2 packets transmitted, 2 received, 0% packet loss, time 1001ms")
        );
        assert_eq!(packet_loss_line("no stats"), None);
    }

    #[test]
    fn excerpt_is_char_safe() {
        let text = "→".repeat(150);
        assert_eq!(excerpt(&text, OUTPUT_EXCERPT_CHARS).chars().count(), 100);
        assert_eq!(excerpt("  short  ", 100), "short");
    }

    proptest! {
        #[test]
        fn nonzero_loss_never_passes(loss in 1u32..=100) {
            let stdout = format!(
                "2 packets transmitted, 1 received, {}% packet loss, time 1001ms", loss
            );
            prop_assert!(!ping_passed(&CommandResult::ok(stdout)));
        }

        #[test]
        fn classification_never_panics(stdout in ".*", code in proptest::option::of(-1i32..256)) {
            let result = CommandResult {
                exit_code: code,
                stdout,
                stderr: String::new(),
                timed_out: code.is_none(),
                duration: Duration::ZERO,
            };
            let _ = ping_passed(&result);
            let _ = runtime_running(&result);
            let _ = has_output(&result);
            let _ = count_up_adjacencies(&result.stdout);
        }
    }
}
