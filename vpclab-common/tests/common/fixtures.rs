use std::path::Path;

use vpclab_common::commands::LabCommands;
use vpclab_common::mock::ScriptedBridge;
use vpclab_common::{CommandResult, LabConfig};

/// Default lab with the report redirected into `dir` and no waiting.
pub fn galactic_lab(dir: &Path) -> LabConfig {
    let mut config = LabConfig::default();
    config.connectivity.report_path = dir.join("test_results.txt");
    config.waits.convergence_secs = 0;
    config
}

/// Successful `ping -c 2` output.
pub fn ping_reply(loopback: &str) -> CommandResult {
    CommandResult::ok(format!(
        "PING {loopback} ({loopback}) 56(84) bytes of data.\n\
         64 bytes from {loopback}: icmp_seq=1 ttl=63 time=0.112 ms\n\
         64 bytes from {loopback}: icmp_seq=2 ttl=63 time=0.098 ms\n\
         \n\
         --- {loopback} ping statistics ---\n\
         2 packets transmitted, 2 received, 0% packet loss, time 1001ms\n"
    ))
}

/// Bridge that reports the lab containers as running.
pub fn running_lab(config: &LabConfig) -> ScriptedBridge {
    let cmds = LabCommands::new(config);
    ScriptedBridge::new().on(
        cmds.list_containers(),
        CommandResult::ok("clab-galactic_vpc-sjc\nclab-galactic_vpc-iad\nclab-galactic_vpc-ams\n"),
    )
}
