//! `--topology`: diagram of the configured lab plus control-plane status.

use vpclab_common::commands::LabCommands;
use vpclab_common::{LabConfig, LabContext, LivenessProbes, Topology};

/// Router row, one box per node, linked left to right.
pub fn render_routers(topology: &Topology) -> String {
    let rows: Vec<[String; 4]> = topology
        .nodes()
        .iter()
        .map(|n| {
            [
                n.label(),
                n.display_name.clone(),
                n.loopback.clone(),
                n.locator_prefix.clone(),
            ]
        })
        .collect();
    let width = rows
        .iter()
        .flatten()
        .map(|field| field.chars().count())
        .max()
        .unwrap_or(0)
        + 2;

    let edge = |left: &str, right: &str| {
        rows.iter()
            .map(|_| format!("{}{}{}", left, "─".repeat(width), right))
            .collect::<Vec<_>>()
            .join("   ")
    };

    let mut lines = vec![edge("┌", "┐")];
    for field in 0..4 {
        let link = if field == 0 { "───" } else { "   " };
        let line = rows
            .iter()
            .map(|row| format!("│ {:<w$} │", row[field], w = width - 2))
            .collect::<Vec<_>>()
            .join(link);
        lines.push(line);
    }
    lines.push(edge("└", "┘"));
    lines.join("\n")
}

/// Broker and agent above the router row.
pub fn render_control_plane(config: &LabConfig) -> String {
    let injection = &config.injection;
    format!(
        "MQTT Broker ({broker}, port 1883)  <── Protobuf/MQTT ──>  Galactic Agent ({agent})\n\
         \x20 topic: {topic}\n\
         \x20 agent programs SRv6 routes into the host kernel over Netlink\n\
         \x20 encapsulated traffic reaches the routers over the lab bridge",
        broker = injection.broker,
        agent = injection.agent,
        topic = injection.topic,
    )
}

/// How a route travels from the broker to the routers.
pub fn communication_flow(config: &LabConfig) -> String {
    format!(
        "1. MQTT subscription (agent <- broker)\n\
         \x20  Agent subscribes to {topic} and receives Protobuf RouteUpdate messages\n\
         \x20  (prefix, nexthop SRv6 SID, VPC id, add/delete).\n\
         2. Kernel route programming (agent -> kernel)\n\
         \x20  ip -6 route add 192.168.2.0/24 encap seg6 mode encap segs fc00:0:3::1 dev lo\n\
         3. Packet forwarding (kernel -> routers)\n\
         \x20  Matching packets are SRv6-encapsulated and bridged to the router containers,\n\
         \x20  which route between each other with ISIS.\n\
         4. Route injection for testing\n\
         \x20  cd {lab_dir} && {injector}\n\
         \x20  then: {routes}",
        topic = config.injection.topic,
        lab_dir = config.lab.lab_dir,
        injector = config.injection.injector_command,
        routes = LabCommands::new(config).route_table(),
    )
}

/// Print the diagram and current broker/agent state with start hints.
pub fn show(ctx: LabContext<'_>) {
    let console = ctx.console;
    let config = ctx.config;
    let commands = ctx.commands();
    console.header("Lab Topology");

    console.block("Control Plane:", &render_control_plane(config));
    console.block("Galactic VPC Topology (SRv6):", &render_routers(&config.topology.nodes));
    console.block("Communication Flow Details:", &communication_flow(config));

    let injection = &config.injection;
    let probes = LivenessProbes::new(ctx);
    if probes.broker_up() {
        console.success(&format!(
            "MQTT broker ({}) is running on port 1883",
            injection.broker_label()
        ));
    } else {
        console.warning("MQTT broker is NOT running");
        console.info("To start MQTT broker:");
        if injection.broker == "mosquitto" {
            console.info(&format!(
                "  Option 1 (Docker):   docker run -d --name {} -p 1883:1883 eclipse-mosquitto:2",
                injection.broker_container_filter
            ));
        }
        console.info(&format!(
            "  Option 2 (Service):  sudo apt install {} && {}",
            injection.broker,
            commands.broker_start()
        ));
    }

    if probes.agent_up() {
        console.success("Galactic Agent is running");
    } else {
        console.warning("Galactic Agent is NOT running");
        console.info("To start Galactic Agent:");
        for line in commands.agent_start_hint() {
            console.info(&format!("  {}", line));
        }
    }
}
