//! Shared core for the VPC lab harness.
//!
//! Everything that touches the lab goes through a [`CommandBridge`]; the
//! lifecycle controller, connectivity runner, route-injection verifier and
//! status reporter are thin policies layered over the bridge and the
//! liveness probes.

#![deny(unsafe_code)]

pub mod bridge;
pub mod commands;
pub mod config;
pub mod connectivity;
pub mod context;
pub mod errors;
pub mod injection;
pub mod lifecycle;
pub mod logging;
pub mod mock;
pub mod parse;
pub mod probes;
pub mod report;
pub mod status;
pub mod types;
pub mod ui;

pub use bridge::{CommandBridge, CommandResult, InteractiveOutcome, ShellBridge};
pub use config::{ExecutionMode, LabConfig};
pub use connectivity::{ConnectivityRunner, TestCase, TestOutcome, TestReport, TestStatus};
pub use context::LabContext;
pub use errors::{ErrorCode, ErrorEntry, LabError};
pub use injection::{InjectionReport, InjectionStatus, InjectionVerifier};
pub use lifecycle::{StartOutcome, StopOutcome, TopologyController};
pub use logging::{LogConfig, LoggingGuards, init_logging};
pub use probes::LivenessProbes;
pub use status::{StatusReporter, StatusSnapshot};
pub use types::{ExecutionTarget, LifecycleState, LivenessState, NodeDescriptor, Topology};
pub use ui::Console;
