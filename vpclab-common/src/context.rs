//! Shared handles passed to every component.

use crate::bridge::CommandBridge;
use crate::commands::LabCommands;
use crate::config::LabConfig;
use crate::ui::Console;

/// Borrowed view of the bridge, configuration and console.
///
/// Built once in `main` (or a test) and copied into each component; nothing
/// here is mutable.
#[derive(Clone, Copy)]
pub struct LabContext<'a> {
    pub bridge: &'a dyn CommandBridge,
    pub config: &'a LabConfig,
    pub console: &'a dyn Console,
}

impl<'a> LabContext<'a> {
    pub fn new(
        bridge: &'a dyn CommandBridge,
        config: &'a LabConfig,
        console: &'a dyn Console,
    ) -> Self {
        Self {
            bridge,
            config,
            console,
        }
    }

    /// Command strings derived from the configuration.
    pub fn commands(&self) -> LabCommands<'a> {
        LabCommands::new(self.config)
    }
}
