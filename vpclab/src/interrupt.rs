//! Operator interrupt handling.
//!
//! The blocking flow runs on its own thread while the runtime waits for
//! Ctrl-C. An interrupt ends the process unless a child currently owns the
//! terminal (the injector or a login shell); that child receives the same
//! signal and the flow carries on once it exits.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::debug;
use vpclab_common::{CommandBridge, CommandResult, ExecutionTarget, InteractiveOutcome};

/// Exit status after an operator interrupt.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Bridge decorator that flags when a child owns the terminal.
pub struct ForegroundBridge<B> {
    inner: B,
    foreground: Arc<AtomicBool>,
}

impl<B: CommandBridge> ForegroundBridge<B> {
    pub fn new(inner: B, foreground: Arc<AtomicBool>) -> Self {
        Self { inner, foreground }
    }

    fn in_foreground<T>(&self, run: impl FnOnce(&B) -> T) -> T {
        self.foreground.store(true, Ordering::SeqCst);
        let _reset = Reset(&self.foreground);
        run(&self.inner)
    }
}

struct Reset<'a>(&'a AtomicBool);

impl Drop for Reset<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<B: CommandBridge> CommandBridge for ForegroundBridge<B> {
    fn target(&self) -> &ExecutionTarget {
        self.inner.target()
    }

    fn execute(&self, command: &str, timeout: Duration) -> CommandResult {
        self.inner.execute(command, timeout)
    }

    fn execute_interactive(&self, command: &str, timeout: Option<Duration>) -> InteractiveOutcome {
        self.in_foreground(|inner| inner.execute_interactive(command, timeout))
    }

    fn open_shell(&self, workdir: &str) -> InteractiveOutcome {
        self.in_foreground(|inner| inner.open_shell(workdir))
    }
}

/// Wait for the flow to finish or for an interrupt that should end it.
///
/// `on_interrupt` runs once before [`EXIT_INTERRUPTED`] is returned.
pub async fn run_until_interrupted(
    mut task: JoinHandle<i32>,
    foreground: &AtomicBool,
    on_interrupt: impl FnOnce(),
) -> Result<i32> {
    let mut on_interrupt = Some(on_interrupt);
    loop {
        tokio::select! {
            joined = &mut task => return Ok(joined?),
            signal = tokio::signal::ctrl_c() => {
                signal?;
                if foreground.load(Ordering::SeqCst) {
                    debug!("Interrupt delivered to foreground child");
                    continue;
                }
                debug!("Interrupt ends the flow");
                if let Some(closing) = on_interrupt.take() {
                    closing();
                }
                return Ok(EXIT_INTERRUPTED);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use vpclab_common::mock::ScriptedBridge;

    struct Probe<'a> {
        inner: ScriptedBridge,
        flag: &'a AtomicBool,
        seen: Cell<Option<bool>>,
    }

    impl CommandBridge for Probe<'_> {
        fn target(&self) -> &ExecutionTarget {
            self.inner.target()
        }

        fn execute(&self, command: &str, timeout: Duration) -> CommandResult {
            self.seen.set(Some(self.flag.load(Ordering::SeqCst)));
            self.inner.execute(command, timeout)
        }

        fn execute_interactive(&self, command: &str, timeout: Option<Duration>) -> InteractiveOutcome {
            self.seen.set(Some(self.flag.load(Ordering::SeqCst)));
            self.inner.execute_interactive(command, timeout)
        }

        fn open_shell(&self, workdir: &str) -> InteractiveOutcome {
            self.seen.set(Some(self.flag.load(Ordering::SeqCst)));
            self.inner.open_shell(workdir)
        }
    }

    #[test]
    fn flag_is_raised_only_while_a_child_owns_the_terminal() {
        let flag = Arc::new(AtomicBool::new(false));
        let probe = Probe {
            inner: ScriptedBridge::new(),
            flag: &flag,
            seen: Cell::new(None),
        };
        let bridge = ForegroundBridge::new(&probe, Arc::clone(&flag));

        bridge.execute("true", Duration::from_secs(1));
        assert_eq!(probe.seen.get(), Some(false));

        bridge.execute_interactive("go run x.go", None);
        assert_eq!(probe.seen.get(), Some(true));
        assert!(!flag.load(Ordering::SeqCst));

        bridge.open_shell("~/lab");
        assert_eq!(probe.seen.get(), Some(true));
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn finished_flow_returns_its_exit_code() {
        let flag = AtomicBool::new(false);
        let task = tokio::task::spawn_blocking(|| 7);
        let interrupted = Cell::new(false);
        let code = run_until_interrupted(task, &flag, || interrupted.set(true))
            .await
            .unwrap();
        assert_eq!(code, 7);
        assert!(!interrupted.get());
    }
}
