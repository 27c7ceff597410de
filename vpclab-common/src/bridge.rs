//! Command execution bridge.
//!
//! Runs a shell command on this host or inside the guest distribution and
//! always hands back a [`CommandResult`]. Timeouts and spawn failures are data,
//! not errors: probes and convergence waits treat "no answer yet" as an
//! ordinary outcome.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::ExecutionTarget;

/// Exit code reported when the wrapper process could not be spawned.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 127;

/// How long to keep draining pipes after the child is gone.
///
/// Daemons started by a command (e.g. `service docker start`) can inherit the
/// pipes and never close them.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Result of a captured command execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Exit code, `None` when the command timed out or died from a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl CommandResult {
    /// A command that exited 0 with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self::exited(0, stdout, "")
    }

    /// A command that exited with `code`.
    pub fn exited(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(code),
            stdout: stdout.into(),
            stderr: stderr.into(),
            timed_out: false,
            duration: Duration::ZERO,
        }
    }

    /// A command that was killed at its deadline.
    pub fn timeout(after: Duration) -> Self {
        Self {
            exit_code: None,
            stdout: String::new(),
            stderr: format!("Process timed out after {:?}.", after),
            timed_out: true,
            duration: after,
        }
    }

    /// The wrapper process never started.
    pub fn spawn_failed(program: &str, error: &std::io::Error) -> Self {
        Self::exited(
            SPAWN_FAILURE_EXIT_CODE,
            "",
            format!("failed to spawn {}: {}", program, error),
        )
    }

    /// Exited 0 within the deadline.
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    pub fn stdout_contains(&self, pattern: &str) -> bool {
        self.stdout.contains(pattern)
    }

    pub fn stderr_contains(&self, pattern: &str) -> bool {
        self.stderr.contains(pattern)
    }

    /// Trimmed stdout is non-empty.
    pub fn has_output(&self) -> bool {
        !self.stdout.trim().is_empty()
    }

    /// Combined output (stdout + stderr).
    pub fn combined_output(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Result of a streamed execution whose output went straight to the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractiveOutcome {
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

impl InteractiveOutcome {
    pub fn exited(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            timed_out: false,
        }
    }

    pub fn timeout() -> Self {
        Self {
            exit_code: None,
            timed_out: true,
        }
    }

    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Executes lab commands in the selected execution context.
///
/// Callers never need to know whether a command ran locally or through the
/// bridge; implementations must behave identically for both targets.
pub trait CommandBridge {
    /// The context commands are wrapped for.
    fn target(&self) -> &ExecutionTarget;

    /// Run `command` with captured output, killing it after `timeout`.
    fn execute(&self, command: &str, timeout: Duration) -> CommandResult;

    /// Run `command` with output streamed to the terminal.
    fn execute_interactive(&self, command: &str, timeout: Option<Duration>) -> InteractiveOutcome;

    /// Hand the terminal to a login shell until the operator exits it.
    fn open_shell(&self, workdir: &str) -> InteractiveOutcome;
}

impl<T: CommandBridge + ?Sized> CommandBridge for &T {
    fn target(&self) -> &ExecutionTarget {
        (**self).target()
    }

    fn execute(&self, command: &str, timeout: Duration) -> CommandResult {
        (**self).execute(command, timeout)
    }

    fn execute_interactive(&self, command: &str, timeout: Option<Duration>) -> InteractiveOutcome {
        (**self).execute_interactive(command, timeout)
    }

    fn open_shell(&self, workdir: &str) -> InteractiveOutcome {
        (**self).open_shell(workdir)
    }
}

/// Build the argv that runs `command` for `target`.
pub fn wrap_command(target: &ExecutionTarget, command: &str) -> Vec<String> {
    match target {
        ExecutionTarget::Local => vec!["bash".into(), "-c".into(), command.into()],
        ExecutionTarget::Bridged(context) => vec![
            "wsl".into(),
            "-d".into(),
            context.clone(),
            "--".into(),
            "bash".into(),
            "-c".into(),
            command.into(),
        ],
    }
}

/// Build the argv for a login shell in `workdir`.
pub fn wrap_shell(target: &ExecutionTarget, workdir: &str) -> Vec<String> {
    match target {
        ExecutionTarget::Local => vec!["bash".into(), "--login".into()],
        ExecutionTarget::Bridged(context) => vec![
            "wsl".into(),
            "-d".into(),
            context.clone(),
            "--cd".into(),
            workdir.into(),
            "--".into(),
            "bash".into(),
            "--login".into(),
        ],
    }
}

/// Render an argv as a copy-pasteable shell line.
pub fn display_command(argv: &[String]) -> String {
    argv.iter()
        .map(|arg| shell_escape::escape(arg.as_str().into()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Bridge backed by real subprocesses.
#[derive(Debug, Clone)]
pub struct ShellBridge {
    target: ExecutionTarget,
    poll_interval: Duration,
}

impl ShellBridge {
    pub fn new(target: ExecutionTarget) -> Self {
        Self {
            target,
            poll_interval: Duration::from_millis(10),
        }
    }

    fn command_for(argv: &[String]) -> Command {
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..]);
        cmd
    }

    /// Poll `child` until it exits or `deadline` passes; kills on deadline.
    fn wait_with_deadline(
        &self,
        child: &mut Child,
        deadline: Option<Instant>,
        scope: KillScope,
    ) -> (Option<ExitStatus>, bool) {
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return (Some(status), false),
                Ok(None) => {}
                Err(e) => {
                    warn!("Failed to poll child process: {}", e);
                    terminate(child, scope);
                    return (child.wait().ok(), false);
                }
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                terminate(child, scope);
                let _ = child.wait();
                return (None, true);
            }

            thread::sleep(self.poll_interval);
        }
    }
}

/// What to take down along with a timed-out child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KillScope {
    /// The child leads its own process group; kill the whole group.
    Group,
    /// The child shares the terminal's group; kill its direct children.
    Children,
}

/// Kill `child` and its descendants per `scope`.
///
/// Processes that changed user (e.g. under `sudo`) are out of reach and
/// keep running.
fn terminate(child: &mut Child, scope: KillScope) {
    #[cfg(unix)]
    {
        let pid = child.id().to_string();
        let mut cmd = match scope {
            KillScope::Group => {
                let mut cmd = Command::new("kill");
                cmd.args(["-KILL", "--", &format!("-{}", pid)]);
                cmd
            }
            KillScope::Children => {
                let mut cmd = Command::new("pkill");
                cmd.args(["-KILL", "-P", &pid]);
                cmd
            }
        };
        if let Err(e) = cmd.stdout(Stdio::null()).stderr(Stdio::null()).status() {
            debug!(?scope, pid = %pid, "Failed to signal descendants: {}", e);
        }
    }
    #[cfg(not(unix))]
    let _ = scope;
    let _ = child.kill();
}

/// Pipe contents shared with a reader thread.
struct PipeCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
    done: mpsc::Receiver<()>,
}

impl PipeCapture {
    fn spawn<R: Read + Send + 'static>(mut pipe: R) -> Self {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let (tx, done) = mpsc::channel();
        let shared = Arc::clone(&buffer);
        thread::spawn(move || {
            let mut chunk = [0u8; 4096];
            loop {
                match pipe.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if let Ok(mut buf) = shared.lock() {
                            buf.extend_from_slice(&chunk[..n]);
                        }
                    }
                }
            }
            let _ = tx.send(());
        });
        Self { buffer, done }
    }

    /// Wait until `until` for EOF, then return whatever was read.
    fn collect(self, until: Instant) -> String {
        let _ = self
            .done
            .recv_timeout(until.saturating_duration_since(Instant::now()));
        let bytes = self
            .buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl CommandBridge for ShellBridge {
    fn target(&self) -> &ExecutionTarget {
        &self.target
    }

    fn execute(&self, command: &str, timeout: Duration) -> CommandResult {
        let argv = wrap_command(&self.target, command);
        debug!(
            target_ctx = %self.target,
            timeout_secs = timeout.as_secs(),
            "Executing: {}",
            display_command(&argv)
        );

        let start = Instant::now();
        let mut cmd = Self::command_for(&argv);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to spawn {}: {}", argv[0], e);
                return CommandResult::spawn_failed(&argv[0], &e);
            }
        };

        let stdout = child.stdout.take().map(PipeCapture::spawn);
        let stderr = child.stderr.take().map(PipeCapture::spawn);

        let (status, timed_out) =
            self.wait_with_deadline(&mut child, Some(start + timeout), KillScope::Group);
        let duration = start.elapsed();

        let drain_until = Instant::now() + DRAIN_GRACE;
        let stdout = stdout.map(|p| p.collect(drain_until)).unwrap_or_default();
        let mut stderr = stderr.map(|p| p.collect(drain_until)).unwrap_or_default();

        if timed_out {
            warn!(
                "Command timed out after {:?}: {}",
                timeout,
                truncate_for_log(command)
            );
            if !stderr.is_empty() {
                stderr.push('\n');
            }
            stderr.push_str(&format!("Process timed out after {:?}.", timeout));
        }

        let exit_code = if timed_out {
            None
        } else {
            status.and_then(|s| s.code())
        };

        debug!(
            exit_code = ?exit_code,
            timed_out,
            duration_ms = duration.as_millis() as u64,
            stdout_len_bytes = stdout.len(),
            stderr_len_bytes = stderr.len(),
            "Command finished"
        );

        CommandResult {
            exit_code,
            stdout,
            stderr,
            timed_out,
            duration,
        }
    }

    fn execute_interactive(&self, command: &str, timeout: Option<Duration>) -> InteractiveOutcome {
        let argv = wrap_command(&self.target, command);
        debug!("Executing interactively: {}", display_command(&argv));

        let mut child = match Self::command_for(&argv).spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to spawn {}: {}", argv[0], e);
                return InteractiveOutcome::exited(SPAWN_FAILURE_EXIT_CODE);
            }
        };

        let deadline = timeout.map(|t| Instant::now() + t);
        let (status, timed_out) = self.wait_with_deadline(&mut child, deadline, KillScope::Children);
        if timed_out {
            warn!("Interactive command timed out: {}", truncate_for_log(command));
            return InteractiveOutcome::timeout();
        }

        InteractiveOutcome {
            exit_code: status.and_then(|s| s.code()),
            timed_out: false,
        }
    }

    fn open_shell(&self, workdir: &str) -> InteractiveOutcome {
        let argv = wrap_shell(&self.target, workdir);
        debug!("Opening shell: {}", display_command(&argv));

        let mut cmd = Self::command_for(&argv);
        if !self.target.is_bridged() {
            let expanded = shellexpand::tilde(workdir).into_owned();
            if Path::new(&expanded).is_dir() {
                cmd.current_dir(expanded);
            }
        }

        match cmd.status() {
            Ok(status) => InteractiveOutcome {
                exit_code: status.code(),
                timed_out: false,
            },
            Err(e) => {
                warn!("Failed to open shell via {}: {}", argv[0], e);
                InteractiveOutcome::exited(SPAWN_FAILURE_EXIT_CODE)
            }
        }
    }
}

fn truncate_for_log(command: &str) -> String {
    const MAX: usize = 50;
    if command.chars().count() <= MAX {
        command.to_string()
    } else {
        let head: String = command.chars().take(MAX).collect();
        format!("{}...", head)
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_local_runs_bash() {
        let argv = wrap_command(&ExecutionTarget::Local, "docker ps");
        assert_eq!(argv, vec!["bash", "-c", "docker ps"]);
    }

    #[test]
    fn wrap_bridged_forwards_into_distro() {
        let argv = wrap_command(
            &ExecutionTarget::Bridged("Ubuntu-22.04".into()),
            "cd ~/lab && sudo netlab up",
        );
        assert_eq!(
            argv,
            vec![
                "wsl",
                "-d",
                "Ubuntu-22.04",
                "--",
                "bash",
                "-c",
                "cd ~/lab && sudo netlab up"
            ]
        );
    }

    #[test]
    fn wrap_shell_uses_login_shell() {
        assert_eq!(
            wrap_shell(&ExecutionTarget::Local, "~/lab"),
            vec!["bash", "--login"]
        );
        let bridged = wrap_shell(&ExecutionTarget::Bridged("U".into()), "~/lab");
        assert_eq!(bridged[3], "--cd");
        assert_eq!(bridged[4], "~/lab");
        assert_eq!(bridged.last().map(String::as_str), Some("--login"));
    }

    #[test]
    fn display_command_quotes_arguments() {
        let argv = wrap_command(&ExecutionTarget::Local, "echo 'hi there'");
        let shown = display_command(&argv);
        assert!(shown.starts_with("bash -c "));
        assert!(shown.contains("hi there"));
    }

    #[test]
    fn command_result_constructors() {
        assert!(CommandResult::ok("x").success());
        assert!(!CommandResult::exited(1, "", "boom").success());

        let t = CommandResult::timeout(Duration::from_secs(3));
        assert!(t.timed_out);
        assert_eq!(t.exit_code, None);
        assert!(!t.success());

        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let s = CommandResult::spawn_failed("wsl", &err);
        assert_eq!(s.exit_code, Some(SPAWN_FAILURE_EXIT_CODE));
        assert!(s.stderr_contains("failed to spawn wsl"));
    }

    #[test]
    fn has_output_ignores_whitespace() {
        assert!(!CommandResult::ok("  \n").has_output());
        assert!(CommandResult::ok("clab-galactic_vpc-sjc\n").has_output());
    }

    #[test]
    fn command_result_serializes_duration_as_millis() {
        let mut result = CommandResult::ok("out");
        result.duration = Duration::from_millis(1500);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["duration"], 1500);
        let back: CommandResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.duration, Duration::from_millis(1500));
    }

    #[test]
    fn truncate_for_log_limits_length() {
        let long = "x".repeat(80);
        let shown = truncate_for_log(&long);
        assert_eq!(shown.len(), 53);
        assert!(shown.ends_with("..."));
        assert_eq!(truncate_for_log("short"), "short");
    }

    #[cfg(unix)]
    mod subprocess {
        use super::*;

        fn bridge() -> ShellBridge {
            ShellBridge::new(ExecutionTarget::Local)
        }

        #[test]
        fn captures_stdout_and_exit_zero() {
            let result = bridge().execute("echo hello", Duration::from_secs(10));
            assert!(result.success(), "{result:?}");
            assert_eq!(result.stdout.trim(), "hello");
            assert!(!result.timed_out);
        }

        #[test]
        fn captures_nonzero_exit_and_stderr() {
            let result = bridge().execute("echo oops >&2; exit 3", Duration::from_secs(10));
            assert_eq!(result.exit_code, Some(3));
            assert!(result.stderr_contains("oops"));
            assert!(!result.success());
        }

        #[test]
        fn timeout_is_soft() {
            let result = bridge().execute("sleep 5", Duration::from_millis(200));
            assert!(result.timed_out);
            assert_eq!(result.exit_code, None);
            assert!(result.duration < Duration::from_secs(5));
            assert!(result.stderr_contains("timed out"));
        }

        #[test]
        fn timeout_kills_the_whole_command() {
            let dir = tempfile::tempdir().unwrap();
            let marker = dir.path().join("survived");
            let command = format!("(sleep 1 && touch '{}'); exit 0", marker.display());

            let start = Instant::now();
            let result = bridge().execute(&command, Duration::from_millis(200));
            let returned_after = start.elapsed();

            assert!(result.timed_out);
            assert!(returned_after < DRAIN_GRACE, "returned after {returned_after:?}");
            thread::sleep(Duration::from_millis(1500));
            assert!(!marker.exists(), "subshell outlived the timeout");
        }

        #[test]
        fn background_writers_share_one_drain_deadline() {
            let start = Instant::now();
            let result = bridge().execute("sleep 5 & sleep 5 >&2 & exit 0", Duration::from_secs(10));
            let returned_after = start.elapsed();

            assert_eq!(result.exit_code, Some(0));
            assert!(
                returned_after < DRAIN_GRACE + Duration::from_secs(1),
                "returned after {returned_after:?}"
            );
        }

        #[test]
        fn interactive_reports_exit_code() {
            let outcome = bridge().execute_interactive("exit 4", Some(Duration::from_secs(10)));
            assert_eq!(outcome, InteractiveOutcome::exited(4));
        }

        #[test]
        fn interactive_timeout() {
            let outcome = bridge().execute_interactive("sleep 5", Some(Duration::from_millis(200)));
            assert!(outcome.timed_out);
        }
    }
}
