//! Test doubles for the bridge and the console.
//!
//! [`ScriptedBridge`] answers commands from a script instead of spawning
//! processes, and records every command it was asked to run.
//! [`RecordingConsole`] captures operator output and answers confirmation
//! prompts with a fixed value. Neither sleeps.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

use crate::bridge::{CommandBridge, CommandResult, InteractiveOutcome};
use crate::types::ExecutionTarget;

#[derive(Debug)]
struct Rule {
    pattern: String,
    responses: VecDeque<CommandResult>,
}

impl Rule {
    /// Next response; the last one repeats forever.
    fn next(&mut self) -> CommandResult {
        if self.responses.len() > 1 {
            self.responses.pop_front().unwrap_or_else(|| CommandResult::ok(""))
        } else {
            self.responses
                .front()
                .cloned()
                .unwrap_or_else(|| CommandResult::ok(""))
        }
    }
}

/// One recorded bridge call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    Execute(String),
    Interactive(String),
    Shell(String),
}

impl RecordedCall {
    pub fn command(&self) -> &str {
        match self {
            Self::Execute(c) | Self::Interactive(c) | Self::Shell(c) => c,
        }
    }
}

/// Bridge that replays scripted results.
///
/// Rules match when the command contains the rule's pattern; the first
/// registered matching rule wins. Unmatched commands get the fallback, which
/// defaults to exit 1 with no output ("nothing found").
#[derive(Debug)]
pub struct ScriptedBridge {
    target: ExecutionTarget,
    rules: RefCell<Vec<Rule>>,
    fallback: CommandResult,
    interactive: Vec<(String, InteractiveOutcome)>,
    interactive_fallback: InteractiveOutcome,
    shell_outcome: InteractiveOutcome,
    calls: RefCell<Vec<RecordedCall>>,
}

impl Default for ScriptedBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBridge {
    pub fn new() -> Self {
        Self {
            target: ExecutionTarget::Local,
            rules: RefCell::new(Vec::new()),
            fallback: CommandResult::exited(1, "", ""),
            interactive: Vec::new(),
            interactive_fallback: InteractiveOutcome::exited(0),
            shell_outcome: InteractiveOutcome::exited(0),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn with_target(mut self, target: ExecutionTarget) -> Self {
        self.target = target;
        self
    }

    /// Always answer commands containing `pattern` with `result`.
    pub fn on(self, pattern: impl Into<String>, result: CommandResult) -> Self {
        self.on_sequence(pattern, vec![result])
    }

    /// Answer successive matching commands with `results` in order.
    pub fn on_sequence(self, pattern: impl Into<String>, results: Vec<CommandResult>) -> Self {
        self.rules.borrow_mut().push(Rule {
            pattern: pattern.into(),
            responses: results.into(),
        });
        self
    }

    /// Result for commands no rule matches.
    pub fn fallback(mut self, result: CommandResult) -> Self {
        self.fallback = result;
        self
    }

    /// Outcome for interactive commands containing `pattern`.
    pub fn on_interactive(mut self, pattern: impl Into<String>, outcome: InteractiveOutcome) -> Self {
        self.interactive.push((pattern.into(), outcome));
        self
    }

    pub fn shell_outcome(mut self, outcome: InteractiveOutcome) -> Self {
        self.shell_outcome = outcome;
        self
    }

    /// Every call, in order.
    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    /// Commands of every call, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|c| c.command().to_string())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    /// Number of calls whose command contains `pattern`.
    pub fn calls_matching(&self, pattern: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.command().contains(pattern))
            .count()
    }

    pub fn interactive_calls(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                RecordedCall::Interactive(cmd) => Some(cmd.clone()),
                _ => None,
            })
            .collect()
    }
}

impl CommandBridge for ScriptedBridge {
    fn target(&self) -> &ExecutionTarget {
        &self.target
    }

    fn execute(&self, command: &str, _timeout: Duration) -> CommandResult {
        self.calls
            .borrow_mut()
            .push(RecordedCall::Execute(command.to_string()));
        let mut rules = self.rules.borrow_mut();
        match rules.iter_mut().find(|r| command.contains(&r.pattern)) {
            Some(rule) => rule.next(),
            None => self.fallback.clone(),
        }
    }

    fn execute_interactive(&self, command: &str, _timeout: Option<Duration>) -> InteractiveOutcome {
        self.calls
            .borrow_mut()
            .push(RecordedCall::Interactive(command.to_string()));
        self.interactive
            .iter()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
            .map(|(_, outcome)| *outcome)
            .unwrap_or(self.interactive_fallback)
    }

    fn open_shell(&self, workdir: &str) -> InteractiveOutcome {
        self.calls
            .borrow_mut()
            .push(RecordedCall::Shell(workdir.to_string()));
        self.shell_outcome
    }
}

/// Console that records what it was told.
#[derive(Debug, Default)]
pub struct RecordingConsole {
    lines: RefCell<Vec<String>>,
    countdowns: RefCell<Vec<Duration>>,
    pauses: RefCell<Vec<Duration>>,
    prompts: RefCell<Vec<String>>,
    confirm_answer: Option<bool>,
}

impl RecordingConsole {
    /// Prompts get their default answer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prompts get `answer` regardless of their default.
    pub fn answering(answer: bool) -> Self {
        Self {
            confirm_answer: Some(answer),
            ..Self::default()
        }
    }

    fn push(&self, kind: &str, text: &str) {
        self.lines.borrow_mut().push(format!("{}: {}", kind, text));
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    /// All recorded output joined by newlines.
    pub fn output(&self) -> String {
        self.lines.borrow().join("\n")
    }

    pub fn contains(&self, text: &str) -> bool {
        self.lines.borrow().iter().any(|l| l.contains(text))
    }

    /// Lines recorded with the given kind (`success`, `warning`, ...).
    pub fn lines_of(&self, kind: &str) -> Vec<String> {
        let prefix = format!("{}: ", kind);
        self.lines
            .borrow()
            .iter()
            .filter_map(|l| l.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn countdowns(&self) -> Vec<Duration> {
        self.countdowns.borrow().clone()
    }

    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.borrow().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

impl crate::ui::Console for RecordingConsole {
    fn header(&self, title: &str) {
        self.push("header", title);
    }

    fn step(&self, number: usize, text: &str) {
        self.push("step", &format!("{}. {}", number, text));
    }

    fn success(&self, text: &str) {
        self.push("success", text);
    }

    fn warning(&self, text: &str) {
        self.push("warning", text);
    }

    fn error(&self, text: &str) {
        self.push("error", text);
    }

    fn info(&self, text: &str) {
        self.push("info", text);
    }

    fn block(&self, title: &str, body: &str) {
        self.push("block", &format!("{}\n{}", title, body));
    }

    fn detail(&self, label: &str, value: &str) {
        self.push("detail", &format!("{}: {}", label, value));
    }

    fn countdown(&self, duration: Duration, message: &str) {
        self.countdowns.borrow_mut().push(duration);
        self.push("countdown", message);
    }

    fn pause(&self, duration: Duration) {
        self.pauses.borrow_mut().push(duration);
    }

    fn confirm(&self, prompt: &str, default: bool) -> bool {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.confirm_answer.unwrap_or(default)
    }

    fn wait_for_enter(&self, prompt: &str) {
        self.push("enter", prompt);
    }
}
