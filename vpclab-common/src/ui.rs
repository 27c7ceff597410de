//! Operator-facing output seam.
//!
//! The core never prints directly. It reports progress through a [`Console`]
//! so the binary can render it with color and spinners while tests record it.

use std::time::Duration;

/// Everything the core tells the operator, plus the questions it asks.
pub trait Console {
    /// Section banner.
    fn header(&self, title: &str);

    /// Numbered progress step.
    fn step(&self, number: usize, text: &str);

    fn success(&self, text: &str);

    fn warning(&self, text: &str);

    fn error(&self, text: &str);

    fn info(&self, text: &str);

    /// Raw multi-line block (command output, tables) under a title.
    fn block(&self, title: &str, body: &str);

    /// `label: value` line.
    fn detail(&self, label: &str, value: &str);

    /// Block for `duration` while showing progress.
    fn countdown(&self, duration: Duration, message: &str);

    /// Silent pause between a corrective action and a re-probe.
    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    /// Yes/no question. Returns `default` when no answer can be read.
    fn confirm(&self, prompt: &str, default: bool) -> bool;

    /// Block until the operator presses Enter. No-op without a terminal.
    fn wait_for_enter(&self, prompt: &str);
}

/// Indent every non-empty line of `text`.
pub fn indent_lines(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", prefix, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indent_lines_skips_empty_lines() {
        assert_eq!(indent_lines("a\n\nb", "  "), "  a\n\n  b");
        assert_eq!(indent_lines("", "  "), "");
    }
}
