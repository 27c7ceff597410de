//! Terminal rendering of operator output.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use colored::Colorize;
use console::Term;
use dialoguer::Confirm;
use dialoguer::theme::ColorfulTheme;
use indicatif::{ProgressBar, ProgressStyle};
use is_terminal::IsTerminal;
use tracing::warn;
use vpclab_common::Console;
use vpclab_common::ui::indent_lines;

const RULE_WIDTH: usize = 70;
const SPINNER_TICK: Duration = Duration::from_millis(100);

/// Colored console on stdout, or on stderr when stdout carries JSON.
pub struct ColoredConsole {
    to_stderr: bool,
    interactive: bool,
}

impl ColoredConsole {
    pub fn new(to_stderr: bool) -> Self {
        let stream_is_tty = if to_stderr {
            io::stderr().is_terminal()
        } else {
            io::stdout().is_terminal()
        };
        let interactive = io::stdin().is_terminal() && stream_is_tty;
        if !stream_is_tty {
            colored::control::set_override(false);
        }
        Self {
            to_stderr,
            interactive,
        }
    }

    fn emit(&self, text: &str) {
        if self.to_stderr {
            eprintln!("{}", text);
        } else {
            println!("{}", text);
        }
    }

    /// Terminal for prompts, on the same stream as the rest of the output.
    fn term(&self) -> Term {
        if self.to_stderr {
            Term::stderr()
        } else {
            Term::stdout()
        }
    }

    fn flush(&self) {
        let _ = if self.to_stderr {
            io::stderr().flush()
        } else {
            io::stdout().flush()
        };
    }
}

impl Console for ColoredConsole {
    fn header(&self, title: &str) {
        let rule = "=".repeat(RULE_WIDTH);
        self.emit("");
        self.emit(&rule.magenta().to_string());
        self.emit(&format!(" {}", title).cyan().bold().to_string());
        self.emit(&rule.magenta().to_string());
        self.emit("");
    }

    fn step(&self, number: usize, text: &str) {
        self.emit(&format!("{} {}", format!("[Step {}]", number).green(), text));
    }

    fn success(&self, text: &str) {
        self.emit(&format!("✅ {}", text).green().to_string());
    }

    fn warning(&self, text: &str) {
        self.emit(&format!("⚠️  {}", text).yellow().to_string());
    }

    fn error(&self, text: &str) {
        self.emit(&format!("❌ {}", text).red().to_string());
    }

    fn info(&self, text: &str) {
        self.emit(&format!("ℹ️  {}", text).blue().to_string());
    }

    fn block(&self, title: &str, body: &str) {
        self.emit("");
        if !title.is_empty() {
            self.emit(&title.cyan().to_string());
        }
        self.emit(&indent_lines(body, "  "));
    }

    fn detail(&self, label: &str, value: &str) {
        self.emit(&format!("      {} {}", format!("{}:", label).blue(), value));
    }

    fn countdown(&self, duration: Duration, message: &str) {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(style.tick_strings(&[
                "⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓",
            ]));
        }
        spinner.enable_steady_tick(SPINNER_TICK);

        let deadline = Instant::now() + duration;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            let secs = left.as_secs() + u64::from(left.subsec_nanos() > 0);
            spinner.set_message(format!("{} ({}s remaining)", message, secs));
            std::thread::sleep(left.min(Duration::from_secs(1)));
        }
        spinner.finish_and_clear();
    }

    fn confirm(&self, prompt: &str, default: bool) -> bool {
        if !self.interactive {
            warn!(prompt, default, "No terminal; using default answer");
            return default;
        }
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(default)
            .interact()
            .unwrap_or_else(|err| {
                warn!(error = %err, "Prompt failed; using default answer");
                default
            })
    }

    fn wait_for_enter(&self, prompt: &str) {
        if !self.interactive {
            return;
        }
        if self.to_stderr {
            eprint!("\n{}", prompt);
        } else {
            print!("\n{}", prompt);
        }
        self.flush();
        if let Err(err) = self.term().read_line() {
            warn!(error = %err, "Could not read from terminal");
        }
    }
}
