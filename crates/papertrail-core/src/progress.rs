//! Operator feedback: spinner status lines on a terminal, log lines elsewhere

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// End-of-run summary with a table rendering for terminals and a single
/// log line for everything else.
pub trait Summary {
    fn log(&self);
    fn print(&self);
}

/// Owns the `MultiProgress` that status lines and the log bridge share
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Detects whether stderr is a terminal
    pub fn new() -> Self {
        Self::with_tty(std::io::stderr().is_terminal())
    }

    /// Nothing is ever drawn
    pub fn hidden() -> Self {
        Self::with_tty(false)
    }

    fn with_tty(is_tty: bool) -> Self {
        let multi = if is_tty {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };
        Self { multi, is_tty }
    }

    /// Spinner line labelled `name` showing elapsed time and a message.
    /// Hidden off a terminal; callers can update it unconditionally.
    pub fn stage_line(&self, name: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let style = ProgressStyle::with_template(
            "{spinner:.green} {prefix:.cyan.bold} [{elapsed_precise}] {wide_msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(style);
        pb.set_prefix(name.to_string());
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }

    /// Table on a terminal, log line otherwise
    pub fn report(&self, summary: &impl Summary) {
        if self.is_tty {
            summary.print();
        } else {
            summary.log();
        }
    }

    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// For the log bridge
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedProgress = Arc<ProgressContext>;

/// `1234567` → `"1,234,567"`
pub fn fmt_num(n: usize) -> String {
    let digits = n.to_string();
    let head = digits.len() % 3;
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    out.push_str(&digits[..head]);
    for (i, group) in digits.as_bytes()[head..].chunks(3).enumerate() {
        if head > 0 || i > 0 {
            out.push(',');
        }
        // ASCII digits
        out.extend(group.iter().map(|&b| char::from(b)));
    }
    out
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn fmt_num_groups() {
        assert_eq!(fmt_num(0), "0");
        assert_eq!(fmt_num(999), "999");
        assert_eq!(fmt_num(1_000), "1,000");
        assert_eq!(fmt_num(12_345), "12,345");
        assert_eq!(fmt_num(1_234_567), "1,234,567");
    }

    #[test]
    fn hidden_context_draws_nothing() {
        let ctx = ProgressContext::hidden();
        assert!(!ctx.is_tty());
        assert!(ctx.stage_line("harvest").is_hidden());
    }

    #[derive(Default)]
    struct CountingSummary {
        logged: Cell<u32>,
        printed: Cell<u32>,
    }

    impl Summary for CountingSummary {
        fn log(&self) {
            self.logged.set(self.logged.get() + 1);
        }
        fn print(&self) {
            self.printed.set(self.printed.get() + 1);
        }
    }

    #[test]
    fn report_logs_off_terminal() {
        let summary = CountingSummary::default();
        ProgressContext::hidden().report(&summary);
        assert_eq!((summary.logged.get(), summary.printed.get()), (1, 0));
    }
}
