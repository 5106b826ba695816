//! `log` backend: env_logger filtering, routed through indicatif on a terminal

use std::io::Write;

use env_logger::{Builder, Env, Logger};
use indicatif::MultiProgress;
use log::{Level, Log, Metadata, Record};

fn tag(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARN",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

fn ansi(level: Level) -> &'static str {
    match level {
        Level::Error => "\x1b[1;31m",
        Level::Warn => "\x1b[33m",
        Level::Info => "\x1b[32m",
        Level::Debug | Level::Trace => "\x1b[2m",
    }
}

/// `[LEVEL] message`, coloured on a terminal
fn render(record: &Record, color: bool) -> String {
    let level = record.level();
    if color {
        format!("[{}{:<5}\x1b[0m] {}", ansi(level), tag(level), record.args())
    } else {
        format!("[{:<5}] {}", tag(level), record.args())
    }
}

/// Prints above the harvest spinner instead of through it. Filtering is
/// delegated to env_logger so `RUST_LOG` keeps working.
pub struct IndicatifLogger {
    filter: Logger,
    multi: MultiProgress,
}

impl IndicatifLogger {
    pub fn new(filter: Logger, multi: MultiProgress) -> Self {
        Self { filter, multi }
    }
}

impl Log for IndicatifLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.filter.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.filter.matches(record) {
            return;
        }
        let line = render(record, true);
        self.multi.suspend(|| eprintln!("{line}"));
    }

    fn flush(&self) {}
}

/// `RUST_LOG` overrides these
fn default_filter(quiet: bool, debug: bool) -> &'static str {
    match (debug, quiet) {
        (true, _) => "debug",
        (false, true) => "warn",
        (false, false) => "info",
    }
}

/// Install the global logger. With `multi`, lines are drawn through the
/// progress bars; without, they go to stderr uncoloured.
pub fn init_logging(quiet: bool, debug: bool, multi: Option<&MultiProgress>) {
    let env = Env::default().default_filter_or(default_filter(quiet, debug));
    let mut builder = Builder::from_env(env);

    match multi {
        Some(multi) => {
            let filter = builder.build();
            let max_level = filter.filter();
            log::set_boxed_logger(Box::new(IndicatifLogger::new(filter, multi.clone())))
                .expect("failed to init logger");
            log::set_max_level(max_level);
        }
        None => {
            builder
                .format(|buf, record| writeln!(buf, "{}", render(record, false)))
                .init();
        }
    }
}
