//! papertrail - incremental academic paper harvester
//!
//! Harvests paper metadata from Semantic Scholar into an append-only corpus,
//! enriches it with open-access full text, and serves personalized search
//! over the result.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "papertrail")]
#[command(about = "Incremental academic paper harvester")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file path (default: ./papertrail.toml or ~/.config/papertrail/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Connect timeout in seconds
    #[arg(long, global = true)]
    connect_timeout: Option<u64>,

    /// Whole-request timeout in seconds
    #[arg(long, global = true)]
    request_timeout: Option<u64>,

    /// Maximum retry attempts for transient failures
    #[arg(long, global = true)]
    max_retries: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Harvest new papers into the corpus until interrupted
    Harvest(cmd::harvest::HarvestArgs),
    /// Show checkpoint and corpus state
    Status,
    /// Extract full text for corpus papers with an open-access PDF
    Enrich(cmd::enrich::EnrichArgs),
    /// Full-text search over enriched papers
    Search(cmd::search::SearchArgs),
    /// List enriched papers, or recommendations for a user
    Papers(cmd::papers::PapersArgs),
    /// Record or show a user's interactions
    Prefs(cmd::prefs::PrefsArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(papertrail_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug, the status line shows activity
    //   non-TTY: info unless --debug, logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = cli.quiet || (is_tty && !cli.debug);
    papertrail_core::init_logging(quiet, cli.debug, multi);

    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    // Config file defaults, CLI overrides
    let http_config = papertrail_core::HttpConfig {
        connect_timeout: Duration::from_secs(
            cli.connect_timeout.unwrap_or(config.http.connect_timeout_secs),
        ),
        request_timeout: Duration::from_secs(
            cli.request_timeout.unwrap_or(config.http.request_timeout_secs),
        ),
        max_retries: cli.max_retries.unwrap_or(config.http.max_retries),
    };
    papertrail_core::set_http_config(http_config);

    match cli.command {
        Command::Harvest(args) => cmd::harvest::run(args, &config, &progress),
        Command::Status => cmd::status::run(&config, &progress).map(|()| ExitCode::SUCCESS),
        Command::Enrich(args) => cmd::enrich::run(args, &config, &progress),
        Command::Search(args) => cmd::search::run(args, &config).map(|()| ExitCode::SUCCESS),
        Command::Papers(args) => cmd::papers::run(args, &config).map(|()| ExitCode::SUCCESS),
        Command::Prefs(args) => cmd::prefs::run(args, &config).map(|()| ExitCode::SUCCESS),
        Command::Config => {
            print_config(&config);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_config(config: &Config) {
    use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    let h = &config.harvest;
    table.add_row(vec!["Query", &h.query]);
    table.add_row(vec!["Fields", &h.fields.join(",")]);
    table.add_row(vec!["Initial cursor", &h.initial_cursor.to_string()]);
    table.add_row(vec![
        "Until",
        &h.until.map_or_else(|| "open".to_string(), |d| d.to_string()),
    ]);
    let policy = match config.policy() {
        Ok(papertrail_harvest::DedupePolicy::Accumulated {
            retention_days: Some(days),
        }) => format!("accumulated ({days} days)"),
        Ok(p) => p.name().to_string(),
        Err(_) => format!("{} (invalid)", h.policy),
    };
    table.add_row(vec!["Dedupe policy", &policy]);
    table.add_row(vec![
        "Promotion interval",
        &format!("{}s", h.promotion_interval_secs),
    ]);
    table.add_row(vec!["Backoff", &format!("{}s", h.backoff_secs)]);
    table.add_row(vec!["API URL", &h.api_url]);
    table.add_row(vec![
        "API key",
        if h.api_key.is_some() {
            "configured"
        } else {
            "not set"
        },
    ]);

    let p = &config.paths;
    table.add_row(vec!["Corpus", &p.corpus.display().to_string()]);
    table.add_row(vec!["Checkpoint", &p.checkpoint.display().to_string()]);
    table.add_row(vec!["Corpus lock", &p.lock.display().to_string()]);
    table.add_row(vec!["Body", &p.body.display().to_string()]);
    table.add_row(vec!["Preferences", &p.preferences.display().to_string()]);

    table.add_row(vec![
        "Connect timeout",
        &format!("{}s", config.http.connect_timeout_secs),
    ]);
    table.add_row(vec![
        "Request timeout",
        &format!("{}s", config.http.request_timeout_secs),
    ]);
    table.add_row(vec!["Max retries", &config.http.max_retries.to_string()]);
    table.add_row(vec![
        "Max PDF size",
        &format!("{} MiB", config.extract.max_pdf_bytes / (1024 * 1024)),
    ]);

    eprintln!("\n{table}");
}
