//! Enrich subcommand - corpus to body file with extracted PDF text

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use papertrail_core::{LockedAppender, SharedProgress, shutdown_flag};
use papertrail_index::PdfTextExtractor;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct EnrichArgs {
    /// Largest PDF download accepted, in bytes
    #[arg(long)]
    pub max_pdf_bytes: Option<u64>,
}

pub fn run(args: EnrichArgs, config: &Config, progress: &SharedProgress) -> Result<ExitCode> {
    let paths = &config.paths;
    if let Some(parent) = paths.body.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create directory {}", parent.display()))?;
    }
    papertrail_core::install_signal_handlers();

    let extractor =
        PdfTextExtractor::new(args.max_pdf_bytes.unwrap_or(config.extract.max_pdf_bytes));
    let body = LockedAppender::new(&paths.body, &paths.body_lock);
    let summary = papertrail_index::enrich(
        &paths.corpus,
        &body,
        &extractor,
        shutdown_flag(),
        &progress.stage_line("enrich"),
    )?;

    progress.report(&summary);
    Ok(ExitCode::SUCCESS)
}
