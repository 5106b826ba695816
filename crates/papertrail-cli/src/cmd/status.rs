//! Status subcommand - inspect checkpoint and corpus without harvesting

use anyhow::Result;
use papertrail_core::SharedProgress;
use papertrail_harvest::CheckpointSummary;

use crate::config::Config;

pub fn run(config: &Config, progress: &SharedProgress) -> Result<()> {
    let summary = CheckpointSummary::read(
        &config.paths.checkpoint,
        &config.paths.corpus,
        config.harvest.initial_cursor,
    )?;
    progress.report(&summary);
    Ok(())
}
