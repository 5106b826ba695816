//! Main execution logic for the harvest command

use std::process::ExitCode;

use anyhow::Context;
use papertrail_core::{SharedProgress, shutdown_flag};

use crate::api::BulkSearchFetcher;
use crate::clock::SystemClock;
use crate::config::HarvestConfig;
use crate::corpus::CorpusFile;
use crate::engine::{FetchOutcome, IngestionEngine};
use crate::watermark::JsonFileStore;

/// Run the harvest until shutdown is requested (or one iteration with `once`)
pub fn run(config: &HarvestConfig, progress: SharedProgress) -> anyhow::Result<ExitCode> {
    config.validate()?;
    for path in [&config.corpus_path, &config.checkpoint_path, &config.lock_path] {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create directory {}", parent.display()))?;
        }
    }

    log::info!(
        "papertrail harvest: query={:?}, corpus={}, checkpoint={}, api_key={}",
        config.query,
        config.corpus_path.display(),
        config.checkpoint_path.display(),
        if config.api_key.is_some() { "set" } else { "unset" }
    );

    let store = JsonFileStore::new(&config.checkpoint_path, config.policy, config.initial_cursor);
    let corpus = CorpusFile::new(&config.corpus_path, &config.lock_path);
    let fetcher = BulkSearchFetcher::new(config.bulk_search_config());
    let mut engine = IngestionEngine::new(config.engine_config(), fetcher, store, corpus, SystemClock)
        .with_status_line(progress.stage_line("harvest"));

    let stop = shutdown_flag();
    let (stats, code) = if config.once {
        let outcome = engine.run_once(stop);
        let code = match outcome {
            FetchOutcome::Failed { .. } => ExitCode::from(1),
            FetchOutcome::Exhausted { .. } | FetchOutcome::Cancelled { .. } => ExitCode::SUCCESS,
        };
        (engine.stats().clone(), code)
    } else {
        (engine.run(stop), ExitCode::SUCCESS)
    };

    progress.report(&stats);
    log::info!(
        "Harvest finished: cursor={}, pending={}",
        engine.cursor(),
        engine.pending_cursor()
    );
    Ok(code)
}
