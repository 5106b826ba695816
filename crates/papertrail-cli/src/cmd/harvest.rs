//! Harvest subcommand - run the ingestion engine

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use papertrail_core::SharedProgress;
use papertrail_harvest::{DedupePolicy, HarvestConfig};

use super::parse_date;
use crate::config::Config;

#[derive(Args, Debug, Default)]
pub struct HarvestArgs {
    /// Upstream search query
    #[arg(long)]
    pub query: Option<String>,

    /// Dedupe scope policy
    #[arg(short, long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// Days of accumulated buckets kept behind the cursor (0 keeps all)
    #[arg(long)]
    pub retention_days: Option<u32>,

    /// Cursor used when no checkpoint exists (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub initial_cursor: Option<NaiveDate>,

    /// Upper publication date bound (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub until: Option<NaiveDate>,

    /// Seconds between cursor promotions
    #[arg(long)]
    pub promotion_interval: Option<u64>,

    /// Seconds to wait after an exhausted or failed fetch
    #[arg(long)]
    pub backoff: Option<u64>,

    /// Run a single fetch iteration and exit
    #[arg(long)]
    pub once: bool,
}

#[derive(Clone, Copy, ValueEnum, Debug)]
pub enum PolicyArg {
    Windowed,
    Accumulated,
}

/// Layer command-line overrides on top of the config file
fn resolve(args: HarvestArgs, config: &Config) -> Result<HarvestConfig> {
    let mut harvest = config.harvest_config()?;
    if let Some(query) = args.query {
        harvest.query = query;
    }
    let retention = args
        .retention_days
        .unwrap_or(config.harvest.retention_days);
    let retention = (retention > 0).then_some(retention);
    harvest.policy = match (args.policy, harvest.policy) {
        (Some(PolicyArg::Windowed), _) => DedupePolicy::Windowed,
        (Some(PolicyArg::Accumulated), _) | (None, DedupePolicy::Accumulated { .. }) => {
            DedupePolicy::Accumulated {
                retention_days: retention,
            }
        }
        (None, DedupePolicy::Windowed) => DedupePolicy::Windowed,
    };
    if let Some(date) = args.initial_cursor {
        harvest.initial_cursor = date;
    }
    if args.until.is_some() {
        harvest.until = args.until;
    }
    if let Some(secs) = args.promotion_interval {
        harvest.promotion_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = args.backoff {
        harvest.backoff = Duration::from_secs(secs);
    }
    harvest.once = args.once;
    Ok(harvest)
}

pub fn run(args: HarvestArgs, config: &Config, progress: &SharedProgress) -> Result<ExitCode> {
    let harvest = resolve(args, config)?;
    papertrail_core::install_signal_handlers();

    log::info!("Harvesting Semantic Scholar");
    log::info!("  Query: {}", harvest.query);
    log::info!("  Policy: {}", harvest.policy);
    log::info!("  Initial cursor: {}", harvest.initial_cursor);
    log::info!("  Promotion interval: {}s", harvest.promotion_interval.as_secs());

    papertrail_harvest::run(&harvest, progress.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let args = HarvestArgs {
            query: Some("protein folding".into()),
            policy: Some(PolicyArg::Accumulated),
            retention_days: Some(14),
            until: NaiveDate::from_ymd_opt(2025, 1, 1),
            backoff: Some(1),
            once: true,
            ..HarvestArgs::default()
        };
        let harvest = resolve(args, &Config::default()).unwrap();
        assert_eq!(harvest.query, "protein folding");
        assert_eq!(
            harvest.policy,
            DedupePolicy::Accumulated {
                retention_days: Some(14)
            }
        );
        assert_eq!(harvest.until, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(harvest.backoff, Duration::from_secs(1));
        assert!(harvest.once);
    }

    #[test]
    fn config_values_survive_without_flags() {
        let config: Config = toml::from_str(
            "[harvest]\npolicy = \"accumulated\"\nretention_days = 3\nquery = \"robotics\"\n",
        )
        .unwrap();
        let harvest = resolve(HarvestArgs::default(), &config).unwrap();
        assert_eq!(harvest.query, "robotics");
        assert_eq!(
            harvest.policy,
            DedupePolicy::Accumulated {
                retention_days: Some(3)
            }
        );
        assert!(!harvest.once);
    }
}
