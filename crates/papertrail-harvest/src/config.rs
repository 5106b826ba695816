//! Harvest configuration

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;

use crate::api::{BulkSearchConfig, DEFAULT_API_URL, DEFAULT_FIELDS};
use crate::engine::{DEFAULT_BACKOFF, DEFAULT_PROMOTION_INTERVAL, EngineConfig};
use crate::watermark::DedupePolicy;

pub const DEFAULT_QUERY: &str = "computer science";
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Cursor used when no checkpoint exists
pub fn default_initial_cursor() -> NaiveDate {
    NaiveDate::from_ymd_opt(1980, 1, 1).unwrap_or_default()
}

/// Runtime configuration for the harvest command
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub api_url: String,
    pub query: String,
    pub fields: Vec<String>,
    pub initial_cursor: NaiveDate,
    pub until: Option<NaiveDate>,
    pub promotion_interval: Duration,
    pub backoff: Duration,
    pub policy: DedupePolicy,
    pub api_key: Option<String>,
    pub corpus_path: PathBuf,
    pub lock_path: PathBuf,
    pub checkpoint_path: PathBuf,
    /// Run one fetch iteration and exit instead of looping
    pub once: bool,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            query: DEFAULT_QUERY.to_string(),
            fields: DEFAULT_FIELDS.iter().map(|s| (*s).to_string()).collect(),
            initial_cursor: default_initial_cursor(),
            until: None,
            promotion_interval: DEFAULT_PROMOTION_INTERVAL,
            backoff: DEFAULT_BACKOFF,
            policy: DedupePolicy::Windowed,
            api_key: None,
            corpus_path: PathBuf::from("data/papers.jsonl"),
            lock_path: PathBuf::from("data/papers.lock"),
            checkpoint_path: PathBuf::from("data/checkpoint.json"),
            once: false,
        }
    }
}

impl HarvestConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            initial_cursor: self.initial_cursor,
            promotion_interval: self.promotion_interval,
            backoff: self.backoff,
            policy: self.policy,
        }
    }

    pub fn bulk_search_config(&self) -> BulkSearchConfig {
        BulkSearchConfig {
            api_url: self.api_url.clone(),
            query: self.query.clone(),
            fields: self.fields.clone(),
            until: self.until,
            api_key: self.api_key.clone(),
        }
    }

    /// Reject combinations the engine cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.query.trim().is_empty(), "harvest query must not be empty");
        anyhow::ensure!(
            self.fields.iter().any(|f| f == "paperId"),
            "fields must include paperId"
        );
        anyhow::ensure!(
            self.fields.iter().any(|f| f == "publicationDate"),
            "fields must include publicationDate"
        );
        if let Some(until) = self.until {
            anyhow::ensure!(
                until >= self.initial_cursor,
                "until ({until}) is before initial cursor ({})",
                self.initial_cursor
            );
        }
        anyhow::ensure!(
            self.corpus_path != self.checkpoint_path,
            "corpus and checkpoint paths must differ"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = HarvestConfig::default();
        config.validate().unwrap();
        assert_eq!(config.initial_cursor.to_string(), "1980-01-01");
        assert_eq!(config.engine_config().promotion_interval, Duration::from_secs(3600));
    }

    #[test]
    fn rejects_missing_required_fields() {
        let config = HarvestConfig {
            fields: vec!["title".into()],
            ..HarvestConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_range() {
        let config = HarvestConfig {
            initial_cursor: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            until: NaiveDate::from_ymd_opt(2023, 1, 1),
            ..HarvestConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn bulk_search_config_carries_query() {
        let config = HarvestConfig {
            query: "graph neural networks".into(),
            api_key: Some("k".into()),
            ..HarvestConfig::default()
        };
        let bulk = config.bulk_search_config();
        assert_eq!(bulk.query, "graph neural networks");
        assert_eq!(bulk.api_key.as_deref(), Some("k"));
    }
}
