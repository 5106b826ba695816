//! Configuration loading from TOML files

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use papertrail_harvest::api::{DEFAULT_API_URL, DEFAULT_FIELDS};
use papertrail_harvest::config::{DEFAULT_QUERY, DEFAULT_RETENTION_DAYS, default_initial_cursor};
use papertrail_harvest::engine::{DEFAULT_BACKOFF, DEFAULT_PROMOTION_INTERVAL};
use papertrail_harvest::{DedupePolicy, HarvestConfig};
use serde::Deserialize;

/// Global configuration for papertrail
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub harvest: HarvestSection,
    pub paths: PathsConfig,
    pub http: HttpSection,
    pub extract: ExtractSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HarvestSection {
    pub api_url: String,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub api_key: Option<String>,
    pub query: String,
    pub fields: Vec<String>,
    pub initial_cursor: NaiveDate,
    pub until: Option<NaiveDate>,
    pub promotion_interval_secs: u64,
    pub backoff_secs: u64,
    /// "windowed" or "accumulated"
    pub policy: String,
    /// Accumulated buckets kept behind the cursor; 0 keeps every bucket
    pub retention_days: u32,
}

impl Default for HarvestSection {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: std::env::var("S2_API_KEY").ok(),
            query: DEFAULT_QUERY.to_string(),
            fields: DEFAULT_FIELDS.iter().map(|s| (*s).to_string()).collect(),
            initial_cursor: default_initial_cursor(),
            until: None,
            promotion_interval_secs: DEFAULT_PROMOTION_INTERVAL.as_secs(),
            backoff_secs: DEFAULT_BACKOFF.as_secs(),
            policy: "windowed".to_string(),
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub corpus: PathBuf,
    pub checkpoint: PathBuf,
    pub lock: PathBuf,
    pub body: PathBuf,
    pub body_lock: PathBuf,
    pub preferences: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            corpus: PathBuf::from("data/papers.jsonl"),
            checkpoint: PathBuf::from("data/checkpoint.json"),
            lock: PathBuf::from("data/papers.lock"),
            body: PathBuf::from("data/body.jsonl"),
            body_lock: PathBuf::from("data/body.lock"),
            preferences: PathBuf::from("data/preferences.json"),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for HttpSection {
    fn default() -> Self {
        let http = papertrail_core::HttpConfig::default();
        Self {
            connect_timeout_secs: http.connect_timeout.as_secs(),
            request_timeout_secs: http.request_timeout.as_secs(),
            max_retries: http.max_retries,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ExtractSection {
    pub max_pdf_bytes: u64,
}

impl Default for ExtractSection {
    fn default() -> Self {
        Self {
            max_pdf_bytes: papertrail_index::extract::DEFAULT_MAX_PDF_BYTES,
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./papertrail.toml (current directory)
    /// 2. ~/.config/papertrail/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("papertrail.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "papertrail") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn policy(&self) -> Result<DedupePolicy> {
        let retention = self.harvest.retention_days;
        DedupePolicy::from_name(&self.harvest.policy, (retention > 0).then_some(retention))
            .with_context(|| {
                format!(
                    "Unknown dedupe policy {:?} (expected windowed or accumulated)",
                    self.harvest.policy
                )
            })
    }

    /// Harvest settings from the file; the harvest command layers flags on top
    pub fn harvest_config(&self) -> Result<HarvestConfig> {
        let h = &self.harvest;
        Ok(HarvestConfig {
            api_url: h.api_url.clone(),
            query: h.query.clone(),
            fields: h.fields.clone(),
            initial_cursor: h.initial_cursor,
            until: h.until,
            promotion_interval: Duration::from_secs(h.promotion_interval_secs),
            backoff: Duration::from_secs(h.backoff_secs),
            policy: self.policy()?,
            api_key: h.api_key.clone(),
            corpus_path: self.paths.corpus.clone(),
            lock_path: self.paths.lock.clone(),
            checkpoint_path: self.paths.checkpoint.clone(),
            once: false,
        })
    }
}
