//! Watermark store: the resumable (Cursor, dedupe scope) checkpoint
//!
//! Two dedupe policies share one checkpoint file:
//! - windowed: `{"date": "...", "paperIds": [...]}`, ids reset on each promotion
//! - accumulated: `{"date": "...", "processedIds": {"<date>": [...]}}`, one id
//!   bucket per observed date, evicted past a retention horizon
//!
//! Any checkpoint that fails validation loads as the configured initial
//! cursor with an empty scope.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Days, NaiveDate};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::record::{format_date, parse_date};

/// Dedupe scope policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupePolicy {
    /// One id set scoped to the current Cursor, reset whenever it advances
    Windowed,
    /// One id set per observed date; buckets older than `retention_days`
    /// before the Cursor are dropped at promotion (`None` keeps everything)
    Accumulated { retention_days: Option<u32> },
}

impl DedupePolicy {
    /// Parse config string; `retention_days` only applies to accumulated
    pub fn from_name(name: &str, retention_days: Option<u32>) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "windowed" => Some(Self::Windowed),
            "accumulated" => Some(Self::Accumulated { retention_days }),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Windowed => "windowed",
            Self::Accumulated { .. } => "accumulated",
        }
    }

    /// Empty scope for this policy
    pub fn empty_scope(self) -> DedupeScope {
        match self {
            Self::Windowed => DedupeScope::Windowed(FxHashSet::default()),
            Self::Accumulated { retention_days } => DedupeScope::Accumulated(Buckets {
                retention_days,
                ..Buckets::default()
            }),
        }
    }
}

impl std::fmt::Display for DedupePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Windowed => f.write_str("windowed"),
            Self::Accumulated {
                retention_days: Some(days),
            } => write!(f, "accumulated (retain {days}d)"),
            Self::Accumulated {
                retention_days: None,
            } => f.write_str("accumulated (unbounded)"),
        }
    }
}

/// Per-date id buckets with a union index for O(1) membership
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Buckets {
    buckets: BTreeMap<NaiveDate, FxHashSet<String>>,
    index: FxHashSet<String>,
    retention_days: Option<u32>,
}

impl Buckets {
    fn insert(&mut self, id: &str, date: NaiveDate) -> bool {
        if !self.index.insert(id.to_string()) {
            return false;
        }
        self.buckets.entry(date).or_default().insert(id.to_string());
        true
    }

    /// Drop buckets dated before `cursor - retention_days`. Returns evicted id count.
    fn evict_before(&mut self, cursor: NaiveDate) -> usize {
        let Some(days) = self.retention_days else {
            return 0;
        };
        let Some(horizon) = cursor.checked_sub_days(Days::new(u64::from(days))) else {
            return 0;
        };
        let kept = self.buckets.split_off(&horizon);
        let dropped = std::mem::replace(&mut self.buckets, kept);
        let mut evicted = 0;
        for ids in dropped.into_values() {
            for id in ids {
                self.index.remove(&id);
                evicted += 1;
            }
        }
        evicted
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Oldest and newest bucket dates
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.buckets.keys().next()?;
        let last = self.buckets.keys().next_back()?;
        Some((*first, *last))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &FxHashSet<String>)> {
        self.buckets.iter()
    }
}

/// The set of record ids considered already emitted under the active policy
#[derive(Debug, Clone, PartialEq)]
pub enum DedupeScope {
    Windowed(FxHashSet<String>),
    Accumulated(Buckets),
}

impl DedupeScope {
    pub fn policy(&self) -> DedupePolicy {
        match self {
            Self::Windowed(_) => DedupePolicy::Windowed,
            Self::Accumulated(b) => DedupePolicy::Accumulated {
                retention_days: b.retention_days,
            },
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        match self {
            Self::Windowed(ids) => ids.contains(id),
            Self::Accumulated(b) => b.index.contains(id),
        }
    }

    /// Record `id` as emitted. `date` picks the bucket under the accumulated
    /// policy and is ignored by the windowed one.
    pub fn insert(&mut self, id: &str, date: NaiveDate) -> bool {
        match self {
            Self::Windowed(ids) => ids.insert(id.to_string()),
            Self::Accumulated(b) => b.insert(id, date),
        }
    }

    /// Apply a Cursor promotion: windowed resets, accumulated evicts buckets
    /// past the retention horizon. Returns how many ids left the scope.
    pub fn promote(&mut self, new_cursor: NaiveDate) -> usize {
        match self {
            Self::Windowed(ids) => {
                let n = ids.len();
                ids.clear();
                n
            }
            Self::Accumulated(b) => b.evict_before(new_cursor),
        }
    }

    /// Number of ids in scope
    pub fn len(&self) -> usize {
        match self {
            Self::Windowed(ids) => ids.len(),
            Self::Accumulated(b) => b.index.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A resumable ingestion checkpoint
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub cursor: NaiveDate,
    pub scope: DedupeScope,
}

impl Checkpoint {
    pub fn fresh(cursor: NaiveDate, policy: DedupePolicy) -> Self {
        Self {
            cursor,
            scope: policy.empty_scope(),
        }
    }
}

/// On-disk checkpoint shapes
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum CheckpointFile {
    Windowed {
        date: String,
        #[serde(rename = "paperIds")]
        paper_ids: Vec<String>,
    },
    Accumulated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        date: Option<String>,
        #[serde(rename = "processedIds")]
        processed_ids: BTreeMap<String, Vec<String>>,
    },
}

/// Why a stored checkpoint was rejected
#[derive(Debug)]
pub enum CheckpointError {
    Json(serde_json::Error),
    InvalidDate(String),
}

impl std::fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(e) => write!(f, "malformed checkpoint: {e}"),
            Self::InvalidDate(d) => write!(f, "invalid date in checkpoint: {d:?}"),
        }
    }
}

impl std::error::Error for CheckpointError {}

/// Serialize a checkpoint in the form matching its scope's policy.
/// Ids are sorted so identical state produces identical bytes.
pub fn encode_checkpoint(cursor: NaiveDate, scope: &DedupeScope) -> serde_json::Result<Vec<u8>> {
    let file = match scope {
        DedupeScope::Windowed(ids) => {
            let mut paper_ids: Vec<String> = ids.iter().cloned().collect();
            paper_ids.sort_unstable();
            CheckpointFile::Windowed {
                date: format_date(cursor),
                paper_ids,
            }
        }
        DedupeScope::Accumulated(b) => CheckpointFile::Accumulated {
            date: Some(format_date(cursor)),
            processed_ids: b
                .iter()
                .map(|(date, ids)| {
                    let mut ids: Vec<String> = ids.iter().cloned().collect();
                    ids.sort_unstable();
                    (format_date(*date), ids)
                })
                .collect(),
        },
    };
    serde_json::to_vec_pretty(&file)
}

/// Parse and validate a stored checkpoint, converting between forms when the
/// file was written under the other policy.
pub fn decode_checkpoint(
    bytes: &[u8],
    policy: DedupePolicy,
    initial_cursor: NaiveDate,
) -> Result<Checkpoint, CheckpointError> {
    let file: CheckpointFile = serde_json::from_slice(bytes).map_err(CheckpointError::Json)?;
    let valid_date = |s: &str| parse_date(s).ok_or_else(|| CheckpointError::InvalidDate(s.into()));

    let (cursor, buckets): (NaiveDate, BTreeMap<NaiveDate, Vec<String>>) = match file {
        CheckpointFile::Windowed { date, paper_ids } => {
            let cursor = valid_date(&date)?;
            (cursor, BTreeMap::from([(cursor, paper_ids)]))
        }
        CheckpointFile::Accumulated {
            date,
            processed_ids,
        } => {
            let cursor = match date {
                Some(d) => valid_date(&d)?,
                None => initial_cursor,
            };
            let mut buckets = BTreeMap::new();
            for (d, ids) in processed_ids {
                buckets.insert(valid_date(&d)?, ids);
            }
            (cursor, buckets)
        }
    };

    let mut scope = policy.empty_scope();
    for (date, ids) in buckets {
        for id in ids {
            scope.insert(&id, date);
        }
    }
    Ok(Checkpoint { cursor, scope })
}

/// Durable home of the ingestion checkpoint
pub trait WatermarkStore {
    /// Reconstruct the checkpoint, or a fresh one if none valid exists
    fn load(&self) -> Checkpoint;

    /// Durably replace the checkpoint. Must be atomic with respect to crashes.
    fn save(&self, cursor: NaiveDate, scope: &DedupeScope) -> io::Result<()>;
}

impl<T: WatermarkStore + ?Sized> WatermarkStore for &T {
    fn load(&self) -> Checkpoint {
        (**self).load()
    }

    fn save(&self, cursor: NaiveDate, scope: &DedupeScope) -> io::Result<()> {
        (**self).save(cursor, scope)
    }
}

/// Checkpoint persisted as a JSON file, rewritten via tmp → rename
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    policy: DedupePolicy,
    initial_cursor: NaiveDate,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>, policy: DedupePolicy, initial_cursor: NaiveDate) -> Self {
        Self {
            path: path.into(),
            policy,
            initial_cursor,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WatermarkStore for JsonFileStore {
    fn load(&self) -> Checkpoint {
        if let Err(e) = papertrail_core::cleanup_tmp_file(&self.path) {
            log::warn!("Cannot remove stale checkpoint tmp file: {e}");
        }
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!(
                    "No checkpoint at {}, starting from {}",
                    self.path.display(),
                    self.initial_cursor
                );
                return Checkpoint::fresh(self.initial_cursor, self.policy);
            }
            Err(e) => {
                log::warn!(
                    "Cannot read checkpoint {}: {e}; starting from {}",
                    self.path.display(),
                    self.initial_cursor
                );
                return Checkpoint::fresh(self.initial_cursor, self.policy);
            }
        };
        match decode_checkpoint(&bytes, self.policy, self.initial_cursor) {
            Ok(cp) => {
                log::info!(
                    "Loaded checkpoint {}: cursor={}, {} ids in scope",
                    self.path.display(),
                    cp.cursor,
                    cp.scope.len()
                );
                cp
            }
            Err(e) => {
                log::warn!(
                    "Ignoring checkpoint {}: {e}; starting from {}",
                    self.path.display(),
                    self.initial_cursor
                );
                Checkpoint::fresh(self.initial_cursor, self.policy)
            }
        }
    }

    fn save(&self, cursor: NaiveDate, scope: &DedupeScope) -> io::Result<()> {
        let bytes = encode_checkpoint(cursor, scope).map_err(io::Error::other)?;
        papertrail_core::write_atomic(&self.path, &bytes)
    }
}

/// In-memory store holding the encoded checkpoint, for tests and dry runs.
///
/// Round-trips through the same encoding and validation as [`JsonFileStore`].
#[derive(Debug)]
pub struct MemoryStore {
    policy: DedupePolicy,
    initial_cursor: NaiveDate,
    bytes: Mutex<Option<Vec<u8>>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new(policy: DedupePolicy, initial_cursor: NaiveDate) -> Self {
        Self {
            policy,
            initial_cursor,
            bytes: Mutex::new(None),
            saves: Mutex::new(0),
        }
    }

    /// Seed with raw stored bytes (possibly corrupt)
    pub fn with_bytes(self, bytes: impl Into<Vec<u8>>) -> Self {
        *self.bytes.lock().unwrap_or_else(|e| e.into_inner()) = Some(bytes.into());
        self
    }

    /// Raw stored bytes, if anything was saved
    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.bytes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl WatermarkStore for MemoryStore {
    fn load(&self) -> Checkpoint {
        match self.bytes() {
            Some(bytes) => decode_checkpoint(&bytes, self.policy, self.initial_cursor)
                .unwrap_or_else(|e| {
                    log::warn!("Ignoring stored checkpoint: {e}");
                    Checkpoint::fresh(self.initial_cursor, self.policy)
                }),
            None => Checkpoint::fresh(self.initial_cursor, self.policy),
        }
    }

    fn save(&self, cursor: NaiveDate, scope: &DedupeScope) -> io::Result<()> {
        let bytes = encode_checkpoint(cursor, scope).map_err(io::Error::other)?;
        *self.bytes.lock().unwrap_or_else(|e| e.into_inner()) = Some(bytes);
        *self.saves.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    const ACC30: DedupePolicy = DedupePolicy::Accumulated {
        retention_days: Some(30),
    };

    #[test]
    fn policy_from_name() {
        assert_eq!(
            DedupePolicy::from_name("windowed", Some(3)),
            Some(DedupePolicy::Windowed)
        );
        assert_eq!(DedupePolicy::from_name("Accumulated", Some(30)), Some(ACC30));
        assert_eq!(DedupePolicy::from_name("rolling", None), None);
    }

    #[test]
    fn windowed_promote_resets() {
        let mut scope = DedupePolicy::Windowed.empty_scope();
        assert!(scope.insert("a", d("2024-01-01")));
        assert!(!scope.insert("a", d("2024-01-01")));
        assert_eq!(scope.promote(d("2024-01-02")), 1);
        assert!(scope.is_empty());
        assert!(!scope.contains("a"));
    }

    #[test]
    fn accumulated_dedupes_across_buckets() {
        let mut scope = ACC30.empty_scope();
        assert!(scope.insert("a", d("2024-01-01")));
        assert!(!scope.insert("a", d("2024-01-05")));
        assert!(scope.contains("a"));
        assert_eq!(scope.len(), 1);
    }

    #[test]
    fn accumulated_evicts_past_retention() {
        let mut scope = ACC30.empty_scope();
        scope.insert("old", d("2024-01-01"));
        scope.insert("edge", d("2024-01-31"));
        scope.insert("new", d("2024-02-15"));

        // horizon = 2024-03-01 - 30d = 2024-01-31, kept inclusive
        assert_eq!(scope.promote(d("2024-03-01")), 1);
        assert!(!scope.contains("old"));
        assert!(scope.contains("edge"));
        assert!(scope.contains("new"));
        let DedupeScope::Accumulated(b) = &scope else {
            panic!("expected accumulated scope")
        };
        assert_eq!(b.bucket_count(), 2);
        assert_eq!(b.date_range(), Some((d("2024-01-31"), d("2024-02-15"))));
    }

    #[test]
    fn accumulated_unbounded_never_evicts() {
        let mut scope = DedupePolicy::Accumulated {
            retention_days: None,
        }
        .empty_scope();
        scope.insert("old", d("1990-01-01"));
        assert_eq!(scope.promote(d("2024-01-01")), 0);
        assert!(scope.contains("old"));
    }

    #[test]
    fn windowed_file_shape() {
        let mut scope = DedupePolicy::Windowed.empty_scope();
        scope.insert("p2", d("2024-01-01"));
        scope.insert("p1", d("2024-01-01"));
        let bytes = encode_checkpoint(d("2024-01-01"), &scope).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["date"], "2024-01-01");
        assert_eq!(v["paperIds"], serde_json::json!(["p1", "p2"]));
    }

    #[test]
    fn accumulated_file_shape() {
        let mut scope = ACC30.empty_scope();
        scope.insert("a", d("2024-01-01"));
        scope.insert("b", d("2024-01-02"));
        let bytes = encode_checkpoint(d("2024-01-02"), &scope).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["date"], "2024-01-02");
        assert_eq!(v["processedIds"]["2024-01-01"], serde_json::json!(["a"]));
        assert_eq!(v["processedIds"]["2024-01-02"], serde_json::json!(["b"]));
    }

    #[test]
    fn decode_rejects_non_string_date() {
        let err = decode_checkpoint(
            br#"{"date": 20240101, "paperIds": []}"#,
            DedupePolicy::Windowed,
            d("2000-01-01"),
        );
        assert!(matches!(err, Err(CheckpointError::Json(_))));
    }

    #[test]
    fn decode_rejects_unparsable_date() {
        let err = decode_checkpoint(
            br#"{"date": "yesterday", "paperIds": []}"#,
            DedupePolicy::Windowed,
            d("2000-01-01"),
        );
        assert!(matches!(err, Err(CheckpointError::InvalidDate(_))));
    }

    #[test]
    fn decode_rejects_bad_id_types() {
        let err = decode_checkpoint(
            br#"{"date": "2024-01-01", "paperIds": [1, 2]}"#,
            DedupePolicy::Windowed,
            d("2000-01-01"),
        );
        assert!(err.is_err());
    }

    #[test]
    fn decode_accumulated_without_date_uses_initial() {
        let cp = decode_checkpoint(
            br#"{"processedIds": {"2024-01-01": ["a"], "2024-01-03": ["b"]}}"#,
            ACC30,
            d("2023-06-01"),
        )
        .unwrap();
        assert_eq!(cp.cursor, d("2023-06-01"));
        assert!(cp.scope.contains("a") && cp.scope.contains("b"));
    }

    #[test]
    fn accumulated_file_loads_as_windowed_union() {
        let cp = decode_checkpoint(
            br#"{"date": "2024-01-03", "processedIds": {"2024-01-01": ["a"], "2024-01-03": ["b"]}}"#,
            DedupePolicy::Windowed,
            d("2000-01-01"),
        )
        .unwrap();
        assert_eq!(cp.cursor, d("2024-01-03"));
        assert_eq!(cp.scope.policy(), DedupePolicy::Windowed);
        assert_eq!(cp.scope.len(), 2);
    }

    #[test]
    fn windowed_file_loads_as_single_bucket() {
        let cp = decode_checkpoint(
            br#"{"date": "2024-01-03", "paperIds": ["a", "b"]}"#,
            ACC30,
            d("2000-01-01"),
        )
        .unwrap();
        let DedupeScope::Accumulated(b) = &cp.scope else {
            panic!("expected accumulated scope")
        };
        assert_eq!(b.bucket_count(), 1);
        assert_eq!(b.date_range(), Some((d("2024-01-03"), d("2024-01-03"))));
    }

    #[test]
    fn file_store_roundtrip_and_fallbacks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");
        let store = JsonFileStore::new(&path, DedupePolicy::Windowed, d("2020-01-01"));

        // missing file
        let cp = store.load();
        assert_eq!(cp, Checkpoint::fresh(d("2020-01-01"), DedupePolicy::Windowed));

        let mut scope = DedupePolicy::Windowed.empty_scope();
        scope.insert("p1", d("2024-01-01"));
        store.save(d("2024-01-01"), &scope).unwrap();
        let cp = store.load();
        assert_eq!(cp.cursor, d("2024-01-01"));
        assert!(cp.scope.contains("p1"));

        // corrupt file
        std::fs::write(&path, b"{not json").unwrap();
        let cp = store.load();
        assert_eq!(cp.cursor, d("2020-01-01"));
        assert!(cp.scope.is_empty());
    }

    #[test]
    fn memory_store_counts_saves() {
        let store = MemoryStore::new(DedupePolicy::Windowed, d("2020-01-01"));
        let scope = DedupePolicy::Windowed.empty_scope();
        store.save(d("2021-01-01"), &scope).unwrap();
        store.save(d("2021-01-02"), &scope).unwrap();
        assert_eq!(store.save_count(), 2);
        assert_eq!(store.load().cursor, d("2021-01-02"));
    }
}
