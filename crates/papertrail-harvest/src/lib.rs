//! Papertrail Harvest - incremental paper metadata harvester
//!
//! Pages through a date-sorted upstream search, appends newly seen records to
//! an NDJSON corpus, and keeps a resumable (cursor, dedupe scope) checkpoint
//! so restarts neither skip nor duplicate records.

pub mod api;
pub mod clock;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod record;
pub mod runner;
pub mod stats;
pub mod status;
pub mod watermark;

// Re-exports
pub use api::{BulkSearchConfig, BulkSearchFetcher, FetchError, Page, PageFetcher, PageRequest, pages};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::HarvestConfig;
pub use corpus::{CorpusFile, CorpusSink, MemoryCorpus, read_records};
pub use engine::{EngineConfig, EngineSnapshot, FetchOutcome, IngestionEngine, RecordOutcome};
pub use record::{Record, RecordDate, format_date, parse_date};
pub use runner::run;
pub use stats::EngineStats;
pub use status::CheckpointSummary;
pub use watermark::{Checkpoint, DedupePolicy, DedupeScope, JsonFileStore, MemoryStore, WatermarkStore};
