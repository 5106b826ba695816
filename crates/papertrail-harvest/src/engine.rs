//! Incremental ingestion engine.
//!
//! One cooperative loop: promote the cursor if the interval elapsed, fetch
//! every page from the committed cursor, filter and append records, persist
//! the checkpoint after each page, back off, repeat until stopped.
//!
//! Invariants:
//! - queries always start at the committed `cursor`, never the pending one
//! - `cursor` only moves forward, and only at promotion
//! - an id in the dedupe scope is never appended again while in scope
//! - the checkpoint is saved after whole pages only

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use indicatif::ProgressBar;
use papertrail_core::fmt_num;

use crate::api::{PageFetcher, pages};
use crate::clock::{Clock, SystemClock};
use crate::corpus::CorpusSink;
use crate::record::{Record, RecordDate};
use crate::stats::EngineStats;
use crate::watermark::{DedupePolicy, DedupeScope, WatermarkStore};

pub const DEFAULT_PROMOTION_INTERVAL: Duration = Duration::from_secs(3600);
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);

/// Granularity at which the backoff sleep checks for cancellation
const SLEEP_SLICE: Duration = Duration::from_millis(250);

/// Engine parameters
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cursor used when no valid checkpoint exists
    pub initial_cursor: NaiveDate,
    /// Minimum time between cursor promotions
    pub promotion_interval: Duration,
    /// Pause between fetch attempts
    pub backoff: Duration,
    pub policy: DedupePolicy,
}

impl EngineConfig {
    pub fn new(initial_cursor: NaiveDate, policy: DedupePolicy) -> Self {
        Self {
            initial_cursor,
            promotion_interval: DEFAULT_PROMOTION_INTERVAL,
            backoff: DEFAULT_BACKOFF,
            policy,
        }
    }
}

/// What happened to one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Appended,
    Duplicate,
    MissingId,
    FutureDated,
    BadDate,
    /// Corpus append failed; the id stays out of scope so a replay retries it
    WriteFailed,
}

/// How one fetch attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Upstream reported no more pages
    Exhausted { pages: usize },
    /// A page request failed; earlier pages stay processed
    Failed { pages: usize },
    /// Stop observed after finishing the in-flight page
    Cancelled { pages: usize },
}

/// Point-in-time view for status reporting
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    pub cursor: NaiveDate,
    pub pending_cursor: NaiveDate,
    pub ids_in_scope: usize,
    pub stats: EngineStats,
}

/// Checkpoint triple plus counters. Only the engine loop mutates it.
#[derive(Debug)]
struct HarvestState {
    cursor: NaiveDate,
    pending: NaiveDate,
    scope: DedupeScope,
    last_promotion: Instant,
    stats: EngineStats,
}

impl HarvestState {
    fn accept(&mut self, record: &Record, today: NaiveDate, corpus: &impl CorpusSink) -> RecordOutcome {
        self.stats.records_seen += 1;

        let Some(id) = record.id() else {
            log::warn!(
                "Dropping record without paperId (title: {:?})",
                record.title.as_deref().unwrap_or("")
            );
            self.stats.missing_id += 1;
            return RecordOutcome::MissingId;
        };

        if self.scope.contains(id) {
            log::debug!("{id}: already emitted, skipping");
            self.stats.duplicates += 1;
            return RecordOutcome::Duplicate;
        }

        let date = match record.date() {
            RecordDate::Absent => None,
            RecordDate::Valid(d) if d > today => {
                log::warn!("{id}: dropping future publicationDate {d} (today is {today})");
                self.stats.future_dated += 1;
                return RecordOutcome::FutureDated;
            }
            RecordDate::Valid(d) => Some(d),
            RecordDate::Invalid(raw) => {
                log::warn!("{id}: dropping unparsable publicationDate {raw:?}");
                self.stats.bad_date += 1;
                return RecordOutcome::BadDate;
            }
        };

        if let Err(e) = corpus.append(record) {
            log::error!("{id}: corpus append failed: {e}");
            self.stats.write_failures += 1;
            return RecordOutcome::WriteFailed;
        }

        // Undated records are filed under the cursor they were accepted at
        self.scope.insert(id, date.unwrap_or(self.cursor));
        if let Some(d) = date {
            if d > self.pending {
                self.pending = d;
            }
        }
        self.stats.appended += 1;
        RecordOutcome::Appended
    }

    /// Commit `pending` into `cursor` if `interval` elapsed since the last
    /// promotion check that fired. Returns whether the cursor moved.
    fn promote_if_due(&mut self, now: Instant, interval: Duration, store: &impl WatermarkStore) -> bool {
        if now.duration_since(self.last_promotion) < interval {
            return false;
        }
        self.last_promotion = now;
        if self.pending <= self.cursor {
            return false;
        }

        let previous = self.cursor;
        self.cursor = self.pending;
        let evicted = self.scope.promote(self.cursor);
        self.stats.promotions += 1;
        self.stats.evicted_ids += evicted;
        log::info!(
            "Promoted cursor {previous} -> {} ({} ids left scope, {} remain)",
            self.cursor,
            fmt_num(evicted),
            fmt_num(self.scope.len())
        );
        self.persist(store);
        true
    }

    fn persist(&mut self, store: &impl WatermarkStore) -> bool {
        match store.save(self.cursor, &self.scope) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Checkpoint save failed (cursor {}): {e}", self.cursor);
                self.stats.checkpoint_failures += 1;
                false
            }
        }
    }
}

/// The harvest state machine over injected fetcher, store, corpus and clock
pub struct IngestionEngine<F, S, C, K = SystemClock> {
    config: EngineConfig,
    fetcher: F,
    store: S,
    corpus: C,
    clock: K,
    state: HarvestState,
    status: ProgressBar,
}

impl<F, S, C, K> IngestionEngine<F, S, C, K>
where
    F: PageFetcher,
    S: WatermarkStore,
    C: CorpusSink,
    K: Clock,
{
    /// Build an engine resuming from whatever checkpoint `store` holds
    pub fn new(config: EngineConfig, fetcher: F, store: S, corpus: C, clock: K) -> Self {
        let checkpoint = store.load();
        if checkpoint.scope.policy().name() != config.policy.name() {
            log::warn!(
                "Checkpoint store uses {} policy, engine configured for {}",
                checkpoint.scope.policy(),
                config.policy
            );
        }
        let last_promotion = clock.now();
        Self {
            state: HarvestState {
                cursor: checkpoint.cursor,
                pending: checkpoint.cursor,
                scope: checkpoint.scope,
                last_promotion,
                stats: EngineStats::default(),
            },
            config,
            fetcher,
            store,
            corpus,
            clock,
            status: ProgressBar::hidden(),
        }
    }

    /// Show live progress on a status line
    pub fn with_status_line(mut self, status: ProgressBar) -> Self {
        self.status = status;
        self
    }

    /// Committed watermark
    pub fn cursor(&self) -> NaiveDate {
        self.state.cursor
    }

    /// Candidate watermark awaiting promotion
    pub fn pending_cursor(&self) -> NaiveDate {
        self.state.pending
    }

    pub fn scope(&self) -> &DedupeScope {
        &self.state.scope
    }

    pub fn stats(&self) -> &EngineStats {
        &self.state.stats
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            cursor: self.state.cursor,
            pending_cursor: self.state.pending,
            ids_in_scope: self.state.scope.len(),
            stats: self.state.stats.clone(),
        }
    }

    /// Filter one record and append it if accepted
    pub fn process_record(&mut self, record: &Record) -> RecordOutcome {
        let today = self.clock.today();
        self.state.accept(record, today, &self.corpus)
    }

    /// Promote the pending cursor if the promotion interval elapsed
    pub fn promote_if_due(&mut self) -> bool {
        let now = self.clock.now();
        self.state
            .promote_if_due(now, self.config.promotion_interval, &self.store)
    }

    /// Fetch and process every page from the committed cursor.
    ///
    /// `stop` is checked after each page; the in-flight page always finishes.
    pub fn fetch_once(&mut self, stop: &AtomicBool) -> FetchOutcome {
        let lower = self.state.cursor;
        let mut n_pages = 0;

        for result in pages(&self.fetcher, lower) {
            let page = match result {
                Ok(page) => page,
                Err(e) => {
                    log::warn!("Fetch from {lower} failed after {n_pages} pages: {e}");
                    self.state.stats.fetch_failures += 1;
                    return FetchOutcome::Failed { pages: n_pages };
                }
            };
            if n_pages == 0 {
                if let Some(total) = page.total {
                    log::info!("Fetching from {lower}: ~{total} matching records upstream");
                }
            }

            let today = self.clock.today();
            for record in &page.records {
                self.state.accept(record, today, &self.corpus);
            }
            n_pages += 1;
            self.state.stats.pages += 1;
            self.state.persist(&self.store);
            self.update_status();

            if stop.load(Ordering::Relaxed) {
                log::info!("Stop requested, leaving fetch after page {n_pages}");
                return FetchOutcome::Cancelled { pages: n_pages };
            }

            let now = self.clock.now();
            self.state
                .promote_if_due(now, self.config.promotion_interval, &self.store);
        }

        FetchOutcome::Exhausted { pages: n_pages }
    }

    /// One outer loop iteration without the trailing backoff
    pub fn run_iteration(&mut self, stop: &AtomicBool) -> FetchOutcome {
        self.promote_if_due();
        self.state.stats.iterations += 1;
        self.fetch_once(stop)
    }

    /// Run until `stop` is set. Never returns early on errors.
    pub fn run(&mut self, stop: &AtomicBool) -> EngineStats {
        log::info!(
            "Harvest starting: cursor={}, policy={}, promotion every {:?}, backoff {:?}",
            self.state.cursor,
            self.config.policy,
            self.config.promotion_interval,
            self.config.backoff
        );

        while !stop.load(Ordering::Relaxed) {
            match self.run_iteration(stop) {
                FetchOutcome::Exhausted { pages } => {
                    log::debug!("Fetch exhausted after {pages} pages");
                }
                FetchOutcome::Failed { .. } => {}
                FetchOutcome::Cancelled { .. } => break,
            }
            self.backoff(stop);
        }

        self.state.persist(&self.store);
        self.status.finish_and_clear();
        log::info!(
            "Harvest stopped: cursor={}, pending={}, {} ids in scope",
            self.state.cursor,
            self.state.pending,
            fmt_num(self.state.scope.len())
        );
        self.state.stats.clone()
    }

    /// Single iteration with a final checkpoint save, for scheduled runs
    pub fn run_once(&mut self, stop: &AtomicBool) -> FetchOutcome {
        let outcome = self.run_iteration(stop);
        self.state.persist(&self.store);
        self.status.finish_and_clear();
        outcome
    }

    fn backoff(&self, stop: &AtomicBool) {
        let mut remaining = self.config.backoff;
        while !remaining.is_zero() && !stop.load(Ordering::Relaxed) {
            let step = remaining.min(SLEEP_SLICE);
            self.clock.sleep(step);
            remaining -= step;
        }
    }

    fn update_status(&self) {
        let s = &self.state.stats;
        self.status.set_message(format!(
            "cursor {} | pending {} | {} appended | {} dup | {} malformed",
            self.state.cursor,
            self.state.pending,
            fmt_num(s.appended),
            fmt_num(s.duplicates),
            fmt_num(s.malformed())
        ));
    }
}
