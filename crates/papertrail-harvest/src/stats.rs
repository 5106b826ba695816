//! Harvest counters and reporting.
//!
//! Every record a fetch delivers lands in exactly one outcome bucket:
//! appended, duplicate, missing id, future dated, bad date or write failure.

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use papertrail_core::{Summary, fmt_num};

/// Cumulative counters for one engine instance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Outer loop iterations started
    pub iterations: usize,
    /// Fetch attempts abandoned on a network/status/parse error
    pub fetch_failures: usize,
    /// Pages fully processed
    pub pages: usize,
    /// Records delivered by the fetcher
    pub records_seen: usize,
    /// Records appended to the corpus
    pub appended: usize,
    /// Dropped: id already in the dedupe scope
    pub duplicates: usize,
    /// Dropped: no identifier
    pub missing_id: usize,
    /// Dropped: publication date after today
    pub future_dated: usize,
    /// Dropped: unparsable publication date
    pub bad_date: usize,
    /// Corpus append failed; record left for a later replay
    pub write_failures: usize,
    /// Checkpoint saves that failed
    pub checkpoint_failures: usize,
    /// Cursor promotions
    pub promotions: usize,
    /// Ids dropped from the dedupe scope by promotions
    pub evicted_ids: usize,
}

impl EngineStats {
    /// Records dropped for malformed upstream data
    pub fn malformed(&self) -> usize {
        self.missing_id + self.future_dated + self.bad_date
    }
}

impl Summary for EngineStats {
    fn log(&self) {
        log::info!(
            "harvest: {} iterations, {} pages, {} seen, {} appended, {} duplicates, \
             {} malformed, {} write failures, {} fetch failures, {} promotions",
            fmt_num(self.iterations),
            fmt_num(self.pages),
            fmt_num(self.records_seen),
            fmt_num(self.appended),
            fmt_num(self.duplicates),
            fmt_num(self.malformed()),
            fmt_num(self.write_failures),
            fmt_num(self.fetch_failures),
            fmt_num(self.promotions),
        );
    }

    /// Summary table (TTY mode)
    fn print(&self) {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Harvest").fg(Color::Cyan),
                Cell::new("Count").fg(Color::Cyan),
            ]);

        let rows: [(&str, usize); 13] = [
            ("Iterations", self.iterations),
            ("Pages", self.pages),
            ("Records seen", self.records_seen),
            ("Appended", self.appended),
            ("Duplicates", self.duplicates),
            ("Missing id", self.missing_id),
            ("Future dated", self.future_dated),
            ("Bad date", self.bad_date),
            ("Write failures", self.write_failures),
            ("Fetch failures", self.fetch_failures),
            ("Checkpoint failures", self.checkpoint_failures),
            ("Promotions", self.promotions),
            ("Evicted ids", self.evicted_ids),
        ];
        for (label, n) in rows {
            let cell = Cell::new(fmt_num(n));
            let cell = match label {
                "Appended" if n > 0 => cell.fg(Color::Green),
                "Write failures" | "Fetch failures" | "Checkpoint failures" if n > 0 => {
                    cell.fg(Color::Red)
                }
                _ => cell,
            };
            table.add_row(vec![Cell::new(label), cell]);
        }
        eprintln!("\n{table}");
    }
}
