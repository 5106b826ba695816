//! Read-only inspection of the checkpoint and corpus

use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use papertrail_core::{Summary, fmt_num};

use crate::corpus::count_lines;
use crate::watermark::{DedupePolicy, DedupeScope, decode_checkpoint};

/// What is on disk right now
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointSummary {
    /// `None` when no checkpoint file exists
    pub form: Option<DedupePolicy>,
    pub cursor: Option<NaiveDate>,
    pub ids_in_scope: usize,
    pub bucket_count: usize,
    pub bucket_range: Option<(NaiveDate, NaiveDate)>,
    pub corpus_lines: usize,
}

impl CheckpointSummary {
    /// Inspect `checkpoint` and `corpus`. A corrupt checkpoint is an error here,
    /// unlike the engine, which silently restarts from the initial cursor.
    pub fn read(checkpoint: &Path, corpus: &Path, initial_cursor: NaiveDate) -> anyhow::Result<Self> {
        let corpus_lines = count_lines(corpus)
            .with_context(|| format!("Cannot read corpus {}", corpus.display()))?;

        let bytes = match std::fs::read(checkpoint) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self {
                    form: None,
                    cursor: None,
                    ids_in_scope: 0,
                    bucket_count: 0,
                    bucket_range: None,
                    corpus_lines,
                });
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Cannot read {}", checkpoint.display()));
            }
        };

        let raw: serde_json::Value = serde_json::from_slice(&bytes)
            .with_context(|| format!("Malformed checkpoint {}", checkpoint.display()))?;
        let form = if raw.get("processedIds").is_some() {
            DedupePolicy::Accumulated {
                retention_days: None,
            }
        } else {
            DedupePolicy::Windowed
        };
        let cp = decode_checkpoint(&bytes, form, initial_cursor)
            .with_context(|| format!("Invalid checkpoint {}", checkpoint.display()))?;

        let (bucket_count, bucket_range) = match &cp.scope {
            DedupeScope::Windowed(_) => (1, Some((cp.cursor, cp.cursor))),
            DedupeScope::Accumulated(b) => (b.bucket_count(), b.date_range()),
        };
        Ok(Self {
            form: Some(form),
            cursor: Some(cp.cursor),
            ids_in_scope: cp.scope.len(),
            bucket_count,
            bucket_range,
            corpus_lines,
        })
    }
}

impl Summary for CheckpointSummary {
    fn log(&self) {
        match (self.form, self.cursor) {
            (Some(form), Some(cursor)) => log::info!(
                "checkpoint: form={}, cursor={cursor}, {} ids in {} buckets, corpus {} lines",
                form.name(),
                fmt_num(self.ids_in_scope),
                self.bucket_count,
                fmt_num(self.corpus_lines)
            ),
            _ => log::info!(
                "checkpoint: none, corpus {} lines",
                fmt_num(self.corpus_lines)
            ),
        }
    }

    fn print(&self) {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Status").fg(Color::Cyan),
                Cell::new("Value").fg(Color::Cyan),
            ]);

        let form = self.form.map_or("none".to_string(), |f| f.name().to_string());
        let cursor = self.cursor.map_or("-".to_string(), |c| c.to_string());
        let range = self
            .bucket_range
            .map_or("-".to_string(), |(a, b)| format!("{a} .. {b}"));
        table.add_row(vec![Cell::new("Checkpoint form"), Cell::new(form)]);
        table.add_row(vec![
            Cell::new("Cursor"),
            Cell::new(cursor).fg(Color::Green),
        ]);
        table.add_row(vec![
            Cell::new("Ids in scope"),
            Cell::new(fmt_num(self.ids_in_scope)),
        ]);
        table.add_row(vec![
            Cell::new("Buckets"),
            Cell::new(self.bucket_count.to_string()),
        ]);
        table.add_row(vec![Cell::new("Bucket range"), Cell::new(range)]);
        table.add_row(vec![
            Cell::new("Corpus lines"),
            Cell::new(fmt_num(self.corpus_lines)),
        ]);
        eprintln!("{table}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::parse_date;

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn no_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let s = CheckpointSummary::read(
            &dir.path().join("checkpoint.json"),
            &dir.path().join("papers.jsonl"),
            d("1980-01-01"),
        )
        .unwrap();
        assert_eq!(s.form, None);
        assert_eq!(s.corpus_lines, 0);
    }

    #[test]
    fn accumulated_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let cp = dir.path().join("checkpoint.json");
        let corpus = dir.path().join("papers.jsonl");
        std::fs::write(
            &cp,
            r#"{"date": "2024-01-03", "processedIds": {"2024-01-01": ["a"], "2024-01-03": ["b", "c"]}}"#,
        )
        .unwrap();
        std::fs::write(&corpus, "{}\n{}\n{}\n").unwrap();

        let s = CheckpointSummary::read(&cp, &corpus, d("1980-01-01")).unwrap();
        assert_eq!(s.form.map(DedupePolicy::name), Some("accumulated"));
        assert_eq!(s.cursor, Some(d("2024-01-03")));
        assert_eq!(s.ids_in_scope, 3);
        assert_eq!(s.bucket_count, 2);
        assert_eq!(s.bucket_range, Some((d("2024-01-01"), d("2024-01-03"))));
        assert_eq!(s.corpus_lines, 3);
    }

    #[test]
    fn corrupt_checkpoint_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let cp = dir.path().join("checkpoint.json");
        std::fs::write(&cp, "{oops").unwrap();
        assert!(CheckpointSummary::read(&cp, &dir.path().join("p.jsonl"), d("1980-01-01")).is_err());
    }
}
