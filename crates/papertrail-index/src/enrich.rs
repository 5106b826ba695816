//! Enrichment pipeline: corpus → body file with extracted full text
//!
//! Decoupled from the harvest. Reads the corpus line by line, downloads each
//! record's open-access PDF, and appends the record plus its text to the body
//! file. Ids already in the body file are skipped, so an interrupted run
//! resumes where it stopped.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use indicatif::ProgressBar;
use papertrail_core::{LockedAppender, Summary, fmt_num};
use papertrail_harvest::{Record, read_records};
use rustc_hash::FxHashSet;
use serde_json::Value;

use crate::extract::{TextExtractor, pdf_url};

/// Per-run counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    /// Corpus records read
    pub scanned: usize,
    pub no_pdf: usize,
    /// Already present in the body file
    pub already_done: usize,
    pub extracted: usize,
    pub failed: usize,
}

impl Summary for EnrichSummary {
    fn log(&self) {
        log::info!(
            "enrich: {} scanned, {} extracted, {} already done, {} without PDF, {} failed",
            fmt_num(self.scanned),
            fmt_num(self.extracted),
            fmt_num(self.already_done),
            fmt_num(self.no_pdf),
            fmt_num(self.failed),
        );
    }

    fn print(&self) {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Enrich").fg(Color::Cyan),
                Cell::new("Records").fg(Color::Cyan),
            ]);
        table.add_row(vec![Cell::new("Scanned"), Cell::new(fmt_num(self.scanned))]);
        table.add_row(vec![
            Cell::new("Extracted"),
            Cell::new(fmt_num(self.extracted)).fg(Color::Green),
        ]);
        table.add_row(vec![
            Cell::new("Already done"),
            Cell::new(fmt_num(self.already_done)),
        ]);
        table.add_row(vec![Cell::new("No PDF"), Cell::new(fmt_num(self.no_pdf))]);
        let failed = Cell::new(fmt_num(self.failed));
        let failed = if self.failed > 0 { failed.fg(Color::Red) } else { failed };
        table.add_row(vec![Cell::new("Failed"), failed]);
        eprintln!("\n{table}");
    }
}

/// Ids already written to the body file
pub fn body_ids(path: &Path) -> io::Result<FxHashSet<String>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(FxHashSet::default()),
        Err(e) => return Err(e),
    };
    let mut ids = FxHashSet::default();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let Ok(value) = serde_json::from_str::<Value>(&line) else {
            continue;
        };
        if let Some(id) = value.get("paperId").and_then(Value::as_str) {
            ids.insert(id.to_string());
        }
    }
    Ok(ids)
}

/// Body line for `record`: the record minus its PDF link and year, plus the
/// extracted text and the time it was indexed.
pub fn body_document(record: &Record, text: String, indexed_date: &str) -> anyhow::Result<Value> {
    let mut value = serde_json::to_value(record)?;
    if let Value::Object(obj) = &mut value {
        obj.remove("openAccessPdf");
        obj.remove("year");
        obj.insert("document_content".into(), Value::String(text));
        obj.insert("indexed_date".into(), Value::String(indexed_date.to_string()));
    }
    Ok(value)
}

/// Run the pipeline over `corpus`, appending to `body`. Stops early (keeping
/// everything written so far) when `stop` is set.
pub fn enrich<E: TextExtractor>(
    corpus: &Path,
    body: &LockedAppender,
    extractor: &E,
    stop: &AtomicBool,
    status: &ProgressBar,
) -> anyhow::Result<EnrichSummary> {
    let mut done = body_ids(body.path())
        .with_context(|| format!("Cannot read body file {}", body.path().display()))?;
    log::info!(
        "Enriching {} ({} documents already in {})",
        corpus.display(),
        fmt_num(done.len()),
        body.path().display()
    );

    let records = read_records(corpus)
        .with_context(|| format!("Cannot open corpus {}", corpus.display()))?;
    let mut summary = EnrichSummary::default();

    for record in records {
        if stop.load(Ordering::Relaxed) {
            log::warn!("Stop requested, enrichment interrupted");
            break;
        }
        summary.scanned += 1;

        let Some(id) = record.id() else {
            continue;
        };
        if done.contains(id) {
            summary.already_done += 1;
            continue;
        }
        let Some(url) = pdf_url(record.open_access_pdf.as_ref()) else {
            summary.no_pdf += 1;
            continue;
        };

        status.set_message(format!("{id} ({} extracted)", fmt_num(summary.extracted)));
        let text = match extractor.extract(url) {
            Ok(t) => t,
            Err(e) => {
                log::warn!("{id}: {e}");
                summary.failed += 1;
                continue;
            }
        };

        let indexed_date = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        let doc = body_document(&record, text, &indexed_date)?;
        let mut line = serde_json::to_string(&doc)?;
        line.push('\n');
        body.append(line.as_bytes())
            .with_context(|| format!("Cannot append to {}", body.path().display()))?;
        done.insert(id.to_string());
        summary.extracted += 1;
    }

    status.finish_and_clear();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::extract::ExtractError;

    struct FakeExtractor(HashMap<&'static str, &'static str>);

    impl TextExtractor for FakeExtractor {
        fn extract(&self, url: &str) -> Result<String, ExtractError> {
            self.0
                .get(url)
                .map(|t| t.to_string())
                .ok_or(ExtractError::NoText)
        }
    }

    #[test]
    fn body_document_shape() {
        let record: Record = serde_json::from_str(
            r#"{"paperId":"p1","publicationDate":"2024-01-02","year":2024,"title":"T",
                "openAccessPdf":{"url":"u"}}"#,
        )
        .unwrap();
        let doc = body_document(&record, "text".into(), "2024-06-01T00:00:00Z").unwrap();
        assert_eq!(doc["paperId"], "p1");
        assert_eq!(doc["document_content"], "text");
        assert_eq!(doc["indexed_date"], "2024-06-01T00:00:00Z");
        assert!(doc.get("openAccessPdf").is_none());
        assert!(doc.get("year").is_none());
    }

    #[test]
    fn enrich_skips_and_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("papers.jsonl");
        std::fs::write(
            &corpus,
            concat!(
                r#"{"paperId":"a","publicationDate":"2024-01-01","openAccessPdf":{"url":"https://x/a.pdf"}}"#, "\n",
                r#"{"paperId":"b","publicationDate":"2024-01-01","openAccessPdf":null}"#, "\n",
                "garbage\n",
                r#"{"paperId":"c","openAccessPdf":"https://x/c.pdf"}"#, "\n",
                r#"{"paperId":"a","publicationDate":"2024-01-01","openAccessPdf":{"url":"https://x/a.pdf"}}"#, "\n",
            ),
        )
        .unwrap();
        let body = LockedAppender::new(dir.path().join("body.jsonl"), dir.path().join("body.lock"));
        let extractor = FakeExtractor(HashMap::from([("https://x/a.pdf", "alpha text")]));
        let stop = AtomicBool::new(false);

        let first = enrich(&corpus, &body, &extractor, &stop, &ProgressBar::hidden()).unwrap();
        assert_eq!(
            first,
            EnrichSummary {
                scanned: 4,
                no_pdf: 1,
                already_done: 1,
                extracted: 1,
                failed: 1,
            }
        );

        let second = enrich(&corpus, &body, &extractor, &stop, &ProgressBar::hidden()).unwrap();
        assert_eq!(second.extracted, 0);
        assert_eq!(second.already_done, 2);
        assert_eq!(body_ids(body.path()).unwrap().len(), 1);
    }

    #[test]
    fn enrich_honours_stop() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("papers.jsonl");
        std::fs::write(&corpus, "{\"paperId\":\"a\",\"openAccessPdf\":\"u\"}\n").unwrap();
        let body = LockedAppender::new(dir.path().join("body.jsonl"), dir.path().join("body.lock"));
        let summary = enrich(
            &corpus,
            &body,
            &FakeExtractor(HashMap::new()),
            &AtomicBool::new(true),
            &ProgressBar::hidden(),
        )
        .unwrap();
        assert_eq!(summary.scanned, 0);
    }
}
