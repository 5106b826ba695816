//! Append-only NDJSON corpus of accepted records

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use papertrail_core::LockedAppender;

use crate::record::Record;

/// Destination for accepted records. An `Ok` return means the record is durable.
pub trait CorpusSink {
    fn append(&self, record: &Record) -> io::Result<()>;
}

impl<T: CorpusSink + ?Sized> CorpusSink for &T {
    fn append(&self, record: &Record) -> io::Result<()> {
        (**self).append(record)
    }
}

/// Corpus file, one record per line, appends serialized by an advisory lock file
#[derive(Debug, Clone)]
pub struct CorpusFile {
    appender: LockedAppender,
}

impl CorpusFile {
    pub fn new(path: impl Into<PathBuf>, lock_path: impl Into<PathBuf>) -> Self {
        Self {
            appender: LockedAppender::new(path, lock_path),
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.appender = self.appender.with_lock_timeout(timeout);
        self
    }

    pub fn path(&self) -> &Path {
        self.appender.path()
    }
}

impl CorpusSink for CorpusFile {
    fn append(&self, record: &Record) -> io::Result<()> {
        let line = record.to_json_line().map_err(io::Error::other)?;
        self.appender.append(line.as_bytes())
    }
}

/// Count non-empty lines of an NDJSON file (0 if it does not exist)
pub fn count_lines(path: &Path) -> io::Result<usize> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let mut n = 0;
    for line in BufReader::new(file).lines() {
        if !line?.trim().is_empty() {
            n += 1;
        }
    }
    Ok(n)
}

/// Stream the records of an NDJSON file. Unparsable lines are logged and skipped.
pub fn read_records(path: &Path) -> io::Result<impl Iterator<Item = Record>> {
    let reader = BufReader::new(File::open(path)?);
    let label = path.display().to_string();
    Ok(reader
        .lines()
        .enumerate()
        .filter_map(move |(idx, line)| match line {
            Ok(l) if l.trim().is_empty() => None,
            Ok(l) => match serde_json::from_str::<Record>(&l) {
                Ok(r) => Some(r),
                Err(e) => {
                    log::warn!("{label}:{}: skipping unparsable line: {e}", idx + 1);
                    None
                }
            },
            Err(e) => {
                log::warn!("{label}:{}: read error: {e}", idx + 1);
                None
            }
        }))
}

/// In-memory corpus for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryCorpus {
    records: Mutex<Vec<Record>>,
}

impl MemoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many times `id` was appended
    pub fn count_id(&self, id: &str) -> usize {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|r| r.id() == Some(id))
            .count()
    }
}

impl CorpusSink for MemoryCorpus {
    fn append(&self, record: &Record) -> io::Result<()> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }
}
