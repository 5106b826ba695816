//! Crash-safe file writes: atomic replace and lock-guarded appends

use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Default bound on waiting for another process to release the append lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

const LOCK_POLL: Duration = Duration::from_millis(10);

/// Path of the temporary sibling used by [`write_atomic`]
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write `bytes` to `path` via tmp → fsync → rename.
///
/// A crash leaves either the old file or the new one, never a torn mix.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    sync_parent_dir(path);
    Ok(())
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Ok(dir) = File::open(parent) {
            if let Err(e) = dir.sync_all() {
                log::warn!("Failed to sync directory {}: {e}", parent.display());
            }
        }
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}

/// Append-only file whose writes are serialized by an advisory lock file.
///
/// The lock is held for the write only. Each [`append`](Self::append) call
/// lands as one contiguous chunk even with several writer processes.
#[derive(Debug, Clone)]
pub struct LockedAppender {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
}

impl LockedAppender {
    pub fn new(path: impl Into<PathBuf>, lock_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_path: lock_path.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Append `bytes` under the exclusive lock and sync them to disk.
    pub fn append(&self, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)?;
        self.acquire(&lock)?;

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| {
                write_or_truncate(&mut file, |f| {
                    f.write_all(bytes)?;
                    f.sync_data()
                })
            });

        if let Err(e) = lock.unlock() {
            log::warn!("Failed to release {}: {e}", self.lock_path.display());
        }
        result
    }

    fn acquire(&self, lock: &File) -> io::Result<()> {
        let deadline = Instant::now() + self.lock_timeout;
        loop {
            match lock.try_lock() {
                Ok(()) => return Ok(()),
                Err(TryLockError::WouldBlock) if Instant::now() < deadline => {
                    std::thread::sleep(LOCK_POLL);
                }
                Err(TryLockError::WouldBlock) => {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!(
                            "lock {} held for more than {:?}",
                            self.lock_path.display(),
                            self.lock_timeout
                        ),
                    ));
                }
                Err(TryLockError::Error(e)) => return Err(e),
            }
        }
    }
}

/// Run `write` against `file`, cutting it back to its prior length if the
/// write fails so no partial line is left for the next append to merge into.
fn write_or_truncate(
    file: &mut File,
    write: impl FnOnce(&mut File) -> io::Result<()>,
) -> io::Result<()> {
    let old_len = file.metadata()?.len();
    let result = write(file);
    if result.is_err() {
        if let Err(e) = file.set_len(old_len) {
            log::warn!("Failed to truncate partial append: {e}");
        }
    }
    result
}

/// Remove a stale `.tmp` sibling left by an interrupted [`write_atomic`]
pub fn cleanup_tmp_file(path: &Path) -> io::Result<()> {
    let tmp = tmp_path(path);
    if tmp.exists() {
        log::warn!("Removing stale tmp file: {}", tmp.display());
        fs::remove_file(&tmp)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn write_atomic_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/state.json");
        write_atomic(&path, b"{}").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn cleanup_removes_stale_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(tmp_path(&path), b"partial").unwrap();
        cleanup_tmp_file(&path).unwrap();
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let lock = dir.path().join("log.lock");

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let appender = LockedAppender::new(&path, &lock);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let line = format!("{}\n", format!("{t}-{i}:").repeat(40));
                        appender.append(line.as_bytes()).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 200);
        for line in lines {
            let unit = &line[..line.find(':').unwrap() + 1];
            assert_eq!(line, unit.repeat(40));
        }
    }

    #[test]
    fn failed_write_leaves_no_partial_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let appender = LockedAppender::new(&path, dir.path().join("log.lock"));
        appender.append(b"{\"id\":1}\n").unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        let err = write_or_truncate(&mut file, |f| {
            f.write_all(b"{\"id\":2,\"ti")?;
            Err(io::Error::other("no space left on device"))
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "no space left on device");
        assert_eq!(fs::read(&path).unwrap(), b"{\"id\":1}\n");

        appender.append(b"{\"id\":3}\n").unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().collect::<Vec<_>>(), vec!["{\"id\":1}", "{\"id\":3}"]);
    }

    #[test]
    fn append_times_out_when_lock_held() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("held.lock");
        let holder = File::create(&lock_path).unwrap();
        holder.lock().unwrap();

        let appender = LockedAppender::new(dir.path().join("out"), &lock_path)
            .with_lock_timeout(Duration::from_millis(50));
        let err = appender.append(b"x\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert!(!dir.path().join("out").exists());
    }
}
