//! Snapshot Manager
//!
//! Point-in-time copy of the store as a pretty-printed JSON object
//! (`data_store.json`). A snapshot is replaced atomically: the new content
//! goes to `data_store.tmp`, is fsynced, then renamed over the old file.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::error::{Result, VaultError};

/// Reads, merges and atomically replaces the snapshot file
pub struct SnapshotManager {
    path: PathBuf,
    temp_path: PathBuf,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl SnapshotManager {
    pub fn new(path: &Path, temp_path: &Path, retry_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            path: path.to_path_buf(),
            temp_path: temp_path.to_path_buf(),
            retry_attempts: retry_attempts.max(1),
            retry_delay,
        }
    }

    /// Load the current snapshot
    ///
    /// A missing snapshot is empty. So is an unreadable one: the WAL still
    /// holds everything written since it was taken.
    pub fn load(&self) -> BTreeMap<String, String> {
        match read_snapshot(&self.path) {
            Ok(Some(entries)) => entries,
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring unreadable snapshot");
                BTreeMap::new()
            }
        }
    }

    /// Combine the previous snapshot with the live MemTable
    ///
    /// Pending deletes are dropped from `existing`, MemTable values replace
    /// older ones, and the oldest entries (previous snapshot first, then
    /// MemTable entries in key order) are evicted beyond `max_entries`.
    pub fn merge(
        existing: BTreeMap<String, String>,
        deletes: &BTreeSet<String>,
        memtable: &BTreeMap<String, String>,
        max_entries: usize,
    ) -> BTreeMap<String, String> {
        let mut ordered: Vec<(String, String)> = existing
            .into_iter()
            .filter(|(key, _)| !deletes.contains(key) && !memtable.contains_key(key))
            .collect();
        ordered.extend(memtable.iter().map(|(k, v)| (k.clone(), v.clone())));

        let evict = ordered.len().saturating_sub(max_entries);
        if evict > 0 {
            tracing::warn!(evicted = evict, max_entries, "Snapshot over capacity, evicting oldest entries");
        }

        ordered.into_iter().skip(evict).collect()
    }

    /// Atomically replace the snapshot with `entries`
    ///
    /// Transient I/O failures are retried; anything else surfaces at once.
    pub fn write(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        retry_transient(self.retry_attempts, self.retry_delay, || self.write_once(entries))
    }

    /// Finish a replace interrupted after the temp file was written
    ///
    /// A temp file that parses completely is adopted; anything else is
    /// discarded and the previous snapshot stays. Returns true if adopted.
    pub fn adopt_temp(&self) -> Result<bool> {
        match read_snapshot(&self.temp_path) {
            Ok(Some(_)) => {
                fs::rename(&self.temp_path, &self.path)?;
                tracing::info!(path = %self.path.display(), "Adopted snapshot from interrupted save");
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding incomplete snapshot temp file");
                fs::remove_file(&self.temp_path)?;
                Ok(false)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    fn write_once(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(&self.temp_path)?);
        serde_json::to_writer_pretty(&mut writer, entries)?;
        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|e| VaultError::Storage(format!("Failed to flush snapshot: {}", e)))?;
        file.sync_all()?;
        drop(file);

        fs::rename(&self.temp_path, &self.path)?;
        Ok(())
    }
}

/// `Ok(None)` when the file does not exist
fn read_snapshot(path: &Path) -> Result<Option<BTreeMap<String, String>>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let entries = serde_json::from_reader(BufReader::new(file))?;
    Ok(Some(entries))
}

/// Run `op` up to `attempts` times while it fails with a transient I/O error
///
/// Sleeps `delay` between attempts. The last error is returned once the
/// attempts run out; non-transient errors are returned immediately.
pub fn retry_transient<T, F>(attempts: u32, delay: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Err(VaultError::Io(e)) if is_transient(&e) && attempt < attempts => {
                tracing::warn!(
                    attempt,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "Snapshot file busy, retrying"
                );
                attempt += 1;
                thread::sleep(delay);
            }
            result => return result,
        }
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock
            | io::ErrorKind::PermissionDenied
            | io::ErrorKind::Interrupted
            | io::ErrorKind::TimedOut
    )
}
