//! WAL Writer
//!
//! Handles appending records to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::{Result, VaultError};

use super::{Operation, WalEntry};

/// Writes records to the WAL file
pub struct WalWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    sync_strategy: WalSyncStrategy,
    /// Records appended since the last truncation
    record_count: u64,
    /// Records appended since the last fsync
    unsynced: usize,
}

impl WalWriter {
    /// Open or create a WAL file, appending after any existing records
    ///
    /// A partial last line left by a crash mid-append is cut off first, so
    /// the next record starts on a line of its own.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let dropped = trim_torn_tail(&mut file)?;
        if dropped > 0 {
            tracing::warn!(path = %path.display(), bytes = dropped, "Dropped partial WAL record");
        }

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            sync_strategy,
            record_count: 0,
            unsynced: 0,
        })
    }

    /// Append an operation to the WAL
    ///
    /// The line is always flushed to the OS; fsync follows the sync strategy.
    /// Returns the number of records since the last truncation.
    pub fn append(&mut self, operation: Operation) -> Result<u64> {
        let entry = WalEntry::new(operation);
        let mut line = entry.encode();
        line.push('\n');

        self.writer
            .write_all(line.as_bytes())
            .map_err(|e| VaultError::Storage(format!("WAL append failed: {}", e)))?;
        self.writer.flush()?;

        self.record_count += 1;
        self.unsynced += 1;

        let should_sync = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced >= count,
        };
        if should_sync {
            self.sync()?;
        }

        Ok(self.record_count)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Drop every record (contents are durable elsewhere)
    pub fn truncate(&mut self) -> Result<()> {
        self.writer.flush()?;
        let file = self.writer.get_mut();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.sync_all()?;

        tracing::debug!(path = %self.path.display(), records = self.record_count, "WAL truncated");

        self.record_count = 0;
        self.unsynced = 0;
        Ok(())
    }

    /// Records appended since the last truncation
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Seed the record counter with records already present at open time
    pub fn set_record_count(&mut self, count: u64) {
        self.record_count = count;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Truncate `file` back to its last newline. Returns the bytes removed.
fn trim_torn_tail(file: &mut File) -> Result<u64> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(0);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(0);
    }

    let mut content = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut content)?;
    let keep = content
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |idx| idx + 1) as u64;

    file.set_len(keep)?;
    file.sync_all()?;
    Ok(len - keep)
}
