//! SSTable Manager
//!
//! Manages the set of SSTable files and coordinates reads/writes.
//!
//! ## Responsibilities
//! - Discover existing SSTables on startup
//! - Search SSTables newest → oldest for reads
//! - Create new SSTables from MemTable flushes
//! - Rewrite tables on delete, merge old tables on compaction

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::{Mutex, RwLock};

use crate::error::Result;

use super::sstable::{self, SSTable, SSTableBuilder, SSTableName};

/// Manages the SSTable tier
///
/// ## Concurrency:
/// - `tables`: Protected by RwLock (concurrent readers, exclusive rewriter).
///   Readers hold the read lock while loading files so a rewrite or compaction
///   never removes a file out from under them.
/// - `last_timestamp`: guards monotonic file naming
/// - All methods use `&self`
pub struct SSTableManager {
    /// Directory where SSTables are stored
    data_dir: PathBuf,

    /// Tables ordered oldest → newest
    tables: RwLock<Vec<SSTable>>,

    /// Last timestamp handed out for a new file
    last_timestamp: Mutex<u64>,
}

impl SSTableManager {
    /// Open the SSTable tier stored in `path`
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Discover existing SSTable files
    /// 3. Order them oldest → newest
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;

        let mut tables = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let file_path = entry.path();

            if !file_path.is_file() {
                continue;
            }
            if let Some(name) = SSTableName::from_path(&file_path) {
                tables.push(SSTable {
                    name,
                    path: file_path,
                });
            }
        }

        tables.sort_by(|a, b| a.name.cmp(&b.name));
        let last = tables.last().map(|t| t.name.timestamp).unwrap_or(0);

        tracing::debug!(dir = %path.display(), tables = tables.len(), "SSTables discovered");

        Ok(Self {
            data_dir: path.to_path_buf(),
            tables: RwLock::new(tables),
            last_timestamp: Mutex::new(last),
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Get a value by key (searches all SSTables newest → oldest)
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let tables = self.tables.read();

        for table in tables.iter().rev() {
            let reader = table.open()?;
            if let Some(value) = reader.get(key) {
                return Ok(Some(value.to_string()));
            }
        }

        Ok(None)
    }

    /// True if any table holds `key`
    pub fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Matching entries of every table, newest table first
    pub fn range(&self, start: &str, end: &str) -> Result<Vec<Vec<(String, String)>>> {
        let tables = self.tables.read();
        let mut per_table = Vec::with_capacity(tables.len());

        for table in tables.iter().rev() {
            let reader = table.open()?;
            let matches: Vec<(String, String)> = reader
                .range(start, end)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            per_table.push(matches);
        }

        Ok(per_table)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Flush sorted entries into new tables of at most `max_entries_per_file`
    ///
    /// All files of one flush share a timestamp and carry a sequence suffix.
    pub fn flush(
        &self,
        entries: &BTreeMap<String, String>,
        max_entries_per_file: usize,
    ) -> Result<Vec<SSTableName>> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let timestamp = self.next_timestamp();
        self.flush_at(timestamp, entries, max_entries_per_file)
    }

    /// Flush using a timestamp reserved with `next_timestamp`
    pub fn flush_at(
        &self,
        timestamp: u64,
        entries: &BTreeMap<String, String>,
        max_entries_per_file: usize,
    ) -> Result<Vec<SSTableName>> {
        let per_file = max_entries_per_file.max(1);
        let mut written = Vec::new();
        let mut iter = entries.iter().peekable();
        let mut seq = 1u32;

        while iter.peek().is_some() {
            let name = SSTableName::flush(timestamp, seq);
            let mut builder = SSTableBuilder::new(&name.path_in(&self.data_dir));
            for (key, value) in iter.by_ref().take(per_file) {
                builder.add(key, value)?;
            }
            builder.finish()?;

            written.push(name);
            seq += 1;
        }

        let mut tables = self.tables.write();
        for name in &written {
            tables.push(SSTable::new(&self.data_dir, *name));
        }
        tables.sort_by(|a, b| a.name.cmp(&b.name));

        tracing::info!(files = written.len(), entries = entries.len(), timestamp, "MemTable flushed to SSTables");
        Ok(written)
    }

    /// Remove `key` from every table that holds it
    ///
    /// Each modified table is rewritten atomically; a table left empty is
    /// deleted. Every table is read before any file changes, so a failed read
    /// leaves the tier untouched. Rewrites run oldest → newest: if one fails,
    /// the newer tables still hold the key and reads keep returning its
    /// current value. Returns whether the key was found anywhere.
    pub fn remove_key(&self, key: &str) -> Result<bool> {
        let mut tables = self.tables.write();

        let mut rewrites = Vec::new();
        for (idx, table) in tables.iter().enumerate() {
            let mut entries = table.open()?.into_entries();
            if entries.remove(key).is_some() {
                rewrites.push((idx, entries));
            }
        }
        if rewrites.is_empty() {
            return Ok(false);
        }

        let mut emptied = Vec::new();
        let mut outcome = Ok(());
        for (idx, entries) in &rewrites {
            let path = &tables[*idx].path;
            let step = if entries.is_empty() {
                fs::remove_file(path)
                    .map(|_| emptied.push(*idx))
                    .map_err(Into::into)
            } else {
                sstable::write_atomic(path, entries)
            };
            if let Err(e) = step {
                outcome = Err(e);
                break;
            }
        }

        // Deleted files leave the list even when a later rewrite failed
        for idx in emptied.into_iter().rev() {
            tables.remove(idx);
        }
        outcome?;

        tracing::debug!(key, tables = rewrites.len(), "Key removed from SSTables");
        Ok(true)
    }

    /// Merge the oldest tables until at most `max_files` remain
    ///
    /// Each round merges the oldest `batch_size` tables (at least two) oldest
    /// → newest so the newest table in the batch wins for shared keys. The
    /// merged file is durable before its sources are deleted. Returns the
    /// number of merge rounds.
    pub fn compact(&self, batch_size: usize, max_files: usize) -> Result<usize> {
        let mut tables = self.tables.write();
        let mut rounds = 0;

        while tables.len() > max_files && tables.len() >= 2 {
            let take = batch_size.clamp(2, tables.len());
            let merged_name = SSTableName::compacted(tables[take - 1].name.timestamp);

            let mut merged = BTreeMap::new();
            for table in &tables[..take] {
                merged.extend(table.open()?.into_entries());
            }

            let merged_table = SSTable::new(&self.data_dir, merged_name);
            sstable::write_atomic(&merged_table.path, &merged)?;

            // Merged file is durable; swap it in for its sources
            let batch: Vec<SSTable> = tables.drain(..take).collect();
            let merged_path = merged_table.path.clone();
            tables.insert(0, merged_table);

            for table in &batch {
                if table.path != merged_path {
                    fs::remove_file(&table.path)?;
                }
            }

            tracing::info!(
                merged = batch.len(),
                entries = merged.len(),
                output = %merged_name,
                "SSTables compacted"
            );

            rounds += 1;
        }

        Ok(rounds)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the number of SSTables
    pub fn count(&self) -> usize {
        self.tables.read().len()
    }

    /// Tables ordered oldest → newest
    pub fn tables(&self) -> Vec<SSTable> {
        self.tables.read().clone()
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Reserve a timestamp strictly greater than any handed out before
    pub fn next_timestamp(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);

        let mut last = self.last_timestamp.lock();
        let next = now.max(*last + 1);
        *last = next;
        next
    }

    /// Remove leftover temp files from interrupted writes
    pub fn remove_temp_files(dir: &Path) -> Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if name.to_str().map(sstable::is_temp_file).unwrap_or(false) {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
