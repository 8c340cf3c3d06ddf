//! Persistence
//!
//! Owns every file-backed component (WAL, journal, snapshot, SSTables) and
//! serializes all persistence-affecting operations through one mutex, so the
//! MemTable always changes in WAL order.
//!
//! ## Startup
//! 1. Finish or discard any journaled operation that was interrupted
//! 2. Load the snapshot into a fresh MemTable
//! 3. Replay the WAL on top of it
//!
//! ## Snapshot save
//! journal IN_PROGRESS → merge + atomic replace → journal COMMITTED →
//! truncate WAL → clear pending deletes
//!
//! ## Flush
//! journal IN_PROGRESS → write SSTables → rewrite snapshot without the
//! flushed keys → truncate WAL → clear MemTable → journal COMMITTED

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::Result;
use crate::journal::{Journal, JournalOperation, JournalRecord};
use crate::memtable::MemTable;
use crate::wal::{Operation, RecoveryResult, WalRecovery, WalWriter};

use super::manager::SSTableManager;
use super::snapshot::SnapshotManager;

pub const SNAPSHOT_FILE: &str = "data_store.json";
pub const SNAPSHOT_TEMP_FILE: &str = "data_store.tmp";
pub const WAL_FILE: &str = "data_store.log";
pub const JOURNAL_FILE: &str = "data_store.journal";

/// State only touched while holding the persistence lock
struct Inner {
    wal: WalWriter,
    journal: Journal,
    snapshot: SnapshotManager,
    /// Keys deleted since the last snapshot save
    pending_deletes: BTreeSet<String>,
}

/// The single writer over all on-disk state
pub struct Persistence {
    inner: Mutex<Inner>,
    sstables: SSTableManager,
    data_dir: PathBuf,
    /// WAL records since the last snapshot or flush
    pending_writes: AtomicU64,

    max_entries: usize,
    max_entries_per_sst: usize,
    max_sst_files: usize,
    compaction_batch_size: usize,
}

impl Persistence {
    /// Open the data directory and rebuild the MemTable from disk
    pub fn open(config: &Config) -> Result<(Self, MemTable)> {
        let dir = &config.data_dir;
        fs::create_dir_all(dir)?;

        let journal = Journal::open(&dir.join(JOURNAL_FILE));
        let snapshot = SnapshotManager::new(
            &dir.join(SNAPSHOT_FILE),
            &dir.join(SNAPSHOT_TEMP_FILE),
            config.snapshot_retry_attempts,
            config.snapshot_retry_delay,
        );

        recover_from_journal(dir, &journal, &snapshot)?;

        let memtable = MemTable::from_entries(snapshot.load());
        let loaded = memtable.len();

        let wal_path = dir.join(WAL_FILE);
        let RecoveryResult {
            entries_applied,
            entries_corrupted,
        } = WalRecovery::replay(&wal_path, &memtable)?;

        let mut wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;
        wal.set_record_count(entries_applied);

        let sstables = SSTableManager::open(dir)?;

        tracing::info!(
            dir = %dir.display(),
            snapshot_entries = loaded,
            wal_applied = entries_applied,
            wal_corrupted = entries_corrupted,
            sstables = sstables.count(),
            "Store recovered"
        );

        let persistence = Self {
            inner: Mutex::new(Inner {
                wal,
                journal,
                snapshot,
                pending_deletes: BTreeSet::new(),
            }),
            sstables,
            data_dir: dir.to_path_buf(),
            pending_writes: AtomicU64::new(entries_applied),
            max_entries: config.max_entries,
            max_entries_per_sst: config.max_entries_per_sst,
            max_sst_files: config.max_sst_files,
            compaction_batch_size: config.compaction_batch_size,
        };

        Ok((persistence, memtable))
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Log a PUT and apply it. Returns the pending write count.
    pub fn log_put(&self, memtable: &MemTable, key: String, value: String) -> Result<u64> {
        let mut inner = self.inner.lock();

        let count = inner.wal.append(Operation::Put {
            key: key.clone(),
            value: value.clone(),
        })?;
        memtable.put(key, value);

        self.pending_writes.store(count, Ordering::Release);
        Ok(count)
    }

    /// Delete `key` from every tier
    ///
    /// Returns `false` without logging anything when the key exists nowhere.
    /// SSTables are rewritten first; if that fails, nothing is logged and the
    /// MemTable is untouched.
    pub fn log_delete(&self, memtable: &MemTable, key: &str) -> Result<bool> {
        let mut inner = self.inner.lock();

        let in_sstables = self.sstables.contains(key)?;
        if !memtable.contains(key) && !in_sstables {
            return Ok(false);
        }
        if in_sstables {
            self.sstables.remove_key(key)?;
        }

        let count = inner.wal.append(Operation::Delete {
            key: key.to_string(),
        })?;
        memtable.remove(key);
        inner.pending_deletes.insert(key.to_string());

        self.pending_writes.store(count, Ordering::Release);
        Ok(true)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Merge the MemTable into the snapshot and truncate the WAL
    pub fn save_snapshot(&self, memtable: &MemTable) -> Result<usize> {
        let mut inner = self.inner.lock();

        let temp = inner.snapshot.temp_path().to_path_buf();
        inner.journal.begin(JournalOperation::Snapshot, &temp)?;

        let existing = inner.snapshot.load();
        let merged = SnapshotManager::merge(
            existing,
            &inner.pending_deletes,
            &memtable.entries(),
            self.max_entries,
        );
        inner.snapshot.write(&merged)?;
        inner.journal.commit()?;

        inner.wal.truncate()?;
        inner.pending_deletes.clear();
        self.pending_writes.store(0, Ordering::Release);

        tracing::info!(entries = merged.len(), "Snapshot saved");
        Ok(merged.len())
    }

    /// Move the whole MemTable into new SSTables
    ///
    /// Returns the number of files written (0 for an empty MemTable).
    pub fn flush(&self, memtable: &MemTable) -> Result<usize> {
        let mut inner = self.inner.lock();

        let entries = memtable.entries();
        if entries.is_empty() {
            return Ok(0);
        }

        let timestamp = self.sstables.next_timestamp();
        let target = self.data_dir.join(format!("sst_{:020}", timestamp));
        inner.journal.begin(JournalOperation::SstableFlush, &target)?;

        let written = self
            .sstables
            .flush_at(timestamp, &entries, self.max_entries_per_sst)?;

        // Flushed keys now live in SSTables; keep the snapshot disjoint
        let mut remaining = inner.snapshot.load();
        remaining.retain(|key, _| !entries.contains_key(key) && !inner.pending_deletes.contains(key));
        inner.snapshot.write(&remaining)?;

        inner.wal.truncate()?;
        memtable.clear();
        inner.pending_deletes.clear();
        self.pending_writes.store(0, Ordering::Release);

        inner.journal.commit()?;

        tracing::info!(files = written.len(), entries = entries.len(), "MemTable flushed");
        Ok(written.len())
    }

    /// Compact SSTables down to the configured file count
    pub fn compact(&self) -> Result<usize> {
        let _inner = self.inner.lock();
        self.sstables
            .compact(self.compaction_batch_size, self.max_sst_files)
    }

    /// fsync the WAL
    pub fn sync(&self) -> Result<()> {
        self.inner.lock().wal.sync()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn sstables(&self) -> &SSTableManager {
        &self.sstables
    }

    pub fn sstable_count(&self) -> usize {
        self.sstables.count()
    }

    /// WAL records since the last snapshot or flush
    pub fn pending_writes(&self) -> u64 {
        self.pending_writes.load(Ordering::Acquire)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

/// Finish or roll back whatever the journal says was interrupted
fn recover_from_journal(dir: &Path, journal: &Journal, snapshot: &SnapshotManager) -> Result<()> {
    let record: JournalRecord = match journal.read()? {
        Some(record) if record.is_in_progress() => record,
        _ => return Ok(()),
    };

    tracing::info!(
        operation = %record.operation,
        target = %record.target.display(),
        "Recovering interrupted operation"
    );

    match record.operation {
        JournalOperation::Snapshot => {
            snapshot.adopt_temp()?;
        }
        JournalOperation::SstableFlush => {
            // Complete tables stay; their data is rebuilt from snapshot + WAL too
            let removed = SSTableManager::remove_temp_files(dir)?;
            if snapshot.temp_path().exists() {
                fs::remove_file(snapshot.temp_path())?;
            }
            tracing::info!(removed, "Removed partial SSTable files");
        }
    }

    journal.commit()
}
