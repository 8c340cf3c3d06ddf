//! Store Facade
//!
//! The public operations of the store. Every call validates and normalizes
//! its input, passes admission, then works on the MemTable and the durable
//! tiers.
//!
//! ## Read path
//! MemTable → SSTables newest → oldest
//!
//! ## Write path
//! validate → queue/breaker check → write permit → WAL append → MemTable

use std::collections::BTreeMap;
use std::thread;

use serde::Serialize;

use crate::admission::AdmissionController;
use crate::config::Config;
use crate::error::{Result, VaultError};
use crate::memtable::MemTable;
use crate::storage::Persistence;

/// One page of a range read
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RangePage {
    /// Entries of this page, ascending by key
    pub entries: Vec<(String, String)>,
    /// Distinct matching keys across all tiers
    pub total: usize,
}

/// Point-in-time counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    pub memtable_entries: usize,
    pub sstables: usize,
    pub pending_writes: u64,
    pub cpu_usage: f64,
    pub overload_count: u32,
    pub write_capacity: usize,
    pub read_capacity: usize,
}

/// The storage engine
///
/// ## Concurrency:
/// - `memtable`: RwLock inside, readable without the persistence lock
/// - `persistence`: one Mutex serializes WAL, snapshot, flush and compaction
/// - `admission`: lock-free counters plus the permit pools
/// - All methods use `&self`; share a `Store` with `Arc`
pub struct Store {
    config: Config,
    memtable: MemTable,
    persistence: Persistence,
    admission: AdmissionController,
}

impl Store {
    /// Open (or create) a store and recover its contents
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let (persistence, memtable) = Persistence::open(&config)?;
        let admission = AdmissionController::new(&config);
        admission.set_pending_writes(persistence.pending_writes());

        Ok(Self {
            config,
            memtable,
            persistence,
            admission,
        })
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Insert or overwrite a key
    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        validate_value(value)?;
        self.admission.check_write()?;

        let key = normalize(key);
        let _permit = self.admission.acquire_write()?;
        self.apply_put(key, value.to_string())
    }

    /// Look up a key. `Ok(None)` when absent.
    pub fn read(&self, key: &str) -> Result<Option<String>> {
        require_non_empty("key", key)?;

        let key = normalize(key);
        let _permit = self.admission.acquire_read()?;

        if let Some(value) = self.memtable.get(&key) {
            return Ok(Some(value));
        }
        self.persistence.sstables().get(&key)
    }

    /// Remove a key from every tier
    ///
    /// A key that exists nowhere is a validation error and nothing is logged.
    pub fn delete(&self, key: &str) -> Result<()> {
        require_non_empty("key", key)?;

        let key = normalize(key);
        let _permit = self.admission.acquire_write()?;

        if !self.persistence.log_delete(&self.memtable, &key)? {
            return Err(VaultError::validation(format!("key '{}' not found", key)));
        }
        self.admission
            .set_pending_writes(self.persistence.pending_writes());

        tracing::debug!(key = %key, "Deleted");
        Ok(())
    }

    /// Insert many entries in load-sized chunks
    ///
    /// Every entry is validated before any is applied. Returns the accepted
    /// entries keyed by normalized key.
    pub fn batch_put<I, K, V>(&self, entries: I) -> Result<BTreeMap<String, String>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entries: Vec<(String, String)> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        if entries.is_empty() {
            return Err(VaultError::validation("batch must not be empty"));
        }
        for (key, value) in &entries {
            validate_key(key)?;
            validate_value(value)?;
        }
        if entries.len() > self.config.max_batch_entries {
            return Err(VaultError::overload(format!(
                "batch of {} entries exceeds the limit of {}",
                entries.len(),
                self.config.max_batch_entries
            )));
        }

        let chunk_size = self
            .admission
            .adjusted_batch_size(self.config.max_batch_size);
        let _permit = self.admission.acquire_write()?;

        let mut accepted = BTreeMap::new();
        for (idx, chunk) in entries.chunks(chunk_size).enumerate() {
            if idx > 0 && self.admission.is_under_high_load() {
                thread::sleep(self.config.high_load_pause);
            }

            for (key, value) in chunk {
                self.admission.check_write()?;
                let key = normalize(key);
                self.apply_put(key.clone(), value.clone())?;
                accepted.insert(key, value.clone());
            }
        }

        tracing::debug!(entries = accepted.len(), chunk_size, "Batch applied");
        Ok(accepted)
    }

    /// One page of the entries with `start <= key <= end`
    ///
    /// `page_number` starts at 1. The MemTable shadows every SSTable and newer
    /// SSTables shadow older ones.
    pub fn range_read(
        &self,
        start: &str,
        end: &str,
        page_size: usize,
        page_number: usize,
    ) -> Result<RangePage> {
        require_non_empty("start key", start)?;
        require_non_empty("end key", end)?;
        if page_size == 0 {
            return Err(VaultError::validation("page size must be greater than zero"));
        }
        if page_number == 0 {
            return Err(VaultError::validation("page number must be greater than zero"));
        }

        let start = normalize(start);
        let end = normalize(end);
        if start > end {
            return Err(VaultError::InvalidRange { start, end });
        }

        let _permit = self.admission.acquire_read()?;

        let mut merged: BTreeMap<String, String> =
            self.memtable.range(&start, &end).into_iter().collect();
        for table in self.persistence.sstables().range(&start, &end)? {
            for (key, value) in table {
                merged.entry(key).or_insert(value);
            }
        }

        let total = merged.len();
        let skip = (page_number - 1).saturating_mul(page_size);
        let entries = merged.into_iter().skip(skip).take(page_size).collect();

        Ok(RangePage { entries, total })
    }

    /// Number of entries in the MemTable
    pub fn store_count(&self) -> usize {
        self.memtable.len()
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Merge the MemTable into the snapshot and truncate the WAL
    pub fn save_snapshot(&self) -> Result<usize> {
        let saved = self.persistence.save_snapshot(&self.memtable)?;
        self.admission.set_pending_writes(0);
        Ok(saved)
    }

    /// Move the MemTable into SSTables regardless of its size
    pub fn flush(&self) -> Result<usize> {
        let files = self.persistence.flush(&self.memtable)?;
        self.admission
            .set_pending_writes(self.persistence.pending_writes());
        Ok(files)
    }

    /// Flush once the MemTable holds `max_store_size` entries
    pub fn flush_if_needed(&self) -> Result<usize> {
        if self.memtable.len() < self.config.max_store_size {
            return Ok(0);
        }
        self.flush()
    }

    /// Merge old SSTables until at most `max_sst_files` remain
    pub fn compact(&self) -> Result<usize> {
        self.persistence.compact()
    }

    pub fn sstable_count(&self) -> usize {
        self.persistence.sstable_count()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            memtable_entries: self.memtable.len(),
            sstables: self.persistence.sstable_count(),
            pending_writes: self.persistence.pending_writes(),
            cpu_usage: self.admission.cpu_usage(),
            overload_count: self.admission.overload_count(),
            write_capacity: self.admission.write_permits().capacity(),
            read_capacity: self.admission.read_permits().capacity(),
        }
    }

    /// WAL records since the last snapshot or flush
    pub fn pending_writes(&self) -> u64 {
        self.persistence.pending_writes()
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Final snapshot and WAL sync
    pub fn close(&self) -> Result<()> {
        self.save_snapshot()?;
        self.persistence.sync()?;
        tracing::info!(dir = %self.config.data_dir.display(), "Store closed");
        Ok(())
    }

    fn apply_put(&self, key: String, value: String) -> Result<()> {
        let pending = self.persistence.log_put(&self.memtable, key, value)?;
        self.admission.set_pending_writes(pending);
        Ok(())
    }
}

// =============================================================================
// Validation
// =============================================================================

fn normalize(key: &str) -> String {
    key.to_lowercase()
}

fn require_non_empty(what: &str, raw: &str) -> Result<()> {
    if raw.trim().is_empty() {
        return Err(VaultError::validation(format!("{} must not be empty", what)));
    }
    Ok(())
}

/// Keys end up as WAL and journal fields
fn validate_key(key: &str) -> Result<()> {
    require_non_empty("key", key)?;
    if key.contains(['|', '\n', '\r']) {
        return Err(VaultError::validation(format!(
            "key '{}' must not contain '|' or line breaks",
            key.escape_debug()
        )));
    }
    Ok(())
}

fn validate_value(value: &str) -> Result<()> {
    require_non_empty("value", value)?;
    if value.contains(['\n', '\r']) {
        return Err(VaultError::validation("value must not contain line breaks"));
    }
    Ok(())
}
