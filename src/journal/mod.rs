//! Journal Module
//!
//! Single-slot crash-recovery record guarding multi-step operations
//! (snapshot replace, SSTable flush).
//!
//! ## Protocol
//! 1. `begin()` overwrites the slot with an IN_PROGRESS record (fsynced)
//! 2. the guarded operation runs
//! 3. `commit()` flips the record to COMMITTED
//!
//! An IN_PROGRESS record found at startup means the operation was
//! interrupted; the storage layer finishes or discards it before loading.

mod record;

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::Result;

pub use record::{JournalOperation, JournalRecord, JournalStatus};

/// Handle on the journal file
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn open(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Record the start of an operation targeting `target`
    pub fn begin(&self, operation: JournalOperation, target: &Path) -> Result<JournalRecord> {
        let record = JournalRecord {
            timestamp: now_millis(),
            operation,
            target: target.to_path_buf(),
            status: JournalStatus::InProgress,
        };
        self.write(&record)?;

        tracing::debug!(%operation, target = %target.display(), "Journal entry started");
        Ok(record)
    }

    /// Mark the current record as committed (no-op without a record)
    pub fn commit(&self) -> Result<()> {
        if let Some(mut record) = self.read()? {
            record.status = JournalStatus::Committed;
            self.write(&record)?;
        }
        Ok(())
    }

    /// Read the current record
    ///
    /// A missing or empty journal is `None`; so is an unreadable record, which
    /// is logged since there is nothing it could be recovered into.
    pub fn read(&self) -> Result<Option<JournalRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(None);
        }

        match JournalRecord::decode(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable journal");
                Ok(None)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, record: &JournalRecord) -> Result<()> {
        let mut file = File::create(&self.path)?;
        file.write_all(record.encode().as_bytes())?;
        file.sync_all()?;
        Ok(())
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
