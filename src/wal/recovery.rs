//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL into a MemTable.

use std::path::Path;

use crate::error::{Result, VaultError};
use crate::memtable::MemTable;

use super::{Operation, WalEntry, WalReader};

/// Handles WAL replay after a restart
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of records successfully applied
    pub entries_applied: u64,

    /// Number of corrupted records skipped
    pub entries_corrupted: u64,
}

impl WalRecovery {
    /// Replay every valid record into `memtable`
    ///
    /// Corrupt records are logged and skipped individually; the rest of the log
    /// still applies. A missing file is an empty log.
    pub fn replay(path: &Path, memtable: &MemTable) -> Result<RecoveryResult> {
        Self::scan(path, |entry| match entry.operation {
            Operation::Put { key, value } => {
                memtable.put(key, value);
            }
            Operation::Delete { key } => {
                memtable.remove(&key);
            }
        })
    }

    /// Verify integrity of a WAL file without applying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        Self::scan(path, |_| {})
    }

    fn scan<F>(path: &Path, mut apply: F) -> Result<RecoveryResult>
    where
        F: FnMut(WalEntry),
    {
        let mut result = RecoveryResult::default();

        if !path.exists() {
            return Ok(result);
        }

        let mut reader = WalReader::open(path)?;
        while let Some(next) = reader.next_entry() {
            match next {
                Ok(entry) => {
                    apply(entry);
                    result.entries_applied += 1;
                }
                Err(VaultError::WalCorruption(reason)) => {
                    tracing::warn!(
                        line = reader.line_number(),
                        %reason,
                        "Skipping corrupt WAL record"
                    );
                    result.entries_corrupted += 1;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(result)
    }
}
