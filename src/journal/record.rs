//! Journal record definitions

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, VaultError};

/// Kind of multi-step operation guarded by the journal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalOperation {
    Snapshot,
    SstableFlush,
}

/// Progress of the guarded operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalStatus {
    InProgress,
    Committed,
}

/// The single journal record: `timestamp|KIND|target|STATUS`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalRecord {
    /// Unix millis when the operation began
    pub timestamp: u64,
    pub operation: JournalOperation,
    pub target: PathBuf,
    pub status: JournalStatus,
}

impl JournalRecord {
    pub fn encode(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.timestamp,
            self.operation,
            self.target.display(),
            self.status
        )
    }

    pub fn decode(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let invalid = || VaultError::Storage(format!("invalid journal record: '{}'", raw));

        let (timestamp, rest) = raw.split_once('|').ok_or_else(invalid)?;
        let (operation, rest) = rest.split_once('|').ok_or_else(invalid)?;
        let (target, status) = rest.rsplit_once('|').ok_or_else(invalid)?;

        Ok(Self {
            timestamp: timestamp.parse().map_err(|_| invalid())?,
            operation: operation.parse()?,
            target: PathBuf::from(target),
            status: status.parse()?,
        })
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == JournalStatus::InProgress
    }
}

impl fmt::Display for JournalOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JournalOperation::Snapshot => f.write_str("SNAPSHOT"),
            JournalOperation::SstableFlush => f.write_str("SSTABLE_FLUSH"),
        }
    }
}

impl FromStr for JournalOperation {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SNAPSHOT" => Ok(JournalOperation::Snapshot),
            "SSTABLE_FLUSH" => Ok(JournalOperation::SstableFlush),
            other => Err(VaultError::Storage(format!(
                "unknown journal operation '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for JournalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JournalStatus::InProgress => f.write_str("IN_PROGRESS"),
            JournalStatus::Committed => f.write_str("COMMITTED"),
        }
    }
}

impl FromStr for JournalStatus {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "IN_PROGRESS" => Ok(JournalStatus::InProgress),
            "COMMITTED" => Ok(JournalStatus::Committed),
            other => Err(VaultError::Storage(format!(
                "unknown journal status '{}'",
                other
            ))),
        }
    }
}
