//! SSTable Module
//!
//! Sorted String Table - immutable on-disk sorted key-value storage.
//!
//! ## File Format
//! A JSON object whose keys are written in ascending order:
//! ```text
//! {"apple":"1","banana":"2","cherry":"3"}
//! ```
//! Files are scanned whole; there is no per-file index.
//!
//! ## Naming
//! ```text
//! sst_<timestamp:020>_<seq:04>.json      flush output (seq starts at 1)
//! sst_<timestamp:020>_compacted.json     compaction output
//! sst_<timestamp>.json                   legacy single-file flush
//! ```
//! Files order by `(timestamp, rank)`. A compacted file takes the timestamp of
//! the newest file it merged and ranks before flush files of that timestamp.

mod builder;
mod reader;

use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

pub use builder::SSTableBuilder;
pub(crate) use builder::write_atomic;
pub use reader::SSTableReader;

pub(crate) const FILE_PREFIX: &str = "sst_";
pub(crate) const FILE_EXTENSION: &str = ".json";
pub(crate) const TEMP_EXTENSION: &str = ".json.tmp";
const COMPACTED_SUFFIX: &str = "compacted";

// =============================================================================
// SSTable Name
// =============================================================================

/// What produced an SSTable file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SSTableKind {
    /// Part `seq` of a flush (0 for legacy names without a suffix)
    Flush { seq: u32 },
    /// Output of a compaction
    Compacted,
}

/// Parsed SSTable file name, ordered oldest → newest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SSTableName {
    pub timestamp: u64,
    pub kind: SSTableKind,
}

impl SSTableName {
    pub fn flush(timestamp: u64, seq: u32) -> Self {
        Self {
            timestamp,
            kind: SSTableKind::Flush { seq },
        }
    }

    pub fn compacted(timestamp: u64) -> Self {
        Self {
            timestamp,
            kind: SSTableKind::Compacted,
        }
    }

    /// Parse a file name such as `sst_00000000000000000042_0001.json`
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name
            .strip_prefix(FILE_PREFIX)?
            .strip_suffix(FILE_EXTENSION)?;

        match stem.split_once('_') {
            None => Some(Self::flush(stem.parse().ok()?, 0)),
            Some((ts, COMPACTED_SUFFIX)) => Some(Self::compacted(ts.parse().ok()?)),
            Some((ts, seq)) => Some(Self::flush(ts.parse().ok()?, seq.parse().ok()?)),
        }
    }

    /// Parse the file name component of `path`
    pub fn from_path(path: &Path) -> Option<Self> {
        Self::parse(path.file_name()?.to_str()?)
    }

    pub fn file_name(&self) -> String {
        match self.kind {
            SSTableKind::Flush { seq: 0 } => {
                format!("{}{:020}{}", FILE_PREFIX, self.timestamp, FILE_EXTENSION)
            }
            SSTableKind::Flush { seq } => format!(
                "{}{:020}_{:04}{}",
                FILE_PREFIX, self.timestamp, seq, FILE_EXTENSION
            ),
            SSTableKind::Compacted => format!(
                "{}{:020}_{}{}",
                FILE_PREFIX, self.timestamp, COMPACTED_SUFFIX, FILE_EXTENSION
            ),
        }
    }

    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }

    fn rank(&self) -> u64 {
        match self.kind {
            SSTableKind::Compacted => 0,
            SSTableKind::Flush { seq } => u64::from(seq) + 1,
        }
    }
}

impl Ord for SSTableName {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.timestamp, self.rank()).cmp(&(other.timestamp, other.rank()))
    }
}

impl PartialOrd for SSTableName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SSTableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

// =============================================================================
// SSTable Handle
// =============================================================================

/// A table on disk: its name and location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SSTable {
    pub name: SSTableName,
    pub path: PathBuf,
}

impl SSTable {
    pub fn new(dir: &Path, name: SSTableName) -> Self {
        Self {
            path: name.path_in(dir),
            name,
        }
    }

    /// Load the table into memory
    pub fn open(&self) -> crate::Result<SSTableReader> {
        SSTableReader::open(&self.path)
    }
}

/// Temporary path used while writing `path`
pub(crate) fn temp_path_for(path: &Path) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(".tmp");
    PathBuf::from(raw)
}

/// True for leftover SSTable temp files
pub(crate) fn is_temp_file(file_name: &str) -> bool {
    file_name.starts_with(FILE_PREFIX) && file_name.ends_with(TEMP_EXTENSION)
}
