//! SSTable Builder
//!
//! Writes sorted key-value entries to a new SSTable file.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, VaultError};

use super::temp_path_for;

/// Builder for creating SSTables from sorted entries
///
/// Entries are staged in memory and written on `finish()` to a temp file that
/// is then renamed over the destination, so a table on disk is always complete.
pub struct SSTableBuilder {
    /// Output file path
    path: PathBuf,
    entries: BTreeMap<String, String>,
    last_key: Option<String>,
}

impl SSTableBuilder {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            entries: BTreeMap::new(),
            last_key: None,
        }
    }

    /// Add a key-value pair (must be called in sorted key order)
    pub fn add(&mut self, key: &str, value: &str) -> Result<()> {
        if let Some(last) = &self.last_key {
            if key <= last.as_str() {
                return Err(VaultError::Storage(format!(
                    "SSTable keys must be strictly ascending: '{}' after '{}'",
                    key, last
                )));
            }
        }

        self.last_key = Some(key.to_string());
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Write the table and return its entry count
    pub fn finish(self) -> Result<usize> {
        write_atomic(&self.path, &self.entries)?;
        Ok(self.entries.len())
    }
}

/// Write `entries` to `path` via temp file + rename
pub(crate) fn write_atomic(path: &Path, entries: &BTreeMap<String, String>) -> Result<()> {
    let temp = temp_path_for(path);

    let result = (|| -> Result<()> {
        let mut writer = BufWriter::new(File::create(&temp)?);
        serde_json::to_writer(&mut writer, entries)?;
        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|e| VaultError::Storage(format!("Failed to flush SSTable: {}", e)))?;
        file.sync_all()?;
        fs::rename(&temp, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}
