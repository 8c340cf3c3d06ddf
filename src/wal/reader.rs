//! WAL Reader
//!
//! Handles reading records from the WAL file, one line at a time.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{Result, VaultError};

use super::WalEntry;

/// Reads records from the WAL file
pub struct WalReader {
    reader: BufReader<File>,
    line_number: usize,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            line_number: 0,
        })
    }

    /// Read the next record
    ///
    /// Returns `None` at end of file. A corrupt line yields `Some(Err(..))`
    /// and the reader stays positioned on the following line, so callers can
    /// skip it and continue. Blank lines are ignored.
    pub fn next_entry(&mut self) -> Option<Result<WalEntry>> {
        loop {
            let mut raw = Vec::new();
            match self.reader.read_until(b'\n', &mut raw) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(VaultError::Io(e))),
            }
            self.line_number += 1;

            let line = match String::from_utf8(raw) {
                Ok(line) => line,
                Err(_) => {
                    return Some(Err(VaultError::WalCorruption(format!(
                        "line {} is not valid UTF-8",
                        self.line_number
                    ))))
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            return Some(WalEntry::decode(&line));
        }
    }

    /// Line number of the most recently read record (1-based)
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

impl Iterator for WalReader {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry()
    }
}
