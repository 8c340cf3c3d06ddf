//! SSTable Reader
//!
//! Loads an SSTable file whole and answers lookups from memory.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::ops::Bound;
use std::path::Path;

use crate::error::Result;

/// An SSTable loaded into memory
pub struct SSTableReader {
    entries: BTreeMap<String, String>,
}

impl SSTableReader {
    /// Open and parse an SSTable file
    pub fn open(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let entries = serde_json::from_reader(reader)?;
        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Entries with `start <= key <= end`, ascending
    pub fn range<'a>(
        &'a self,
        start: &'a str,
        end: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a String)> + 'a {
        let bounds = if start <= end {
            Some((Bound::Included(start), Bound::Included(end)))
        } else {
            None
        };

        bounds
            .into_iter()
            .flat_map(move |b| self.entries.range::<str, _>(b))
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn min_key(&self) -> Option<&str> {
        self.entries.keys().next().map(String::as_str)
    }

    pub fn max_key(&self) -> Option<&str> {
        self.entries.keys().next_back().map(String::as_str)
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    pub fn into_entries(self) -> BTreeMap<String, String> {
        self.entries
    }
}
