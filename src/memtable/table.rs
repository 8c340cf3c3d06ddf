//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;

/// In-memory table for recent writes
pub struct MemTable {
    data: RwLock<BTreeMap<String, String>>,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a MemTable pre-populated with entries (startup load)
    pub fn from_entries(entries: BTreeMap<String, String>) -> Self {
        Self {
            data: RwLock::new(entries),
        }
    }

    /// Get a value by key (read lock)
    pub fn get(&self, key: &str) -> Option<String> {
        self.data.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    /// Insert or overwrite a key, returning the previous value
    pub fn put(&self, key: String, value: String) -> Option<String> {
        self.data.write().insert(key, value)
    }

    /// Remove a key, returning its value if it was present
    pub fn remove(&self, key: &str) -> Option<String> {
        self.data.write().remove(key)
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Entries with `start <= key <= end`, in ascending key order
    pub fn range(&self, start: &str, end: &str) -> Vec<(String, String)> {
        if start > end {
            return Vec::new();
        }

        self.data
            .read()
            .range::<str, _>((Bound::Included(start), Bound::Included(end)))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Copy of all entries in sorted key order (for flush and snapshot)
    pub fn entries(&self) -> BTreeMap<String, String> {
        self.data.read().clone()
    }

    /// Clear all entries (after successful flush)
    pub fn clear(&self) {
        self.data.write().clear();
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
