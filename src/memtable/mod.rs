//! MemTable Module
//!
//! In-memory data structure for recent writes.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Safe concurrent access (many readers, one writer at a time)
//! - Ordered iteration for SSTable creation and range scans
//!
//! ## Data Structure Choice
//! BTreeMap wrapped in a parking_lot RwLock:
//! - Ordered keys (required for SSTable generation and range reads)
//! - Deletes remove the key outright; shadowing of older SSTable values is
//!   handled by rewriting those files, so no tombstones are kept here

mod table;

pub use table::MemTable;
