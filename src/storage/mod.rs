//! Storage Module
//!
//! Durable tiers behind the MemTable.
//!
//! ## Components
//! - `snapshot`: point-in-time JSON copy of the store, replaced atomically
//! - `sstable`: immutable sorted JSON tables written by MemTable flushes
//! - `manager`: the ordered set of SSTables (reads, flush, delete, compaction)
//! - `persistence`: the single critical section coordinating WAL, journal,
//!   snapshot and SSTables
//!
//! ## Layout
//! ```text
//! {data_dir}/
//!   ├── data_store.json        snapshot
//!   ├── data_store.tmp         snapshot being written
//!   ├── data_store.log         write-ahead log
//!   ├── data_store.journal     crash-recovery journal
//!   └── sst_*.json             SSTables, newest shadows oldest
//! ```

mod manager;
mod persistence;
mod snapshot;
pub mod sstable;

pub use manager::SSTableManager;
pub use persistence::{Persistence, JOURNAL_FILE, SNAPSHOT_FILE, SNAPSHOT_TEMP_FILE, WAL_FILE};
pub use snapshot::{retry_transient, SnapshotManager};
pub use sstable::{SSTable, SSTableBuilder, SSTableKind, SSTableName, SSTableReader};
