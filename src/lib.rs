//! # vaultkv
//!
//! An embedded key-value storage engine with:
//! - Write-Ahead Logging (WAL) with SHA-256 checked records
//! - Crash-safe snapshots guarded by a recovery journal
//! - Immutable sorted tables (SSTables) with background compaction
//! - CPU-aware admission control and a two-tier priority scheduler
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Vault (runtime)                             │
//! │     Priority Scheduler  ·  Background Workers                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                   Store Facade                               │
//! │        validate · normalize · admission control              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ Persistence │─────────▶│  MemTable   │
//!   │ WAL·Journal │          │  (RwLock)   │
//!   └──────┬──────┘          └─────────────┘
//!          │
//!          ▼
//!   ┌─────────────┐  ┌─────────────┐
//!   │  Snapshot   │  │  SSTables   │
//!   │   (JSON)    │  │   (JSON)    │
//!   └─────────────┘  └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod journal;
pub mod memtable;
pub mod storage;
pub mod wal;

pub mod admission;
pub mod background;
pub mod scheduler;
pub mod store;
pub mod vault;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use admission::{AdmissionController, LoadSampler, ProcStatSampler, StaticLoad};
pub use config::{Config, WalSyncStrategy};
pub use error::{Result, VaultError};
pub use scheduler::{Priority, PriorityScheduler};
pub use store::{RangePage, Store, StoreStats};
pub use vault::Vault;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of vaultkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
