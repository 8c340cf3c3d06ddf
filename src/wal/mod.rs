//! Write-Ahead Log (WAL) Module
//!
//! Provides durability guarantees through append-only logging.
//!
//! ## Responsibilities
//! - Append a record before every MemTable mutation
//! - SHA-256 checksums for corruption detection
//! - Crash recovery and replay, skipping corrupt records individually
//!
//! ## File Format
//! One UTF-8 line per record, pipe-delimited:
//! ```text
//! PUT|user:1|alice|<SHA-256 hex, 64 chars>
//! DELETE|user:2||<SHA-256 hex, 64 chars>
//! ```
//! The checksum covers `op|key|value` (an empty value for deletes).

mod entry;
mod reader;
mod recovery;
mod writer;

pub use entry::{compute_checksum, Operation, WalEntry};
pub use reader::WalReader;
pub use recovery::{RecoveryResult, WalRecovery};
pub use writer::WalWriter;
