//! Error types for vaultkv
//!
//! Provides a unified error type for all operations. Variants are grouped by
//! how the caller is expected to react:
//! - validation errors are final, retrying the same input fails again
//! - overload errors are retryable once the system has drained
//! - storage errors (I/O, serialization, corruption) are internal

use thiserror::Error;

/// Result type alias using VaultError
pub type Result<T> = std::result::Result<T, VaultError>;

/// Unified error type for vaultkv operations
#[derive(Debug, Error)]
pub enum VaultError {
    // -------------------------------------------------------------------------
    // Caller Errors
    // -------------------------------------------------------------------------
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid range: start key '{start}' is greater than end key '{end}'")]
    InvalidRange { start: String, end: String },

    // -------------------------------------------------------------------------
    // Backpressure Errors
    // -------------------------------------------------------------------------
    #[error("Overloaded: {0}")]
    Overload(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl VaultError {
    /// True for errors the caller may retry later (backpressure)
    pub fn is_retryable(&self) -> bool {
        matches!(self, VaultError::Overload(_))
    }

    /// True for errors caused by malformed input
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            VaultError::Validation(_) | VaultError::InvalidRange { .. }
        )
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        VaultError::Validation(msg.into())
    }

    pub(crate) fn overload(msg: impl Into<String>) -> Self {
        VaultError::Overload(msg.into())
    }
}
