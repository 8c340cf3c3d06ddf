//! WAL Entry definitions
//!
//! Defines the structure of individual WAL records and their line encoding.

use sha2::{Digest, Sha256};

use crate::error::{Result, VaultError};

const PUT_TAG: &str = "PUT";
const DELETE_TAG: &str = "DELETE";

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: String, value: String },

    /// Delete a key
    Delete { key: String },
}

impl Operation {
    pub fn key(&self) -> &str {
        match self {
            Operation::Put { key, .. } | Operation::Delete { key } => key,
        }
    }

    fn tag(&self) -> &'static str {
        match self {
            Operation::Put { .. } => PUT_TAG,
            Operation::Delete { .. } => DELETE_TAG,
        }
    }

    fn value(&self) -> &str {
        match self {
            Operation::Put { value, .. } => value,
            Operation::Delete { .. } => "",
        }
    }

    /// The checksummed payload: `op|key|value`
    fn payload(&self) -> String {
        format!("{}|{}|{}", self.tag(), self.key(), self.value())
    }
}

/// A single record in the WAL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalEntry {
    /// The operation to perform
    pub operation: Operation,

    /// Uppercase hex SHA-256 of the payload
    pub checksum: String,
}

impl WalEntry {
    /// Create an entry, computing its checksum
    pub fn new(operation: Operation) -> Self {
        let checksum = compute_checksum(&operation.payload());
        Self {
            operation,
            checksum,
        }
    }

    /// Encode as a single line (without the trailing newline)
    pub fn encode(&self) -> String {
        format!("{}|{}", self.operation.payload(), self.checksum)
    }

    /// Parse a line and verify its checksum
    ///
    /// The value may itself contain `|`: the operation is the first field, the
    /// key the second, the checksum the last and the value everything between.
    pub fn decode(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);

        let (body, stored) = line
            .rsplit_once('|')
            .ok_or_else(|| malformed("missing checksum", line))?;
        let (tag, rest) = body
            .split_once('|')
            .ok_or_else(|| malformed("missing key", line))?;
        let (key, value) = rest
            .split_once('|')
            .ok_or_else(|| malformed("missing value field", line))?;

        let operation = match tag {
            PUT_TAG => Operation::Put {
                key: key.to_string(),
                value: value.to_string(),
            },
            DELETE_TAG => Operation::Delete {
                key: key.to_string(),
            },
            other => {
                return Err(VaultError::WalCorruption(format!(
                    "unknown operation '{}'",
                    other
                )))
            }
        };

        let computed = compute_checksum(body);
        if !computed.eq_ignore_ascii_case(stored) {
            return Err(VaultError::WalCorruption(format!(
                "checksum mismatch for key '{}': stored {}, computed {}",
                key, stored, computed
            )));
        }

        Ok(Self {
            operation,
            checksum: stored.to_string(),
        })
    }
}

/// Uppercase hex SHA-256 digest of `input`
pub fn compute_checksum(input: &str) -> String {
    hex::encode_upper(Sha256::digest(input.as_bytes()))
}

fn malformed(reason: &str, line: &str) -> VaultError {
    VaultError::WalCorruption(format!("{}: '{}'", reason, line))
}
