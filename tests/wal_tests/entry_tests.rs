//! Tests for WAL Entry encoding
//!
//! These tests verify:
//! - Line format `op|key|value|CHECKSUM`
//! - Checksum is uppercase hex SHA-256 of `op|key|value`
//! - Decoding values that contain `|`
//! - Corruption detection (checksum mismatch, malformed lines)

use vaultkv::wal::{compute_checksum, Operation, WalEntry};
use vaultkv::VaultError;

fn put(key: &str, value: &str) -> Operation {
    Operation::Put {
        key: key.into(),
        value: value.into(),
    }
}

// =============================================================================
// Encoding Tests
// =============================================================================

#[test]
fn test_encode_put() {
    let entry = WalEntry::new(put("user:1", "alice"));
    let expected = format!("PUT|user:1|alice|{}", compute_checksum("PUT|user:1|alice"));

    assert_eq!(entry.encode(), expected);
}

#[test]
fn test_encode_delete_has_empty_value() {
    let entry = WalEntry::new(Operation::Delete { key: "user:1".into() });
    let expected = format!("DELETE|user:1||{}", compute_checksum("DELETE|user:1|"));

    assert_eq!(entry.encode(), expected);
}

#[test]
fn test_checksum_is_uppercase_sha256() {
    // SHA-256("abc")
    assert_eq!(
        compute_checksum("abc"),
        "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD"
    );
}

// =============================================================================
// Decoding Tests
// =============================================================================

#[test]
fn test_decode_roundtrip() {
    let entry = WalEntry::new(put("key", "value"));
    let decoded = WalEntry::decode(&entry.encode()).unwrap();
    assert_eq!(decoded, entry);
}

#[test]
fn test_decode_value_with_pipes() {
    let entry = WalEntry::new(put("key", "a|b|c"));
    let decoded = WalEntry::decode(&entry.encode()).unwrap();

    assert_eq!(decoded.operation, put("key", "a|b|c"));
}

#[test]
fn test_decode_accepts_lowercase_checksum() {
    let line = format!("PUT|k|v|{}", compute_checksum("PUT|k|v").to_lowercase());
    let decoded = WalEntry::decode(&line).unwrap();

    assert_eq!(decoded.operation, put("k", "v"));
}

#[test]
fn test_decode_strips_line_ending() {
    let line = format!("{}\r\n", WalEntry::new(put("k", "v")).encode());
    assert!(WalEntry::decode(&line).is_ok());
}

#[test]
fn test_decode_checksum_mismatch() {
    let line = WalEntry::new(put("key", "value")).encode();
    let tampered = line.replacen("value", "valuf", 1);

    let result = WalEntry::decode(&tampered);
    assert!(matches!(result, Err(VaultError::WalCorruption(_))));
}

#[test]
fn test_decode_unknown_operation() {
    let line = format!("MERGE|k|v|{}", compute_checksum("MERGE|k|v"));
    let result = WalEntry::decode(&line);
    assert!(matches!(result, Err(VaultError::WalCorruption(_))));
}

#[test]
fn test_decode_malformed_lines() {
    for line in ["", "PUT", "PUT|key", "garbage without separators"] {
        let result = WalEntry::decode(line);
        assert!(
            matches!(result, Err(VaultError::WalCorruption(_))),
            "expected corruption for {:?}",
            line
        );
    }
}

#[test]
fn test_operation_key() {
    assert_eq!(put("a", "b").key(), "a");
    assert_eq!(Operation::Delete { key: "c".into() }.key(), "c");
}
