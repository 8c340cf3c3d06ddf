//! Tests for SSTable files
//!
//! These tests verify:
//! - File naming and ordering by (timestamp, rank)
//! - Writing via SSTableBuilder (sorted keys, atomic replace)
//! - Reading, point lookups and inclusive range scans

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tempfile::TempDir;
use vaultkv::storage::{SSTableBuilder, SSTableKind, SSTableName, SSTableReader};
use vaultkv::VaultError;

// =============================================================================
// Helper Functions
// =============================================================================

fn build_table(path: &Path, entries: &[(&str, &str)]) {
    let mut builder = SSTableBuilder::new(path);
    for (key, value) in entries {
        builder.add(key, value).unwrap();
    }
    builder.finish().unwrap();
}

// =============================================================================
// Naming Tests
// =============================================================================

#[test]
fn test_flush_name_format() {
    let name = SSTableName::flush(1234, 2);
    assert_eq!(name.file_name(), "sst_00000000000000001234_0002.json");
}

#[test]
fn test_compacted_name_format() {
    let name = SSTableName::compacted(1234);
    assert_eq!(name.file_name(), "sst_00000000000000001234_compacted.json");
}

#[test]
fn test_parse_names() {
    assert_eq!(
        SSTableName::parse("sst_00000000000000001234_0002.json"),
        Some(SSTableName::flush(1234, 2))
    );
    assert_eq!(
        SSTableName::parse("sst_00000000000000001234_compacted.json"),
        Some(SSTableName::compacted(1234))
    );

    let legacy = SSTableName::parse("sst_1234.json").unwrap();
    assert_eq!(legacy.timestamp, 1234);
    assert_eq!(legacy.kind, SSTableKind::Flush { seq: 0 });
}

#[test]
fn test_parse_rejects_other_files() {
    for name in [
        "data_store.json",
        "sst_123.json.tmp",
        "sst_abc_0001.json",
        "sst_1_x.json",
        "other_1.json",
    ] {
        assert_eq!(SSTableName::parse(name), None, "{}", name);
    }
}

#[test]
fn test_ordering() {
    let mut names = vec![
        SSTableName::flush(20, 1),
        SSTableName::compacted(20),
        SSTableName::flush(10, 2),
        SSTableName::flush(10, 1),
        SSTableName::flush(30, 0),
    ];
    names.sort();

    assert_eq!(
        names,
        vec![
            SSTableName::flush(10, 1),
            SSTableName::flush(10, 2),
            SSTableName::compacted(20),
            SSTableName::flush(20, 1),
            SSTableName::flush(30, 0),
        ]
    );
}

// =============================================================================
// Builder Tests
// =============================================================================

#[test]
fn test_builder_writes_json_object() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("sst_1_0001.json");

    build_table(&path, &[("apple", "1"), ("banana", "2")]);

    let raw = fs::read_to_string(&path).unwrap();
    let parsed: BTreeMap<String, String> = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed["banana"], "2");
}

#[test]
fn test_builder_leaves_no_temp_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("sst_1_0001.json");

    build_table(&path, &[("a", "1")]);

    let names: Vec<String> = fs::read_dir(temp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["sst_1_0001.json"]);
}

#[test]
fn test_builder_rejects_unsorted_keys() {
    let temp = TempDir::new().unwrap();
    let mut builder = SSTableBuilder::new(&temp.path().join("t.json"));

    builder.add("b", "1").unwrap();
    let result = builder.add("a", "2");

    assert!(matches!(result, Err(VaultError::Storage(_))));
    assert_eq!(builder.entry_count(), 1);
}

#[test]
fn test_builder_rejects_duplicate_keys() {
    let temp = TempDir::new().unwrap();
    let mut builder = SSTableBuilder::new(&temp.path().join("t.json"));

    builder.add("a", "1").unwrap();
    assert!(builder.add("a", "2").is_err());
}

// =============================================================================
// Reader Tests
// =============================================================================

#[test]
fn test_reader_lookups() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("t.json");
    build_table(&path, &[("apple", "1"), ("banana", "2"), ("cherry", "3")]);

    let reader = SSTableReader::open(&path).unwrap();

    assert_eq!(reader.get("banana"), Some("2"));
    assert_eq!(reader.get("durian"), None);
    assert!(reader.contains("apple"));
    assert_eq!(reader.entry_count(), 3);
    assert_eq!(reader.min_key(), Some("apple"));
    assert_eq!(reader.max_key(), Some("cherry"));
}

#[test]
fn test_reader_range() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("t.json");
    build_table(&path, &[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")]);

    let reader = SSTableReader::open(&path).unwrap();

    let keys: Vec<&String> = reader.range("b", "c").map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["b", "c"]);

    assert_eq!(reader.range("bb", "zz").count(), 2);
    assert_eq!(reader.range("d", "a").count(), 0);
}

#[test]
fn test_reader_rejects_corrupt_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("t.json");
    fs::write(&path, "{\"a\": ").unwrap();

    let result = SSTableReader::open(&path);
    assert!(matches!(result, Err(VaultError::Serialization(_))));
}
