//! Tests for snapshots and journal recovery
//!
//! These tests verify:
//! - Snapshot load (missing, corrupt, valid)
//! - Merge semantics (deletes dropped, MemTable wins, oldest evicted)
//! - Atomic write via temp file + rename
//! - Retry of transient I/O failures
//! - Startup recovery from an interrupted snapshot or flush

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use vaultkv::journal::{Journal, JournalOperation, JournalStatus};
use vaultkv::storage::{retry_transient, SnapshotManager, JOURNAL_FILE, SNAPSHOT_FILE, SNAPSHOT_TEMP_FILE};
use vaultkv::{Config, Store, VaultError};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().to_path_buf();
    (temp_dir, path)
}

fn manager(dir: &Path) -> SnapshotManager {
    SnapshotManager::new(
        &dir.join(SNAPSHOT_FILE),
        &dir.join(SNAPSHOT_TEMP_FILE),
        3,
        Duration::from_millis(10),
    )
}

fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn open_store(dir: &Path) -> Store {
    Store::open(Config::builder().data_dir(dir).build()).unwrap()
}

// =============================================================================
// Load / Write Tests
// =============================================================================

#[test]
fn test_load_missing_snapshot() {
    let (_temp, dir) = setup();
    assert!(manager(&dir).load().is_empty());
}

#[test]
fn test_load_corrupt_snapshot_is_empty() {
    let (_temp, dir) = setup();
    fs::write(dir.join(SNAPSHOT_FILE), "{\"a\": \"1\"").unwrap();

    assert!(manager(&dir).load().is_empty());
}

#[test]
fn test_write_then_load() {
    let (_temp, dir) = setup();
    let snapshots = manager(&dir);
    let data = map(&[("a", "1"), ("b", "2")]);

    snapshots.write(&data).unwrap();

    assert_eq!(snapshots.load(), data);
    assert!(!dir.join(SNAPSHOT_TEMP_FILE).exists());
}

#[test]
fn test_write_replaces_previous() {
    let (_temp, dir) = setup();
    let snapshots = manager(&dir);

    snapshots.write(&map(&[("a", "1")])).unwrap();
    snapshots.write(&map(&[("b", "2")])).unwrap();

    assert_eq!(snapshots.load(), map(&[("b", "2")]));
}

#[test]
fn test_snapshot_is_pretty_json() {
    let (_temp, dir) = setup();
    manager(&dir).write(&map(&[("a", "1"), ("b", "2")])).unwrap();

    let raw = fs::read_to_string(dir.join(SNAPSHOT_FILE)).unwrap();
    assert!(raw.lines().count() > 1);
}

// =============================================================================
// Merge Tests
// =============================================================================

#[test]
fn test_merge_memtable_wins() {
    let merged = SnapshotManager::merge(
        map(&[("a", "old"), ("b", "1")]),
        &BTreeSet::new(),
        &map(&[("a", "new")]),
        100,
    );

    assert_eq!(merged, map(&[("a", "new"), ("b", "1")]));
}

#[test]
fn test_merge_drops_pending_deletes() {
    let deletes: BTreeSet<String> = ["b".to_string()].into_iter().collect();

    let merged = SnapshotManager::merge(
        map(&[("a", "1"), ("b", "2")]),
        &deletes,
        &map(&[("c", "3")]),
        100,
    );

    assert_eq!(merged, map(&[("a", "1"), ("c", "3")]));
}

#[test]
fn test_merge_evicts_oldest_beyond_capacity() {
    let merged = SnapshotManager::merge(
        map(&[("a", "1"), ("b", "2")]),
        &BTreeSet::new(),
        &map(&[("c", "3"), ("d", "4")]),
        3,
    );

    // previous snapshot entries go first
    assert_eq!(merged, map(&[("b", "2"), ("c", "3"), ("d", "4")]));
}

// =============================================================================
// Retry Tests
// =============================================================================

fn io_error(kind: io::ErrorKind) -> VaultError {
    VaultError::Io(io::Error::from(kind))
}

#[test]
fn test_retry_recovers_from_would_block() {
    let calls = Cell::new(0);

    let result = retry_transient(3, Duration::from_millis(1), || {
        calls.set(calls.get() + 1);
        if calls.get() == 1 {
            Err(io_error(io::ErrorKind::WouldBlock))
        } else {
            Ok(42)
        }
    });

    assert_eq!(result.unwrap(), 42);
    assert_eq!(calls.get(), 2);
}

#[test]
fn test_retry_gives_up_after_attempts() {
    let calls = Cell::new(0);

    let result: vaultkv::Result<()> = retry_transient(3, Duration::from_millis(1), || {
        calls.set(calls.get() + 1);
        Err(io_error(io::ErrorKind::WouldBlock))
    });

    match result {
        Err(VaultError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::WouldBlock),
        other => panic!("expected an I/O error, got {:?}", other),
    }
    assert_eq!(calls.get(), 3);
}

#[test]
fn test_retry_returns_permanent_error_at_once() {
    let calls = Cell::new(0);

    let result: vaultkv::Result<()> = retry_transient(5, Duration::from_millis(1), || {
        calls.set(calls.get() + 1);
        Err(io_error(io::ErrorKind::NotFound))
    });

    assert!(matches!(result, Err(VaultError::Io(_))));
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_store_uses_configured_retry() {
    let (_temp, dir) = setup();
    let config = Config::builder()
        .data_dir(&dir)
        .snapshot_retry(5, Duration::from_millis(1))
        .build();
    let store = Store::open(config).unwrap();

    store.put("k", "v").unwrap();
    store.save_snapshot().unwrap();

    assert_eq!(store.config().snapshot_retry_attempts, 5);
    assert_eq!(store.config().snapshot_retry_delay, Duration::from_millis(1));
    assert_eq!(manager(&dir).load(), map(&[("k", "v")]));
}

// =============================================================================
// Adopt Tests
// =============================================================================

#[test]
fn test_adopt_complete_temp_file() {
    let (_temp, dir) = setup();
    fs::write(dir.join(SNAPSHOT_FILE), "{\"a\": \"old\"}").unwrap();
    fs::write(dir.join(SNAPSHOT_TEMP_FILE), "{\"a\": \"new\"}").unwrap();

    let snapshots = manager(&dir);
    assert!(snapshots.adopt_temp().unwrap());

    assert_eq!(snapshots.load(), map(&[("a", "new")]));
    assert!(!dir.join(SNAPSHOT_TEMP_FILE).exists());
}

#[test]
fn test_discard_partial_temp_file() {
    let (_temp, dir) = setup();
    fs::write(dir.join(SNAPSHOT_FILE), "{\"a\": \"old\"}").unwrap();
    fs::write(dir.join(SNAPSHOT_TEMP_FILE), "{\"a\": \"ne").unwrap();

    let snapshots = manager(&dir);
    assert!(!snapshots.adopt_temp().unwrap());

    assert_eq!(snapshots.load(), map(&[("a", "old")]));
    assert!(!dir.join(SNAPSHOT_TEMP_FILE).exists());
}

// =============================================================================
// Startup Recovery Tests
// =============================================================================

fn interrupted_snapshot(dir: &Path, temp_content: &str) {
    fs::write(dir.join(SNAPSHOT_FILE), "{\"a\": \"old\"}").unwrap();
    fs::write(dir.join(SNAPSHOT_TEMP_FILE), temp_content).unwrap();
    Journal::open(&dir.join(JOURNAL_FILE))
        .begin(JournalOperation::Snapshot, &dir.join(SNAPSHOT_TEMP_FILE))
        .unwrap();
}

#[test]
fn test_startup_adopts_complete_snapshot() {
    let (_temp, dir) = setup();
    interrupted_snapshot(&dir, "{\"a\": \"new\", \"b\": \"2\"}");

    let store = open_store(&dir);

    assert_eq!(store.read("a").unwrap(), Some("new".to_string()));
    assert_eq!(store.read("b").unwrap(), Some("2".to_string()));

    let record = Journal::open(&dir.join(JOURNAL_FILE)).read().unwrap().unwrap();
    assert_eq!(record.status, JournalStatus::Committed);
}

#[test]
fn test_startup_discards_partial_snapshot() {
    let (_temp, dir) = setup();
    interrupted_snapshot(&dir, "{\"a\": \"ne");

    let store = open_store(&dir);

    assert_eq!(store.read("a").unwrap(), Some("old".to_string()));
    assert!(!dir.join(SNAPSHOT_TEMP_FILE).exists());
}

#[test]
fn test_startup_cleans_interrupted_flush() {
    let (_temp, dir) = setup();
    {
        let store = open_store(&dir);
        store.put("k", "v").unwrap();
    }

    let leftover = dir.join("sst_00000000000000000007_0001.json.tmp");
    fs::write(&leftover, "{\"k\":").unwrap();
    Journal::open(&dir.join(JOURNAL_FILE))
        .begin(JournalOperation::SstableFlush, &dir.join("sst_00000000000000000007"))
        .unwrap();

    let store = open_store(&dir);

    assert!(!leftover.exists());
    assert_eq!(store.read("k").unwrap(), Some("v".to_string()));
    assert_eq!(store.sstable_count(), 0);
}

#[test]
fn test_committed_journal_is_ignored() {
    let (_temp, dir) = setup();
    fs::write(dir.join(SNAPSHOT_FILE), "{\"a\": \"old\"}").unwrap();
    fs::write(dir.join(SNAPSHOT_TEMP_FILE), "{\"a\": \"stale\"}").unwrap();
    let journal = Journal::open(&dir.join(JOURNAL_FILE));
    journal
        .begin(JournalOperation::Snapshot, &dir.join(SNAPSHOT_TEMP_FILE))
        .unwrap();
    journal.commit().unwrap();

    let store = open_store(&dir);

    assert_eq!(store.read("a").unwrap(), Some("old".to_string()));
}
