//! Repair, reset and locking of the CSV store

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::tempdir;
use test_log::test;

use crate::common::test_data::write_csv;
use sp500_updater::storage::{CsvFileStore, RunLock, StoreError};

#[test]
fn test_repair_then_strict_read_succeeds() {
    let dir = tempdir().unwrap();
    let path = write_csv(
        dir.path(),
        "date,opening_price\n2024-07-23,5560.0\n2024-07-32,1.0\n2024-07-22,5555.74\n2024-07-23,5561.0\n",
    );
    let store = CsvFileStore::new(&path);

    let report = store.repair().unwrap();
    assert_eq!(report.kept, 2);
    assert_eq!(report.duplicates_removed, 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].line, 3);

    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "date,opening_price\n2024-07-22,5555.74\n2024-07-23,5561.00\n"
    );
}

#[test]
fn test_repair_refuses_foreign_header() {
    let dir = tempdir().unwrap();
    let contents = "Date;Opening_Price\n2024-07-22;5555,74\n";
    let path = write_csv(dir.path(), contents);

    let err = CsvFileStore::new(&path).repair().unwrap_err();
    assert_matches!(err, StoreError::Header(_));
    assert_eq!(fs::read_to_string(&path).unwrap(), contents);
}

#[test]
fn test_repair_of_missing_file_is_a_no_op() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sp500_data.csv");

    let report = CsvFileStore::new(&path).repair().unwrap();
    assert!(report.is_clean());
    assert!(!path.exists());
}

#[test]
fn test_reset_without_previous_file() {
    let dir = tempdir().unwrap();
    let store = CsvFileStore::new(dir.path().join("sp500_data.csv"));

    assert_eq!(store.reset().unwrap(), None);
    assert_eq!(fs::read_to_string(store.path()).unwrap(), "date,opening_price\n");
}

#[test]
fn test_lock_blocks_second_run() {
    let dir = tempdir().unwrap();
    let store = CsvFileStore::new(dir.path().join("sp500_data.csv"));

    let held = RunLock::acquire(store.lock_path()).unwrap();
    assert_eq!(held.path(), store.lock_path().as_path());
    assert_matches!(RunLock::acquire(store.lock_path()), Err(StoreError::Locked(p)) if p == store.lock_path());
}

#[test]
fn test_lock_left_by_killed_run_does_not_block() {
    let dir = tempdir().unwrap();
    let store = CsvFileStore::new(dir.path().join("sp500_data.csv"));
    // a killed run leaves the file behind but holds no OS lock
    fs::write(store.lock_path(), "pid=999999 acquired_at=2024-07-22T13:00:00+00:00\n").unwrap();

    for _ in 0..3 {
        let lock = RunLock::acquire(store.lock_path()).unwrap();
        drop(lock);
    }
}
