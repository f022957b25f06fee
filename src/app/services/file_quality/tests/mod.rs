//! Tests for file-side quality checking

pub mod checker_tests;
pub mod schema_tests;

use crate::app::models::FileDescriptor;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

/// Write a TSV fixture and return its path
pub fn write_fixture(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

/// Standard three-column descriptor used across the fixtures
pub fn events_descriptor(path: PathBuf) -> FileDescriptor {
    FileDescriptor::new(
        path,
        "events".to_string(),
        vec![
            "event_date".to_string(),
            "account_id".to_string(),
            "amount".to_string(),
        ],
        "event_date".to_string(),
        None,
        Some(vec!["event_date".to_string(), "account_id".to_string()]),
        b'\t',
        b'"',
    )
    .unwrap()
}
