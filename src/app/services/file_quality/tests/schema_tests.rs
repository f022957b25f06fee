//! Tests for the header/sample schema check

use super::{events_descriptor, write_fixture};
use crate::app::services::file_quality::schema_check::{ColumnType, check_schema};
use tempfile::TempDir;

#[test]
fn test_matching_schema() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(
        &dir,
        "events.tsv",
        "event_date\taccount_id\tamount\n\
         2024-01-01\tacct-1\t12.5\n\
         2024-01-02\tacct-2\t13.0\n",
    );

    let result = check_schema(&events_descriptor(path)).unwrap();
    assert!(result.matched);
    assert_eq!(result.expected_count, 3);
    assert_eq!(result.actual_count, 3);
    assert!(result.missing_columns.is_empty());
    assert!(result.unexpected_columns.is_empty());
    assert_eq!(result.sampled_rows, 2);
}

#[test]
fn test_type_inference_from_first_non_null() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(
        &dir,
        "events.tsv",
        "event_date\taccount_id\tamount\n\
         \t\t\n\
         2024-01-01\t42\t12.5\n",
    );

    let result = check_schema(&events_descriptor(path)).unwrap();
    assert_eq!(result.inferred_types.get("event_date"), Some(&ColumnType::Date));
    assert_eq!(
        result.inferred_types.get("account_id"),
        Some(&ColumnType::Integer)
    );
    assert_eq!(result.inferred_types.get("amount"), Some(&ColumnType::Float));
}

#[test]
fn test_varchar_inference() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(
        &dir,
        "events.tsv",
        "event_date\taccount_id\tamount\n\
         2024-01-01\tacct-9\tpending\n",
    );

    let result = check_schema(&events_descriptor(path)).unwrap();
    assert_eq!(
        result.inferred_types.get("account_id"),
        Some(&ColumnType::Varchar)
    );
    assert_eq!(
        result.inferred_types.get("amount"),
        Some(&ColumnType::Varchar)
    );
}

#[test]
fn test_null_counting() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(
        &dir,
        "events.tsv",
        "event_date\taccount_id\tamount\n\
         2024-01-01\tNULL\t1.0\n\
         2024-01-02\tnull\t\n\
         2024-01-03\t\\N\t3.0\n\
         2024-01-04\tacct-1\t4.0\n",
    );

    let result = check_schema(&events_descriptor(path)).unwrap();
    assert_eq!(result.null_counts.get("account_id"), Some(&3));
    assert_eq!(result.null_counts.get("amount"), Some(&1));
    assert_eq!(result.null_counts.get("event_date"), Some(&0));
}

#[test]
fn test_column_mismatch_reported() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(
        &dir,
        "events.tsv",
        "event_date\taccount_id\textra_col\n\
         2024-01-01\tacct-1\tx\n",
    );

    let result = check_schema(&events_descriptor(path)).unwrap();
    assert!(!result.matched);
    assert_eq!(result.missing_columns, vec!["amount".to_string()]);
    assert_eq!(result.unexpected_columns, vec!["extra_col".to_string()]);
}

#[test]
fn test_missing_file_is_structured_error() {
    let dir = TempDir::new().unwrap();
    let descriptor = events_descriptor(dir.path().join("absent.tsv"));
    let result = check_schema(&descriptor);
    assert!(matches!(result, Err(crate::Error::FileNotFound { .. })));
}
