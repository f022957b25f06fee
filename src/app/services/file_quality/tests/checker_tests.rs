//! Tests for the streaming file scan

use super::{events_descriptor, write_fixture};
use crate::app::models::{DateRange, Severity};
use crate::app::services::file_quality::checker::FileQualityChecker;
use crate::config::DuplicateThresholds;
use chrono::NaiveDate;
use tempfile::TempDir;

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test]
fn test_completeness_with_one_missing_date() {
    let dir = TempDir::new().unwrap();
    let mut contents = String::from("event_date\taccount_id\tamount\n");
    for day in ["2024-01-01", "2024-01-02", "2024-01-04", "2024-01-05"] {
        for account in 0..3 {
            contents.push_str(&format!("{day}\tacct-{account}\t1.0\n"));
        }
    }
    let path = write_fixture(&dir, "events.tsv", &contents);

    let checker = FileQualityChecker::new(events_descriptor(path));
    let range = DateRange::new(date("2024-01-01"), date("2024-01-05")).unwrap();
    let result = checker.check_date_completeness(Some(range), None).unwrap();

    assert_eq!(result.total_rows, 12);
    assert_eq!(result.unique_dates, 4);
    assert_eq!(result.expected_dates, 5);
    assert_eq!(result.missing_dates, vec!["2024-01-03".to_string()]);
    assert_eq!(result.gaps.len(), 1);
    assert_eq!(result.gaps[0].before, date("2024-01-02"));
    assert_eq!(result.gaps[0].after, date("2024-01-04"));
    assert_eq!(result.gaps[0].missing_days, 1);
    assert_eq!(result.date_counts.get("2024-01-01"), Some(&3));
}

#[test]
fn test_mixed_date_formats_count_together() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(
        &dir,
        "events.tsv",
        "event_date\taccount_id\tamount\n\
         2024-01-01\ta\t1.0\n\
         20240101\tb\t1.0\n\
         01/01/2024\tc\t1.0\n",
    );

    let checker = FileQualityChecker::new(events_descriptor(path));
    let result = checker.check_date_completeness(None, None).unwrap();

    assert_eq!(result.unique_dates, 1);
    assert_eq!(result.date_counts.get("2024-01-01"), Some(&3));
}

#[test]
fn test_invalid_dates_recorded_not_fatal() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(
        &dir,
        "events.tsv",
        "event_date\taccount_id\tamount\n\
         2024-01-01\ta\t1.0\n\
         not-a-date\tb\t1.0\n\
         2024-01-02\tc\t1.0\n",
    );

    let checker = FileQualityChecker::new(events_descriptor(path));
    let result = checker.check_date_completeness(None, None).unwrap();

    assert_eq!(result.total_rows, 3);
    assert_eq!(result.unique_dates, 2);
    assert_eq!(result.invalid_date_count, 1);
    assert_eq!(result.invalid_dates.len(), 1);
    assert_eq!(result.invalid_dates[0].1, "not-a-date");
}

#[test]
fn test_duplicate_key_scan() {
    let dir = TempDir::new().unwrap();
    let mut contents = String::from("event_date\taccount_id\tamount\n");
    // One (date, account) combination three times, in mixed date
    // encodings that must normalize to the same key
    contents.push_str("2024-01-01\tdup\t1.0\n");
    contents.push_str("20240101\tdup\t2.0\n");
    contents.push_str("01/01/2024\tdup\t3.0\n");
    for account in 0..998 {
        contents.push_str(&format!("2024-01-02\tacct-{account}\t1.0\n"));
    }
    let path = write_fixture(&dir, "events.tsv", &contents);

    let checker = FileQualityChecker::new(events_descriptor(path));
    let finding = checker
        .check_duplicate_keys(None, &DuplicateThresholds::default(), None)
        .unwrap();

    assert_eq!(finding.duplicate_keys, 1);
    assert_eq!(finding.excess_rows, 2);
    assert_eq!(finding.max_duplicates, 3);
    assert_eq!(finding.severity, Severity::Low);
    assert_eq!(
        finding.samples[0].key,
        vec!["2024-01-01".to_string(), "dup".to_string()]
    );
}

#[test]
fn test_duplicate_scan_scoped_to_range() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(
        &dir,
        "events.tsv",
        "event_date\taccount_id\tamount\n\
         2024-01-01\tdup\t1.0\n\
         2024-01-01\tdup\t2.0\n\
         2024-02-01\tdup\t3.0\n\
         2024-02-01\tdup\t4.0\n",
    );

    let checker = FileQualityChecker::new(events_descriptor(path));
    let january = DateRange::new(date("2024-01-01"), date("2024-01-31")).unwrap();
    let finding = checker
        .check_duplicate_keys(Some(january), &DuplicateThresholds::default(), None)
        .unwrap();

    // Only the January pair is in scope
    assert_eq!(finding.duplicate_keys, 1);
    assert_eq!(finding.excess_rows, 1);
    assert_eq!(finding.total_rows, 2);
}

#[test]
fn test_validate_file_skips_stream_on_schema_mismatch() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(
        &dir,
        "events.tsv",
        "wrong\theader\n\
         2024-01-01\ta\n",
    );

    let checker = FileQualityChecker::new(events_descriptor(path));
    let result = checker
        .validate_file(None, &DuplicateThresholds::default(), None)
        .unwrap();

    assert!(!result.schema.matched);
    assert!(result.completeness.is_none());
    assert!(result.duplicates.is_none());
    assert!(!result.is_loadable());
}

#[test]
fn test_validate_file_combined_pass() {
    let dir = TempDir::new().unwrap();
    let mut contents = String::from("event_date\taccount_id\tamount\n");
    for day in 1..=5 {
        contents.push_str(&format!("2024-03-{day:02}\tacct-1\t1.0\n"));
    }
    let path = write_fixture(&dir, "events.tsv", &contents);

    let checker = FileQualityChecker::new(events_descriptor(path));
    let result = checker
        .validate_file(None, &DuplicateThresholds::default(), None)
        .unwrap();

    assert!(result.schema.matched);
    let completeness = result.completeness.as_ref().unwrap();
    assert!(completeness.is_complete());
    assert_eq!(completeness.unique_dates, 5);
    let duplicates = result.duplicates.as_ref().unwrap();
    assert_eq!(duplicates.duplicate_keys, 0);
    assert!(result.is_loadable());
}

#[test]
fn test_missing_file_structured_error() {
    let dir = TempDir::new().unwrap();
    let checker = FileQualityChecker::new(events_descriptor(dir.path().join("absent.tsv")));
    let result = checker.check_date_completeness(None, None);
    assert!(matches!(result, Err(crate::Error::FileNotFound { .. })));
}
