//! Tests for report summarization and persistence

use crate::app::models::{
    DateCompletenessResult, ValidationStatus, ValidationVerdict,
};
use crate::app::services::aggregator::report::{
    MultiTableReport, summarize,
};
use crate::app::services::aggregator::validator::TableValidation;
use chrono::Utc;
use std::collections::BTreeMap;
use tempfile::TempDir;

fn completeness(total_rows: i64) -> DateCompletenessResult {
    DateCompletenessResult {
        total_rows,
        unique_dates: 1,
        expected_dates: 1,
        expected_range: None,
        observed_range: None,
        table_range: None,
        missing_dates: Vec::new(),
        missing_truncated: false,
        gaps: Vec::new(),
        date_counts: BTreeMap::new(),
        invalid_dates: Vec::new(),
        invalid_date_count: 0,
    }
}

fn validation(table: &str, status: ValidationStatus, total_rows: i64) -> TableValidation {
    let reasons = if matches!(status, ValidationStatus::Failed) {
        vec!["problems".to_string()]
    } else {
        Vec::new()
    };
    TableValidation {
        table: table.to_string(),
        status,
        verdict: Some(ValidationVerdict::from_findings(
            reasons,
            Some(completeness(total_rows)),
            Vec::new(),
            None,
        )),
        error: None,
    }
}

fn error_validation(table: &str) -> TableValidation {
    TableValidation {
        table: table.to_string(),
        status: ValidationStatus::Error,
        verdict: None,
        error: Some("connection refused".to_string()),
    }
}

#[test]
fn test_summary_counts_by_status() {
    let mut tables = BTreeMap::new();
    tables.insert(
        "alpha".to_string(),
        validation("alpha", ValidationStatus::Passed, 100),
    );
    tables.insert(
        "bravo".to_string(),
        validation("bravo", ValidationStatus::Warning, 500),
    );
    tables.insert(
        "charlie".to_string(),
        validation("charlie", ValidationStatus::Failed, 900),
    );
    tables.insert("delta".to_string(), error_validation("delta"));

    let summary = summarize(&tables);
    assert_eq!(summary.total_tables, 4);
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.warnings, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.errors, 1);
    assert_eq!(
        summary.tables_with_issues,
        vec!["bravo", "charlie", "delta"]
    );
}

#[test]
fn test_summary_largest_tables_ordering() {
    let mut tables = BTreeMap::new();
    for (name, rows) in [
        ("a", 10),
        ("b", 500),
        ("c", 200),
        ("d", 900),
        ("e", 1),
        ("f", 300),
    ] {
        tables.insert(
            name.to_string(),
            validation(name, ValidationStatus::Passed, rows),
        );
    }

    let summary = summarize(&tables);
    let names: Vec<&str> = summary
        .largest_tables
        .iter()
        .map(|t| t.table.as_str())
        .collect();
    assert_eq!(names, vec!["d", "b", "f", "c", "a"]);
    assert_eq!(summary.largest_tables[0].total_rows, 900);
}

#[test]
fn test_error_tables_are_not_failures_counted_as_passed() {
    // An ERROR table is distinct from FAILED: the checks never ran
    let mut tables = BTreeMap::new();
    tables.insert("x".to_string(), error_validation("x"));

    let summary = summarize(&tables);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.passed, 0);
}

#[test]
fn test_report_json_round_trip() {
    let mut tables = BTreeMap::new();
    tables.insert(
        "events".to_string(),
        validation("events", ValidationStatus::Warning, 1234),
    );
    let summary = summarize(&tables);
    let report = MultiTableReport {
        generated_at: Utc::now(),
        tables,
        summary,
    };

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.json");
    report.write_json(&path).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let parsed: MultiTableReport = serde_json::from_str(&contents).unwrap();
    assert_eq!(parsed, report);
    assert!(!parsed.has_failures());
    assert_eq!(parsed.tables["events"].status, ValidationStatus::Warning);
}

#[test]
fn test_has_failures() {
    let mut tables = BTreeMap::new();
    tables.insert(
        "events".to_string(),
        validation("events", ValidationStatus::Failed, 10),
    );
    let summary = summarize(&tables);
    let report = MultiTableReport {
        generated_at: Utc::now(),
        tables,
        summary,
    };
    assert!(report.has_failures());
}
