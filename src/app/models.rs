//! Data models for warehouse loading and validation
//!
//! This module contains the value objects produced by the validation
//! engine. They are owned by the analyzer that produces them; the report
//! and CLI layers only read them.

use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

// =============================================================================
// Severity and Status
// =============================================================================

/// Ordinal severity classification for findings.
///
/// Ordering is part of the contract: `NONE < LOW < MEDIUM < HIGH < CRITICAL`,
/// so `max()` over findings yields the table-level grade.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Severity::None => "NONE",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        write!(f, "{label}")
    }
}

/// Per-date anomaly classification.
///
/// `rank()` gives the report ordering: severely-low days first, then
/// statistical low outliers, plain lows, and high outliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalySeverity {
    SeverelyLow,
    OutlierLow,
    Low,
    OutlierHigh,
    Normal,
}

impl AnomalySeverity {
    /// Report ordering rank (lower sorts first)
    pub fn rank(&self) -> u8 {
        match self {
            AnomalySeverity::SeverelyLow => 0,
            AnomalySeverity::OutlierLow => 1,
            AnomalySeverity::Low => 2,
            AnomalySeverity::OutlierHigh => 3,
            AnomalySeverity::Normal => 4,
        }
    }

    /// Map to the table-level severity scale used for verdicts
    pub fn as_severity(&self) -> Severity {
        match self {
            AnomalySeverity::SeverelyLow => Severity::Critical,
            AnomalySeverity::OutlierLow => Severity::High,
            AnomalySeverity::Low => Severity::Medium,
            AnomalySeverity::OutlierHigh => Severity::Low,
            AnomalySeverity::Normal => Severity::None,
        }
    }
}

impl std::fmt::Display for AnomalySeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AnomalySeverity::SeverelyLow => "SEVERELY_LOW",
            AnomalySeverity::OutlierLow => "OUTLIER_LOW",
            AnomalySeverity::Low => "LOW",
            AnomalySeverity::OutlierHigh => "OUTLIER_HIGH",
            AnomalySeverity::Normal => "NORMAL",
        };
        write!(f, "{label}")
    }
}

/// Lifecycle of a single table's validation run.
///
/// ERROR means the run itself failed (connectivity, missing table); FAILED
/// means the run completed and found real problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    NotRun,
    Running,
    Passed,
    Warning,
    Failed,
    Error,
}

impl ValidationStatus {
    /// True when this status should produce a non-zero process exit
    pub fn is_failure(&self) -> bool {
        matches!(self, ValidationStatus::Failed | ValidationStatus::Error)
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ValidationStatus::NotRun => "NOT_RUN",
            ValidationStatus::Running => "RUNNING",
            ValidationStatus::Passed => "PASSED",
            ValidationStatus::Warning => "WARNING",
            ValidationStatus::Failed => "FAILED",
            ValidationStatus::Error => "ERROR",
        };
        write!(f, "{label}")
    }
}

// =============================================================================
// Date Range
// =============================================================================

/// Inclusive calendar date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a range, validating start <= end
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::data_validation(format!(
                "Date range start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Inclusive day span of the range
    pub fn day_count(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Whether a date falls inside the range
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

// =============================================================================
// File Descriptor
// =============================================================================

/// Describes one delimited file to be quality-checked and loaded.
///
/// Constructed once per file and immutable afterward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Path to the delimited input file
    pub path: PathBuf,

    /// Target warehouse table name
    pub table_name: String,

    /// Ordered column names the file is expected to carry
    pub expected_columns: Vec<String>,

    /// Column holding the observation date
    pub date_column: String,

    /// Date range the file is expected to cover, if known up front
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_range: Option<DateRange>,

    /// Ordered columns forming the uniqueness key, if one is configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_key_columns: Option<Vec<String>>,

    /// Field delimiter byte
    pub delimiter: u8,

    /// Quote character byte
    pub quote: u8,
}

impl FileDescriptor {
    /// Create a descriptor, validating that the date column and every
    /// duplicate-key column are members of the expected columns
    pub fn new(
        path: PathBuf,
        table_name: String,
        expected_columns: Vec<String>,
        date_column: String,
        expected_range: Option<DateRange>,
        duplicate_key_columns: Option<Vec<String>>,
        delimiter: u8,
        quote: u8,
    ) -> Result<Self> {
        if expected_columns.is_empty() {
            return Err(Error::data_validation(format!(
                "File descriptor for table '{table_name}' has no expected columns"
            )));
        }

        if !expected_columns.contains(&date_column) {
            return Err(Error::data_validation(format!(
                "Date column '{date_column}' is not among the expected columns for table '{table_name}'"
            )));
        }

        if let Some(key_columns) = &duplicate_key_columns {
            for column in key_columns {
                if !expected_columns.contains(column) {
                    return Err(Error::data_validation(format!(
                        "Duplicate-key column '{column}' is not among the expected columns for table '{table_name}'"
                    )));
                }
            }
        }

        Ok(Self {
            path,
            table_name,
            expected_columns,
            date_column,
            expected_range,
            duplicate_key_columns,
            delimiter,
            quote,
        })
    }

    /// Index of the date column within the expected columns
    pub fn date_column_index(&self) -> usize {
        self.expected_columns
            .iter()
            .position(|c| c == &self.date_column)
            .expect("validated at construction")
    }

    /// Indexes of the duplicate-key columns within the expected columns
    pub fn key_column_indexes(&self) -> Option<Vec<usize>> {
        self.duplicate_key_columns.as_ref().map(|keys| {
            keys.iter()
                .map(|k| {
                    self.expected_columns
                        .iter()
                        .position(|c| c == k)
                        .expect("validated at construction")
                })
                .collect()
        })
    }
}

// =============================================================================
// Completeness
// =============================================================================

/// A run of consecutive missing dates bounded by two present dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateGap {
    /// Last present date before the gap
    pub before: NaiveDate,
    /// First present date after the gap
    pub after: NaiveDate,
    /// Number of calendar days strictly between the boundaries
    pub missing_days: i64,
}

/// Result of a date-completeness analysis over one file or table window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateCompletenessResult {
    /// Total rows scanned or counted
    pub total_rows: i64,

    /// Distinct in-range dates observed
    pub unique_dates: i64,

    /// Calendar days in the authoritative range (explicit range if the
    /// caller supplied one, else the observed span)
    pub expected_dates: i64,

    /// Authoritative range the expectation was computed against
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_range: Option<DateRange>,

    /// Observed min/max within the analyzed window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_range: Option<DateRange>,

    /// Full-table min/max, reported even when a filter narrowed the
    /// window; equals `observed_range` for file-based analysis
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_range: Option<DateRange>,

    /// Sorted missing date strings (capped; see `missing_truncated`)
    pub missing_dates: Vec<String>,

    /// True when the missing-date list hit its cap or a run was too wide
    /// to enumerate
    pub missing_truncated: bool,

    /// Runs of missing days bounded by present dates
    pub gaps: Vec<DateGap>,

    /// Rows per observed date, keyed by ISO date string
    pub date_counts: BTreeMap<String, i64>,

    /// Sampled unparseable date values as (row number, raw value), capped
    pub invalid_dates: Vec<(u64, String)>,

    /// Total count of unparseable date values encountered
    pub invalid_date_count: u64,
}

impl DateCompletenessResult {
    /// True when every expected date was observed at least once
    pub fn is_complete(&self) -> bool {
        self.missing_dates.is_empty() && !self.missing_truncated && self.gaps.is_empty()
    }
}

// =============================================================================
// Anomalies
// =============================================================================

/// A single date whose row count deviates from the window's typical volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub date: NaiveDate,
    pub row_count: i64,
    /// Mean daily row count of the comparison window
    pub expected_count: f64,
    pub severity: AnomalySeverity,
    /// Observed count as a percentage of the window mean
    pub percent_of_average: f64,
}

// =============================================================================
// Duplicates
// =============================================================================

/// One offending key tuple and its occurrence count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateSample {
    pub key: Vec<String>,
    pub count: i64,
}

/// Result of a duplicate-key analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateFinding {
    /// Distinct key combinations appearing more than once
    pub duplicate_keys: i64,

    /// Sum of (count - 1) over the duplicated combinations
    pub excess_rows: i64,

    /// Largest single group size observed
    pub max_duplicates: i64,

    /// Mean group size over the duplicated combinations
    pub avg_duplicates: f64,

    /// Total rows in the grouped input (the percentage denominator)
    pub total_rows: i64,

    /// Excess rows as a percentage of total rows
    pub duplicate_percent: f64,

    pub severity: Severity,

    /// Largest offending key tuples, ordered by group size descending
    pub samples: Vec<DuplicateSample>,
}

impl DuplicateFinding {
    /// Empty finding for an input with no duplication
    pub fn clean(total_rows: i64) -> Self {
        Self {
            duplicate_keys: 0,
            excess_rows: 0,
            max_duplicates: 0,
            avg_duplicates: 0.0,
            total_rows,
            duplicate_percent: 0.0,
            severity: Severity::None,
            samples: Vec::new(),
        }
    }
}

// =============================================================================
// Verdict
// =============================================================================

/// Aggregated validation outcome for one table or file.
///
/// `valid` is true iff `failure_reasons` is empty. Constructed fresh per
/// run and never mutated after return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub valid: bool,
    pub failure_reasons: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completeness: Option<DateCompletenessResult>,

    pub anomalies: Vec<AnomalyRecord>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicates: Option<DuplicateFinding>,
}

impl ValidationVerdict {
    /// Build a verdict from collected findings; `valid` follows directly
    /// from the reasons list
    pub fn from_findings(
        failure_reasons: Vec<String>,
        completeness: Option<DateCompletenessResult>,
        anomalies: Vec<AnomalyRecord>,
        duplicates: Option<DuplicateFinding>,
    ) -> Self {
        Self {
            valid: failure_reasons.is_empty(),
            failure_reasons,
            completeness,
            anomalies,
            duplicates,
        }
    }

    /// Highest severity across anomaly and duplicate findings
    pub fn max_severity(&self) -> Severity {
        let anomaly_max = self
            .anomalies
            .iter()
            .map(|a| a.severity.as_severity())
            .max()
            .unwrap_or(Severity::None);
        let duplicate_max = self
            .duplicates
            .as_ref()
            .map(|d| d.severity)
            .unwrap_or(Severity::None);
        anomaly_max.max(duplicate_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::None < Severity::Low);
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);

        let max = [Severity::Low, Severity::Critical, Severity::Medium]
            .into_iter()
            .max()
            .unwrap();
        assert_eq!(max, Severity::Critical);
    }

    #[test]
    fn test_anomaly_severity_rank_ordering() {
        assert!(AnomalySeverity::SeverelyLow.rank() < AnomalySeverity::OutlierLow.rank());
        assert!(AnomalySeverity::OutlierLow.rank() < AnomalySeverity::Low.rank());
        assert!(AnomalySeverity::Low.rank() < AnomalySeverity::OutlierHigh.rank());
        assert!(AnomalySeverity::OutlierHigh.rank() < AnomalySeverity::Normal.rank());
    }

    #[test]
    fn test_date_range_day_count() {
        let range = DateRange::new(date("2024-01-01"), date("2024-01-05")).unwrap();
        assert_eq!(range.day_count(), 5);

        let single = DateRange::new(date("2024-01-01"), date("2024-01-01")).unwrap();
        assert_eq!(single.day_count(), 1);
    }

    #[test]
    fn test_date_range_rejects_inverted() {
        assert!(DateRange::new(date("2024-02-01"), date("2024-01-01")).is_err());
    }

    #[test]
    fn test_file_descriptor_validates_columns() {
        let columns = vec![
            "event_date".to_string(),
            "account_id".to_string(),
            "amount".to_string(),
        ];

        let ok = FileDescriptor::new(
            PathBuf::from("/data/events.tsv"),
            "events".to_string(),
            columns.clone(),
            "event_date".to_string(),
            None,
            Some(vec!["event_date".to_string(), "account_id".to_string()]),
            b'\t',
            b'"',
        );
        assert!(ok.is_ok());

        let bad_date = FileDescriptor::new(
            PathBuf::from("/data/events.tsv"),
            "events".to_string(),
            columns.clone(),
            "missing_col".to_string(),
            None,
            None,
            b'\t',
            b'"',
        );
        assert!(bad_date.is_err());

        let bad_key = FileDescriptor::new(
            PathBuf::from("/data/events.tsv"),
            "events".to_string(),
            columns,
            "event_date".to_string(),
            None,
            Some(vec!["nope".to_string()]),
            b'\t',
            b'"',
        );
        assert!(bad_key.is_err());
    }

    #[test]
    fn test_file_descriptor_indexes() {
        let descriptor = FileDescriptor::new(
            PathBuf::from("/data/events.tsv"),
            "events".to_string(),
            vec![
                "account_id".to_string(),
                "event_date".to_string(),
                "amount".to_string(),
            ],
            "event_date".to_string(),
            None,
            Some(vec!["event_date".to_string(), "account_id".to_string()]),
            b'\t',
            b'"',
        )
        .unwrap();

        assert_eq!(descriptor.date_column_index(), 1);
        assert_eq!(descriptor.key_column_indexes(), Some(vec![1, 0]));
    }

    #[test]
    fn test_verdict_valid_iff_no_reasons() {
        let clean = ValidationVerdict::from_findings(Vec::new(), None, Vec::new(), None);
        assert!(clean.valid);

        let dirty = ValidationVerdict::from_findings(
            vec!["3 missing dates".to_string()],
            None,
            Vec::new(),
            None,
        );
        assert!(!dirty.valid);
    }

    #[test]
    fn test_verdict_max_severity() {
        let verdict = ValidationVerdict::from_findings(
            vec!["anomalous dates".to_string()],
            None,
            vec![AnomalyRecord {
                date: date("2024-03-01"),
                row_count: 2,
                expected_count: 100.0,
                severity: AnomalySeverity::SeverelyLow,
                percent_of_average: 2.0,
            }],
            Some(DuplicateFinding::clean(1000)),
        );
        assert_eq!(verdict.max_severity(), Severity::Critical);
    }
}
