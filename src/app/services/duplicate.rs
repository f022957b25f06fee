//! Duplicate composite-key analysis
//!
//! Operates on already-aggregated (key tuple, occurrence count) groups,
//! so the same accounting and severity grading serves both the file
//! scanner (which groups while streaming) and the warehouse analyzer
//! (which groups in SQL).

use crate::app::models::{DuplicateFinding, DuplicateSample, Severity};
use crate::app::services::date_batch::parse_date_multi;
use crate::config::DuplicateThresholds;
use crate::constants::FILE_DATE_FORMATS;
use tracing::debug;

/// Normalize a loosely-formatted date key component to ISO form so
/// `2024-04-01` and `20240401` group as the same key. Non-date values
/// pass through trimmed.
pub fn normalize_date_key(raw: &str) -> String {
    match parse_date_multi(raw, FILE_DATE_FORMATS) {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => raw.trim().to_string(),
    }
}

/// Analyze key-tuple groups for duplication.
///
/// `groups` may contain unique groups (count == 1); they are skipped.
/// `total_rows` is the percentage denominator: the total row count of
/// the grouped input, not the distinct key count.
pub fn analyze_duplicates(
    groups: impl IntoIterator<Item = (Vec<String>, i64)>,
    total_rows: i64,
    thresholds: &DuplicateThresholds,
) -> DuplicateFinding {
    let mut duplicated: Vec<(Vec<String>, i64)> = groups
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .collect();

    if duplicated.is_empty() {
        return DuplicateFinding::clean(total_rows);
    }

    let duplicate_keys = duplicated.len() as i64;
    let excess_rows: i64 = duplicated.iter().map(|(_, count)| count - 1).sum();
    let max_duplicates = duplicated
        .iter()
        .map(|(_, count)| *count)
        .max()
        .unwrap_or(0);
    let group_row_total: i64 = duplicated.iter().map(|(_, count)| count).sum();
    let avg_duplicates = group_row_total as f64 / duplicate_keys as f64;

    let duplicate_percent = if total_rows > 0 {
        (excess_rows as f64 / total_rows as f64) * 100.0
    } else {
        0.0
    };

    let severity = grade(duplicate_percent, max_duplicates, thresholds);

    // Largest offenders first; ties break on the key for determinism
    duplicated.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let samples: Vec<DuplicateSample> = duplicated
        .into_iter()
        .take(thresholds.sample_limit)
        .map(|(key, count)| DuplicateSample { key, count })
        .collect();

    debug!(
        "Duplicate analysis: {} duplicated keys, {} excess rows ({:.3}% of {}), max group {}",
        duplicate_keys, excess_rows, duplicate_percent, total_rows, max_duplicates
    );

    DuplicateFinding {
        duplicate_keys,
        excess_rows,
        max_duplicates,
        avg_duplicates,
        total_rows,
        duplicate_percent,
        severity,
        samples,
    }
}

/// Grade duplication severity.
///
/// Percentage boundaries are inclusive (exactly 10.0% is CRITICAL);
/// group-size boundaries are strict.
fn grade(percent: f64, max_group: i64, thresholds: &DuplicateThresholds) -> Severity {
    if percent >= thresholds.critical_percent || max_group > thresholds.critical_max_group {
        Severity::Critical
    } else if percent >= thresholds.high_percent || max_group > thresholds.high_max_group {
        Severity::High
    } else if percent >= thresholds.medium_percent || max_group > thresholds.medium_max_group {
        Severity::Medium
    } else {
        Severity::Low
    }
}
