//! Shared completeness derivation
//!
//! Both the file-based and warehouse-based analyzers reduce their input
//! to a per-date row count map; everything downstream of that map (the
//! expected-day arithmetic, missing-date set difference, and gap
//! decomposition) lives here so the two sources cannot drift apart.

use crate::app::models::{DateCompletenessResult, DateGap, DateRange};
use crate::constants::{MAX_GAP_ENUMERATION_DAYS, MAX_MISSING_DATES};
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;

/// Inputs to the shared completeness derivation
#[derive(Debug, Clone)]
pub struct CompletenessInput {
    /// Rows per observed in-range date
    pub counts: BTreeMap<NaiveDate, i64>,

    /// Total rows in the scanned window (includes rows whose date was
    /// invalid or out of range)
    pub total_rows: i64,

    /// Authoritative range for the expectation: the caller's explicit
    /// filter if one was given, else the table's true range
    /// (warehouse) or the observed span (file)
    pub authoritative_range: Option<DateRange>,

    /// Full-table min/max, when known independently of the window
    pub table_range: Option<DateRange>,

    /// Sampled unparseable date values, capped upstream
    pub invalid_samples: Vec<(u64, String)>,

    /// Total unparseable date values
    pub invalid_count: u64,
}

/// Derive the completeness result from a per-date count map.
///
/// Missing dates are computed as a set difference between the calendar
/// span and the observed set, walked run-by-run so a catastrophic gap
/// never materializes an unbounded list: runs wider than
/// [`MAX_GAP_ENUMERATION_DAYS`] contribute gap boundaries only, and the
/// enumerated list is capped at [`MAX_MISSING_DATES`] entries.
pub fn build_completeness(input: CompletenessInput) -> DateCompletenessResult {
    let observed_range = observed_range(&input.counts);
    let authoritative = input.authoritative_range.or(observed_range);

    let expected_dates = authoritative.map(|r| r.day_count()).unwrap_or(0);

    let observed: Vec<NaiveDate> = match authoritative {
        Some(range) => input
            .counts
            .keys()
            .copied()
            .filter(|d| range.contains(*d))
            .collect(),
        None => Vec::new(),
    };

    let gaps = gaps_from_observed(&observed);
    let bounds = match (observed.first(), observed.last()) {
        (Some(first), Some(last)) => Some((*first, *last)),
        _ => None,
    };
    let (missing_dates, missing_truncated) = enumerate_missing(authoritative, bounds, &gaps);

    let unique_dates = input.counts.len() as i64;
    let date_counts: BTreeMap<String, i64> = input
        .counts
        .iter()
        .map(|(date, count)| (date.format("%Y-%m-%d").to_string(), *count))
        .collect();

    DateCompletenessResult {
        total_rows: input.total_rows,
        unique_dates,
        expected_dates,
        expected_range: authoritative,
        observed_range,
        table_range: input.table_range.or(observed_range),
        missing_dates,
        missing_truncated,
        gaps,
        date_counts,
        invalid_dates: input.invalid_samples,
        invalid_date_count: input.invalid_count,
    }
}

/// Min/max over the observed dates
pub fn observed_range(counts: &BTreeMap<NaiveDate, i64>) -> Option<DateRange> {
    let start = *counts.keys().next()?;
    let end = *counts.keys().next_back()?;
    Some(DateRange { start, end })
}

/// Gap records between consecutive present dates.
///
/// `observed` must be sorted ascending. The warehouse analyzer derives
/// the same records with a windowed LAG query; this is the file-side
/// equivalent, and both feed [`enumerate_missing`].
pub fn gaps_from_observed(observed: &[NaiveDate]) -> Vec<DateGap> {
    observed
        .windows(2)
        .filter_map(|pair| {
            let day_diff = (pair[1] - pair[0]).num_days();
            (day_diff > 1).then(|| DateGap {
                before: pair[0],
                after: pair[1],
                missing_days: day_diff - 1,
            })
        })
        .collect()
}

/// Enumerate missing dates from the run structure: the leading run
/// before the first present date, each gap's interior, and the trailing
/// run after the last present date.
///
/// Returns the (capped, possibly truncated) list and whether anything
/// was left unenumerated.
pub fn enumerate_missing(
    authoritative: Option<DateRange>,
    observed_bounds: Option<(NaiveDate, NaiveDate)>,
    gaps: &[DateGap],
) -> (Vec<String>, bool) {
    let mut missing_dates: Vec<String> = Vec::new();
    let mut truncated = false;

    let Some(range) = authoritative else {
        return (missing_dates, truncated);
    };

    match observed_bounds {
        None => {
            // Nothing present in the window: the whole span is missing
            // but there is no gap record, since gaps are bounded by
            // present dates on both sides.
            enumerate_run(range.start, range.end, &mut missing_dates, &mut truncated);
        }
        Some((first, last)) => {
            if first > range.start {
                enumerate_run(
                    range.start,
                    first - Duration::days(1),
                    &mut missing_dates,
                    &mut truncated,
                );
            }
            for gap in gaps {
                enumerate_run(
                    gap.before + Duration::days(1),
                    gap.after - Duration::days(1),
                    &mut missing_dates,
                    &mut truncated,
                );
            }
            if last < range.end {
                enumerate_run(
                    last + Duration::days(1),
                    range.end,
                    &mut missing_dates,
                    &mut truncated,
                );
            }
        }
    }

    (missing_dates, truncated)
}

/// Append the days of one missing run to the output list, honoring the
/// enumeration-width rule and the global cap
fn enumerate_run(
    start: NaiveDate,
    end: NaiveDate,
    missing_dates: &mut Vec<String>,
    truncated: &mut bool,
) {
    let width = (end - start).num_days() + 1;
    if width > MAX_GAP_ENUMERATION_DAYS {
        *truncated = true;
        return;
    }

    let mut day = start;
    while day <= end {
        if missing_dates.len() >= MAX_MISSING_DATES {
            *truncated = true;
            return;
        }
        missing_dates.push(day.format("%Y-%m-%d").to_string());
        day += Duration::days(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn counts_for(dates: &[(&str, i64)]) -> BTreeMap<NaiveDate, i64> {
        dates.iter().map(|(d, c)| (date(d), *c)).collect()
    }

    fn input_for(dates: &[(&str, i64)], range: Option<(&str, &str)>) -> CompletenessInput {
        CompletenessInput {
            counts: counts_for(dates),
            total_rows: dates.iter().map(|(_, c)| c).sum(),
            authoritative_range: range.map(|(s, e)| DateRange {
                start: date(s),
                end: date(e),
            }),
            table_range: None,
            invalid_samples: Vec::new(),
            invalid_count: 0,
        }
    }

    #[test]
    fn test_single_missing_date_scenario() {
        // Dates 2024-01-01..05 minus 01-03 against an explicit 5-day range
        let result = build_completeness(input_for(
            &[
                ("2024-01-01", 10),
                ("2024-01-02", 10),
                ("2024-01-04", 10),
                ("2024-01-05", 10),
            ],
            Some(("2024-01-01", "2024-01-05")),
        ));

        assert_eq!(result.unique_dates, 4);
        assert_eq!(result.expected_dates, 5);
        assert_eq!(result.missing_dates, vec!["2024-01-03".to_string()]);
        assert_eq!(
            result.gaps,
            vec![DateGap {
                before: date("2024-01-02"),
                after: date("2024-01-04"),
                missing_days: 1,
            }]
        );
        assert!(!result.missing_truncated);
    }

    #[test]
    fn test_set_difference_exactness() {
        // missing == sorted(expected - observed), no duplicates, no
        // out-of-range entries
        let result = build_completeness(input_for(
            &[("2024-02-01", 1), ("2024-02-04", 1), ("2024-02-07", 1)],
            Some(("2024-02-01", "2024-02-07")),
        ));

        assert_eq!(
            result.missing_dates,
            vec!["2024-02-02", "2024-02-03", "2024-02-05", "2024-02-06"]
        );
        assert_eq!(
            result.unique_dates + result.missing_dates.len() as i64,
            result.expected_dates
        );
    }

    #[test]
    fn test_gap_decomposition_width() {
        // One gap of width 3: exactly one record, three enumerated days
        let result = build_completeness(input_for(
            &[("2024-05-01", 5), ("2024-05-05", 5)],
            None,
        ));

        assert_eq!(result.gaps.len(), 1);
        assert_eq!(result.gaps[0].missing_days, 3);
        assert_eq!(
            result.missing_dates,
            vec!["2024-05-02", "2024-05-03", "2024-05-04"]
        );
    }

    #[test]
    fn test_wide_gap_reports_boundaries_only() {
        // 60-day hole: gap record kept, days not enumerated
        let result = build_completeness(input_for(
            &[("2024-01-01", 5), ("2024-03-02", 5)],
            None,
        ));

        assert_eq!(result.gaps.len(), 1);
        assert_eq!(result.gaps[0].missing_days, 60);
        assert!(result.missing_dates.is_empty());
        assert!(result.missing_truncated);
    }

    #[test]
    fn test_leading_and_trailing_runs_are_not_gaps() {
        let result = build_completeness(input_for(
            &[("2024-06-10", 5), ("2024-06-11", 5)],
            Some(("2024-06-08", "2024-06-13")),
        ));

        // Missing days before and after the observed block appear in the
        // list but produce no gap record.
        assert_eq!(
            result.missing_dates,
            vec!["2024-06-08", "2024-06-09", "2024-06-12", "2024-06-13"]
        );
        assert!(result.gaps.is_empty());
    }

    #[test]
    fn test_empty_window_with_explicit_range() {
        let result = build_completeness(input_for(&[], Some(("2024-07-01", "2024-07-03"))));

        assert_eq!(result.unique_dates, 0);
        assert_eq!(result.expected_dates, 3);
        assert_eq!(
            result.missing_dates,
            vec!["2024-07-01", "2024-07-02", "2024-07-03"]
        );
        assert!(result.gaps.is_empty());
    }

    #[test]
    fn test_no_data_no_range() {
        let result = build_completeness(input_for(&[], None));
        assert_eq!(result.expected_dates, 0);
        assert!(result.missing_dates.is_empty());
        assert!(result.is_complete());
    }

    #[test]
    fn test_observed_span_is_default_expectation() {
        let result = build_completeness(input_for(
            &[("2024-08-01", 2), ("2024-08-02", 2), ("2024-08-03", 2)],
            None,
        ));

        assert_eq!(result.expected_dates, 3);
        assert!(result.is_complete());
        let range = result.expected_range.unwrap();
        assert_eq!(range.start, date("2024-08-01"));
        assert_eq!(range.end, date("2024-08-03"));
    }

    #[test]
    fn test_missing_list_cap() {
        // Present dates spaced so every run is narrow enough to
        // enumerate, with far more missing days than the cap
        let mut dates = Vec::new();
        for i in 0..40 {
            // every 5th day present over 200 days: runs of width 4
            dates.push((date("2024-01-01") + Duration::days(i * 5), 1));
        }
        let counts: BTreeMap<NaiveDate, i64> = dates.into_iter().collect();
        let result = build_completeness(CompletenessInput {
            counts,
            total_rows: 40,
            authoritative_range: None,
            table_range: None,
            invalid_samples: Vec::new(),
            invalid_count: 0,
        });

        assert_eq!(result.missing_dates.len(), MAX_MISSING_DATES);
        assert!(result.missing_truncated);
        assert_eq!(result.gaps.len(), 39);
    }
}
