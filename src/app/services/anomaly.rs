//! Row-count anomaly detection
//!
//! Classifies each date's row count against the statistics of its own
//! comparison window (mean, quartiles, IQR). Severity is a function of
//! the group only, so it must be recomputed whenever the comparison set
//! changes (per month vs. whole table).

use crate::app::models::{AnomalyRecord, AnomalySeverity};
use crate::config::AnomalyThresholds;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

/// Summary statistics of a per-date count window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub mean: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub iqr: f64,
}

/// Compute mean and quartiles over a window's counts.
///
/// Quartiles use linear interpolation between closest ranks, so results
/// are deterministic for a given window.
pub fn window_stats(counts: &[i64]) -> Option<WindowStats> {
    if counts.is_empty() {
        return None;
    }

    let mut sorted: Vec<i64> = counts.to_vec();
    sorted.sort_unstable();

    let mean = sorted.iter().sum::<i64>() as f64 / sorted.len() as f64;
    let q1 = percentile(&sorted, 25.0);
    let median = percentile(&sorted, 50.0);
    let q3 = percentile(&sorted, 75.0);

    Some(WindowStats {
        mean,
        q1,
        median,
        q3,
        iqr: q3 - q1,
    })
}

/// Linear-interpolation percentile over a sorted slice
fn percentile(sorted: &[i64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    if sorted.len() == 1 {
        return sorted[0] as f64;
    }

    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;

    sorted[lower] as f64 + fraction * (sorted[upper] - sorted[lower]) as f64
}

/// Classify every date in the window, returning only the non-NORMAL
/// dates ordered by severity rank then date, capped at the configured
/// record limit.
///
/// Classification precedence: SEVERELY_LOW wins over OUTLIER_LOW and
/// LOW for the same date; OUTLIER_HIGH only applies to dates not
/// already low.
pub fn detect_anomalies(
    counts: &BTreeMap<NaiveDate, i64>,
    thresholds: &AnomalyThresholds,
) -> Vec<AnomalyRecord> {
    let values: Vec<i64> = counts.values().copied().collect();
    let Some(stats) = window_stats(&values) else {
        return Vec::new();
    };

    let low_fence = stats.q1 - thresholds.iqr_multiplier * stats.iqr;
    let high_fence = stats.q3 + thresholds.iqr_multiplier * stats.iqr;

    debug!(
        "Anomaly window: {} dates, mean {:.1}, Q1 {:.1}, Q3 {:.1}, fences [{:.1}, {:.1}]",
        counts.len(),
        stats.mean,
        stats.q1,
        stats.q3,
        low_fence,
        high_fence
    );

    let mut records: Vec<AnomalyRecord> = counts
        .iter()
        .filter_map(|(date, &count)| {
            let severity = classify(count, &stats, low_fence, high_fence, thresholds);
            if severity == AnomalySeverity::Normal {
                return None;
            }
            let percent = if stats.mean > 0.0 {
                (count as f64 / stats.mean) * 100.0
            } else {
                0.0
            };
            Some(AnomalyRecord {
                date: *date,
                row_count: count,
                expected_count: stats.mean,
                severity,
                percent_of_average: percent,
            })
        })
        .collect();

    records.sort_by(|a, b| {
        a.severity
            .rank()
            .cmp(&b.severity.rank())
            .then(a.date.cmp(&b.date))
    });
    records.truncate(thresholds.max_records);
    records
}

fn classify(
    count: i64,
    stats: &WindowStats,
    low_fence: f64,
    high_fence: f64,
    thresholds: &AnomalyThresholds,
) -> AnomalySeverity {
    let count = count as f64;

    if count < thresholds.severe_fraction * stats.mean {
        AnomalySeverity::SeverelyLow
    } else if count < low_fence {
        AnomalySeverity::OutlierLow
    } else if count < thresholds.low_fraction * stats.mean {
        AnomalySeverity::Low
    } else if count > high_fence {
        AnomalySeverity::OutlierHigh
    } else {
        AnomalySeverity::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn window(counts: &[(&str, i64)]) -> BTreeMap<NaiveDate, i64> {
        counts.iter().map(|(d, c)| (date(d), *c)).collect()
    }

    #[test]
    fn test_percentile_interpolation() {
        let sorted = vec![1, 2, 3, 4];
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 50.0), 2.5);
        assert_eq!(percentile(&sorted, 100.0), 4.0);
        assert_eq!(percentile(&sorted, 25.0), 1.75);
    }

    #[test]
    fn test_window_stats_empty() {
        assert_eq!(window_stats(&[]), None);
    }

    #[test]
    fn test_uniform_window_has_no_anomalies() {
        let counts = window(&[
            ("2024-01-01", 100),
            ("2024-01-02", 100),
            ("2024-01-03", 100),
            ("2024-01-04", 100),
        ]);
        let records = detect_anomalies(&counts, &AnomalyThresholds::default());
        assert!(records.is_empty());
    }

    #[test]
    fn test_severely_low_day() {
        // 10 dates at 100 rows plus one at 5: mean ~91.4, 10% fence
        // ~9.1, so the 5-row day is SEVERELY_LOW
        let mut counts = BTreeMap::new();
        for day in 1..=10 {
            counts.insert(date(&format!("2024-01-{day:02}")), 100);
        }
        counts.insert(date("2024-01-11"), 5);

        let records = detect_anomalies(&counts, &AnomalyThresholds::default());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].date, date("2024-01-11"));
        assert_eq!(records[0].severity, AnomalySeverity::SeverelyLow);
        assert_eq!(records[0].row_count, 5);
        assert!(records[0].percent_of_average < 6.0);
    }

    #[test]
    fn test_severely_low_takes_precedence_over_outlier_low() {
        // The 5-row day is below both the severe fraction and the Tukey
        // fence; precedence says SEVERELY_LOW wins.
        let mut counts = BTreeMap::new();
        for day in 1..=20 {
            counts.insert(date(&format!("2024-03-{day:02}")), 1_000);
        }
        counts.insert(date("2024-03-21"), 5);

        let records = detect_anomalies(&counts, &AnomalyThresholds::default());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].severity, AnomalySeverity::SeverelyLow);
    }

    #[test]
    fn test_high_outlier() {
        let mut counts = BTreeMap::new();
        for day in 1..=10 {
            counts.insert(date(&format!("2024-02-{day:02}")), 100);
        }
        // High enough to clear the upper fence without dragging the
        // mean far enough to reclassify the 100-row days
        counts.insert(date("2024-02-11"), 300);

        let records = detect_anomalies(&counts, &AnomalyThresholds::default());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].date, date("2024-02-11"));
        assert_eq!(records[0].severity, AnomalySeverity::OutlierHigh);
    }

    #[test]
    fn test_scale_invariance() {
        let base = window(&[
            ("2024-01-01", 100),
            ("2024-01-02", 120),
            ("2024-01-03", 90),
            ("2024-01-04", 110),
            ("2024-01-05", 100),
            ("2024-01-06", 8),
            ("2024-01-07", 40),
            ("2024-01-08", 500),
        ]);
        let thresholds = AnomalyThresholds::default();
        let baseline = detect_anomalies(&base, &thresholds);
        assert!(!baseline.is_empty());

        for scale in [3_i64, 10, 1_000] {
            let scaled: BTreeMap<NaiveDate, i64> =
                base.iter().map(|(d, c)| (*d, c * scale)).collect();
            let scaled_records = detect_anomalies(&scaled, &thresholds);

            assert_eq!(scaled_records.len(), baseline.len());
            for (a, b) in baseline.iter().zip(scaled_records.iter()) {
                assert_eq!(a.date, b.date);
                assert_eq!(a.severity, b.severity);
            }
        }
    }

    #[test]
    fn test_ordering_and_cap() {
        let mut counts = BTreeMap::new();
        for day in 1..=20 {
            counts.insert(date(&format!("2024-04-{day:02}")), 1_000);
        }
        // Two severely-low days and one plain-low day
        counts.insert(date("2024-04-25"), 10);
        counts.insert(date("2024-04-21"), 10);
        counts.insert(date("2024-04-22"), 400);

        let records = detect_anomalies(&counts, &AnomalyThresholds::default());
        assert!(records.len() >= 3);
        // Severity rank first, then date within equal severity
        assert_eq!(records[0].date, date("2024-04-21"));
        assert_eq!(records[0].severity, AnomalySeverity::SeverelyLow);
        assert_eq!(records[1].date, date("2024-04-25"));

        let capped = AnomalyThresholds {
            max_records: 2,
            ..AnomalyThresholds::default()
        };
        let limited = detect_anomalies(&counts, &capped);
        assert_eq!(limited.len(), 2);
    }
}
