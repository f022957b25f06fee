//! Per-table validation aggregation
//!
//! Runs the warehouse-side sub-analyzers for one table and folds their
//! findings into a single verdict. Sub-checks are independent: a
//! completeness problem never suppresses the duplicate check. Only
//! genuinely fatal conditions (unreachable warehouse, missing table,
//! timeout) short-circuit a table, and they surface as ERROR status,
//! which is distinct from FAILED: ERROR means the checks could not run,
//! FAILED means they ran and found real problems.

use crate::app::models::{
    AnomalyRecord, DateCompletenessResult, DateRange, DuplicateFinding, Severity,
    ValidationStatus, ValidationVerdict,
};
use crate::app::services::anomaly::detect_anomalies;
use crate::app::services::warehouse::client::{TableColumnCache, WarehouseClient, with_timeout};
use crate::app::services::warehouse::completeness::WarehouseCompletenessAnalyzer;
use crate::app::services::warehouse::duplicates::analyze_table_duplicates;
use crate::config::{AnomalyThresholds, DuplicateThresholds, TableSpec};
use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Final per-table record of a validation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableValidation {
    pub table: String,
    pub status: ValidationStatus,

    /// Findings; present whenever the run got far enough to produce any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<ValidationVerdict>,

    /// What stopped the run, for ERROR status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TableValidation {
    fn error(table: &str, message: String, verdict: Option<ValidationVerdict>) -> Self {
        Self {
            table: table.to_string(),
            status: ValidationStatus::Error,
            verdict,
            error: Some(message),
        }
    }

    /// Total rows seen by the completeness check, when it ran
    pub fn total_rows(&self) -> Option<i64> {
        self.verdict
            .as_ref()
            .and_then(|v| v.completeness.as_ref())
            .map(|c| c.total_rows)
    }
}

/// Rebuild the typed per-date count map from a completeness result
fn counts_map(completeness: &DateCompletenessResult) -> BTreeMap<NaiveDate, i64> {
    completeness
        .date_counts
        .iter()
        .filter_map(|(key, count)| {
            NaiveDate::parse_from_str(key, "%Y-%m-%d")
                .ok()
                .map(|date| (date, *count))
        })
        .collect()
}

/// Aggregator for warehouse-side table validation.
///
/// Holds the per-run column cache explicitly; there is no process-wide
/// metadata state, so concurrent runs cannot contaminate each other.
pub struct ValidationAggregator<'a> {
    client: &'a WarehouseClient,
    column_cache: &'a TableColumnCache,
    anomaly_thresholds: AnomalyThresholds,
    duplicate_thresholds: DuplicateThresholds,
}

impl<'a> ValidationAggregator<'a> {
    pub fn new(
        client: &'a WarehouseClient,
        column_cache: &'a TableColumnCache,
        anomaly_thresholds: AnomalyThresholds,
        duplicate_thresholds: DuplicateThresholds,
    ) -> Self {
        Self {
            client,
            column_cache,
            anomaly_thresholds,
            duplicate_thresholds,
        }
    }

    /// Validate one table, converting every failure mode into a status
    /// rather than an error: callers in a multi-table run must never
    /// see a sibling table abort the loop.
    pub async fn validate_table(
        &self,
        spec: &TableSpec,
        range: Option<DateRange>,
    ) -> TableValidation {
        debug!("Validating table '{}'", spec.table_name);

        match self.run_checks(spec, range).await {
            Ok(validation) => validation,
            Err(error) => {
                warn!("Validation of '{}' could not run: {error}", spec.table_name);
                TableValidation::error(&spec.table_name, format!("{error:#}"), None)
            }
        }
    }

    async fn run_checks(
        &self,
        spec: &TableSpec,
        range: Option<DateRange>,
    ) -> Result<TableValidation> {
        // Fatal gate: a table that does not exist short-circuits
        // everything else for this table only
        if !self.client.table_exists(&spec.table_name).await? {
            return Err(Error::table_not_found(&spec.table_name));
        }

        let mut failure_reasons: Vec<String> = Vec::new();
        let mut soft_issues = false;

        // Column agreement between config and warehouse
        let actual_columns = self
            .column_cache
            .columns(self.client, &spec.table_name)
            .await?;
        for expected in &spec.expected_columns {
            if !actual_columns.contains(expected) {
                failure_reasons.push(format!(
                    "Expected column '{expected}' is missing from the warehouse table"
                ));
            }
        }

        // Completeness (fatal on connectivity/timeout, by propagation)
        let analyzer =
            WarehouseCompletenessAnalyzer::new(self.client, &spec.table_name, &spec.date_column)?;
        let completeness = with_timeout(
            &format!("completeness analysis of '{}'", spec.table_name),
            self.client.query_timeout(),
            analyzer.analyze(range),
        )
        .await?;

        if !completeness.missing_dates.is_empty() || completeness.missing_truncated {
            let shown = completeness.missing_dates.len();
            let suffix = if completeness.missing_truncated {
                " (truncated)"
            } else {
                ""
            };
            failure_reasons.push(format!("{shown} missing dates{suffix}"));
        }
        if !completeness.gaps.is_empty() {
            failure_reasons.push(format!("{} date gaps", completeness.gaps.len()));
        }
        if completeness.invalid_date_count > 0 {
            soft_issues = true;
        }

        // Anomalies over the same window
        let anomalies: Vec<AnomalyRecord> =
            detect_anomalies(&counts_map(&completeness), &self.anomaly_thresholds);
        let critical_anomalies = anomalies
            .iter()
            .filter(|a| a.severity.as_severity() == Severity::Critical)
            .count();
        if critical_anomalies > 0 {
            failure_reasons.push(format!(
                "{critical_anomalies} dates with critically low row counts"
            ));
        }
        if !anomalies.is_empty() {
            soft_issues = true;
        }

        // Duplicates, only when the table configures a key. A fatal
        // error here still fails the table run; it is the same
        // connection after all.
        let duplicates: Option<DuplicateFinding> = match &spec.duplicate_key_columns {
            Some(key_columns) => Some(
                analyze_table_duplicates(
                    self.client,
                    &spec.table_name,
                    key_columns,
                    Some(spec.date_column.as_str()),
                    range,
                    &self.duplicate_thresholds,
                )
                .await?,
            ),
            None => None,
        };
        if let Some(finding) = &duplicates {
            if finding.severity == Severity::Critical {
                failure_reasons.push(format!(
                    "Critical duplication: {} duplicated keys, {:.2}% of rows",
                    finding.duplicate_keys, finding.duplicate_percent
                ));
            } else if finding.duplicate_keys > 0 {
                soft_issues = true;
            }
        }

        let verdict = ValidationVerdict::from_findings(
            failure_reasons,
            Some(completeness),
            anomalies,
            duplicates,
        );

        let status = if !verdict.valid {
            ValidationStatus::Failed
        } else if soft_issues {
            ValidationStatus::Warning
        } else {
            ValidationStatus::Passed
        };

        info!("Table '{}' validated: {status}", spec.table_name);
        Ok(TableValidation {
            table: spec.table_name.clone(),
            status,
            verdict: Some(verdict),
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::DateGap;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_counts_map_round_trip() {
        let completeness = DateCompletenessResult {
            total_rows: 3,
            unique_dates: 2,
            expected_dates: 2,
            expected_range: None,
            observed_range: None,
            table_range: None,
            missing_dates: Vec::new(),
            missing_truncated: false,
            gaps: Vec::new(),
            date_counts: [
                ("2024-01-01".to_string(), 2i64),
                ("2024-01-02".to_string(), 1i64),
            ]
            .into_iter()
            .collect(),
            invalid_dates: Vec::new(),
            invalid_date_count: 0,
        };

        let map = counts_map(&completeness);
        assert_eq!(map.get(&date("2024-01-01")), Some(&2));
        assert_eq!(map.get(&date("2024-01-02")), Some(&1));
    }

    #[test]
    fn test_table_validation_total_rows() {
        let completeness = DateCompletenessResult {
            total_rows: 42,
            unique_dates: 1,
            expected_dates: 1,
            expected_range: None,
            observed_range: None,
            table_range: None,
            missing_dates: Vec::new(),
            missing_truncated: false,
            gaps: vec![DateGap {
                before: date("2024-01-01"),
                after: date("2024-01-03"),
                missing_days: 1,
            }],
            date_counts: BTreeMap::new(),
            invalid_dates: Vec::new(),
            invalid_date_count: 0,
        };
        let validation = TableValidation {
            table: "events".to_string(),
            status: ValidationStatus::Failed,
            verdict: Some(ValidationVerdict::from_findings(
                vec!["1 date gaps".to_string()],
                Some(completeness),
                Vec::new(),
                None,
            )),
            error: None,
        };

        assert_eq!(validation.total_rows(), Some(42));
        assert!(validation.status.is_failure());
    }
}
