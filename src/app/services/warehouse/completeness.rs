//! Warehouse-side date completeness analysis
//!
//! Produces the same [`DateCompletenessResult`] as the file scanner,
//! but computed by the warehouse: aggregate queries for totals and
//! ranges, a windowed LAG query for gap detection, and GROUP BY for the
//! per-date counts the anomaly detector needs.
//!
//! Date columns declared as text are handled too: the distinct raw
//! values are grouped warehouse-side, then parsed here against the
//! known format list, logging (never failing) on unparseable values.

use crate::app::models::{DateCompletenessResult, DateGap, DateRange};
use crate::app::services::completeness::{
    CompletenessInput, build_completeness, enumerate_missing,
};
use crate::app::services::date_batch::parse_date_multi;
use crate::app::services::warehouse::client::{WarehouseClient, quote_ident};
use crate::constants::{MAX_INVALID_DATE_SAMPLES, WAREHOUSE_DATE_FORMATS};
use crate::Result;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Column types the warehouse can aggregate as dates directly
fn is_date_typed(data_type: &str) -> bool {
    matches!(
        data_type,
        "date" | "timestamp without time zone" | "timestamp with time zone"
    )
}

/// Completeness analyzer bound to one table and date column
#[derive(Debug)]
pub struct WarehouseCompletenessAnalyzer<'a> {
    client: &'a WarehouseClient,
    table: String,
    date_column: String,
    quoted_table: String,
    quoted_date: String,
}

impl<'a> WarehouseCompletenessAnalyzer<'a> {
    /// Create an analyzer; identifiers are validated and quoted once,
    /// up front
    pub fn new(client: &'a WarehouseClient, table: &str, date_column: &str) -> Result<Self> {
        Ok(Self {
            client,
            table: table.to_string(),
            date_column: date_column.to_string(),
            quoted_table: quote_ident(table)?,
            quoted_date: quote_ident(date_column)?,
        })
    }

    /// Analyze the table's date completeness.
    ///
    /// With an explicit range the window is restricted, but the table's
    /// true overall range is still computed and reported so "no data in
    /// the requested window" stays distinguishable from "the table is
    /// empty".
    pub async fn analyze(
        &self,
        explicit_range: Option<DateRange>,
    ) -> Result<DateCompletenessResult> {
        let data_type = self
            .client
            .column_type(&self.table, &self.date_column)
            .await?;

        if is_date_typed(&data_type) {
            self.analyze_typed(explicit_range).await
        } else {
            debug!(
                "Date column of '{}' is {data_type}; grouping raw values and parsing locally",
                self.table
            );
            self.analyze_text(explicit_range).await
        }
    }

    /// Fast path: the column is a real date/timestamp, so every
    /// aggregate runs warehouse-side.
    async fn analyze_typed(
        &self,
        explicit_range: Option<DateRange>,
    ) -> Result<DateCompletenessResult> {
        let table = &self.quoted_table;
        let day = format!("{}::date", self.quoted_date);

        // True overall range, always computed even under a filter
        let sql = format!("SELECT MIN({day}), MAX({day}) FROM {table}");
        let (table_min, table_max): (Option<NaiveDate>, Option<NaiveDate>) =
            sqlx::query_as(&sql).fetch_one(self.client.pool()).await?;
        let table_range = match (table_min, table_max) {
            (Some(start), Some(end)) => Some(DateRange { start, end }),
            _ => None,
        };

        let filter = explicit_range.map(|_| format!("WHERE {day} >= $1 AND {day} <= $2"));
        let where_clause = filter.as_deref().unwrap_or("");

        // Window totals in one aggregate round-trip
        let sql = format!(
            "SELECT COUNT(*), COUNT(DISTINCT {day}), MIN({day}), MAX({day}) FROM {table} {where_clause}"
        );
        let mut query = sqlx::query_as::<_, (i64, i64, Option<NaiveDate>, Option<NaiveDate>)>(&sql);
        if let Some(range) = explicit_range {
            query = query.bind(range.start).bind(range.end);
        }
        let (total_rows, unique_dates, window_min, window_max) =
            query.fetch_one(self.client.pool()).await?;

        // Per-date counts for the anomaly detector and the result map
        let sql = format!(
            "SELECT {day} AS day, COUNT(*) FROM {table} {where_clause} GROUP BY 1 ORDER BY 1"
        );
        let mut query = sqlx::query_as::<_, (Option<NaiveDate>, i64)>(&sql);
        if let Some(range) = explicit_range {
            query = query.bind(range.start).bind(range.end);
        }
        let count_rows = query.fetch_all(self.client.pool()).await?;
        let counts: BTreeMap<NaiveDate, i64> = count_rows
            .into_iter()
            .filter_map(|(date, count)| date.map(|d| (d, count)))
            .collect();

        // Gap detection in one windowed query over the distinct dates
        let sql = format!(
            "WITH days AS (SELECT DISTINCT {day} AS day FROM {table} {where_clause}) \
             SELECT prev_day, day, (day - prev_day) - 1 \
             FROM (SELECT day, LAG(day) OVER (ORDER BY day) AS prev_day FROM days) spans \
             WHERE prev_day IS NOT NULL AND day - prev_day > 1 \
             ORDER BY day"
        );
        let mut query = sqlx::query_as::<_, (NaiveDate, NaiveDate, i32)>(&sql);
        if let Some(range) = explicit_range {
            query = query.bind(range.start).bind(range.end);
        }
        let gap_rows = query.fetch_all(self.client.pool()).await?;
        let gaps: Vec<DateGap> = gap_rows
            .into_iter()
            .map(|(before, after, missing_days)| DateGap {
                before,
                after,
                missing_days: missing_days as i64,
            })
            .collect();

        let authoritative = explicit_range.or(table_range);
        let expected_dates = authoritative.map(|r| r.day_count()).unwrap_or(0);
        let observed_range = match (window_min, window_max) {
            (Some(start), Some(end)) => Some(DateRange { start, end }),
            _ => None,
        };
        let bounds = observed_range.map(|r| (r.start, r.end));
        let (missing_dates, missing_truncated) = enumerate_missing(authoritative, bounds, &gaps);

        let date_counts: BTreeMap<String, i64> = counts
            .iter()
            .map(|(date, count)| (date.format("%Y-%m-%d").to_string(), *count))
            .collect();

        Ok(DateCompletenessResult {
            total_rows,
            unique_dates,
            expected_dates,
            expected_range: authoritative,
            observed_range,
            table_range,
            missing_dates,
            missing_truncated,
            gaps,
            date_counts,
            invalid_dates: Vec::new(),
            invalid_date_count: 0,
        })
    }

    /// Tolerant path: the column is text, possibly holding mixed date
    /// encodings. The warehouse still collapses the table to distinct
    /// raw values; parsing and windowing happen here.
    async fn analyze_text(
        &self,
        explicit_range: Option<DateRange>,
    ) -> Result<DateCompletenessResult> {
        let sql = format!(
            "SELECT {}::text AS raw, COUNT(*) FROM {} GROUP BY 1",
            self.quoted_date, self.quoted_table
        );
        let rows: Vec<(Option<String>, i64)> =
            sqlx::query_as(&sql).fetch_all(self.client.pool()).await?;

        let mut all_counts: BTreeMap<NaiveDate, i64> = BTreeMap::new();
        let mut invalid_samples: Vec<(u64, String)> = Vec::new();
        let mut invalid_count = 0u64;

        for (raw, count) in rows {
            let raw = raw.unwrap_or_default();
            match parse_date_multi(&raw, WAREHOUSE_DATE_FORMATS) {
                Some(date) => *all_counts.entry(date).or_insert(0) += count,
                None => {
                    invalid_count += count as u64;
                    warn!(
                        "Unparseable date value '{raw}' ({count} rows) in table '{}'",
                        self.table
                    );
                    if invalid_samples.len() < MAX_INVALID_DATE_SAMPLES {
                        // Row numbers are not recoverable from an
                        // aggregate; 0 marks "unknown row"
                        invalid_samples.push((0, raw));
                    }
                }
            }
        }

        let table_range = match (all_counts.keys().next(), all_counts.keys().next_back()) {
            (Some(first), Some(last)) => Some(DateRange {
                start: *first,
                end: *last,
            }),
            _ => None,
        };

        let (counts, total_rows) = match explicit_range {
            Some(range) => {
                let windowed: BTreeMap<NaiveDate, i64> = all_counts
                    .into_iter()
                    .filter(|(date, _)| range.contains(*date))
                    .collect();
                let total = windowed.values().sum();
                (windowed, total)
            }
            None => {
                let total = all_counts.values().sum::<i64>() + invalid_count as i64;
                (all_counts, total)
            }
        };

        Ok(build_completeness(CompletenessInput {
            counts,
            total_rows,
            authoritative_range: explicit_range.or(table_range),
            table_range,
            invalid_samples,
            invalid_count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_typed_detection() {
        assert!(is_date_typed("date"));
        assert!(is_date_typed("timestamp without time zone"));
        assert!(is_date_typed("timestamp with time zone"));
        assert!(!is_date_typed("text"));
        assert!(!is_date_typed("character varying"));
        assert!(!is_date_typed("integer"));
    }
}
