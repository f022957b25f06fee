//! Warehouse-side duplicate key detection
//!
//! The warehouse does the grouping (GROUP BY over the key tuple), so
//! only group rows travel back here; accounting and severity grading
//! are shared with the file scanner via [`analyze_duplicates`].

use crate::app::models::{DateRange, DuplicateFinding};
use crate::app::services::duplicate::{analyze_duplicates, normalize_date_key};
use crate::app::services::warehouse::client::{WarehouseClient, quote_ident};
use crate::config::DuplicateThresholds;
use crate::{Error, Result};
use sqlx::Row;
use std::collections::HashMap;
use tracing::debug;

/// Group the key tuple warehouse-side and grade the duplication.
///
/// When one of the key columns is a loosely-typed date column, its
/// values are normalized to ISO form here before the final grouping, so
/// `2024-04-01` and `20240401` count as the same key. In that case the
/// warehouse returns every group (normalization can merge groups that
/// individually look unique); for properly typed keys only the
/// duplicated groups travel back (HAVING COUNT(*) > 1).
pub async fn analyze_table_duplicates(
    client: &WarehouseClient,
    table: &str,
    key_columns: &[String],
    date_column: Option<&str>,
    range: Option<DateRange>,
    thresholds: &DuplicateThresholds,
) -> Result<DuplicateFinding> {
    if key_columns.is_empty() {
        return Err(Error::configuration(format!(
            "No key columns given for duplicate analysis of table '{table}'"
        )));
    }
    if range.is_some() && date_column.is_none() {
        return Err(Error::configuration(
            "A date column is required to scope duplicate analysis to a range",
        ));
    }

    let quoted_table = quote_ident(table)?;
    let quoted_keys: Vec<String> = key_columns
        .iter()
        .map(|k| quote_ident(k))
        .collect::<Result<_>>()?;

    let where_clause = match (range, date_column) {
        (Some(_), Some(date_column)) => {
            let quoted_date = quote_ident(date_column)?;
            format!("WHERE {quoted_date}::date >= $1 AND {quoted_date}::date <= $2")
        }
        _ => String::new(),
    };

    // A date key column stored as text must be normalized before the
    // final grouping, which can merge warehouse-side groups
    let date_key_index = date_column.and_then(|d| key_columns.iter().position(|k| k == d));
    let needs_normalization = match (date_key_index, date_column) {
        (Some(_), Some(date_column)) => {
            let data_type = client.column_type(table, date_column).await?;
            !matches!(
                data_type.as_str(),
                "date" | "timestamp without time zone" | "timestamp with time zone"
            )
        }
        _ => false,
    };

    let select_list: Vec<String> = quoted_keys.iter().map(|k| format!("{k}::text")).collect();
    let group_list = quoted_keys.join(", ");
    let having = if needs_normalization {
        ""
    } else {
        "HAVING COUNT(*) > 1"
    };

    let sql = format!(
        "SELECT {select}, COUNT(*) AS group_size FROM {quoted_table} {where_clause} \
         GROUP BY {group_list} {having}",
        select = select_list.join(", "),
    );
    let mut query = sqlx::query(&sql);
    if let Some(range) = range {
        query = query.bind(range.start).bind(range.end);
    }
    let rows = query.fetch_all(client.pool()).await?;

    let mut groups: HashMap<Vec<String>, i64> = HashMap::new();
    for row in &rows {
        let key: Vec<String> = (0..key_columns.len())
            .map(|index| {
                let value: Option<String> = row.try_get(index).unwrap_or(None);
                let value = value.unwrap_or_default();
                if Some(index) == date_key_index {
                    normalize_date_key(&value)
                } else {
                    value
                }
            })
            .collect();
        let count: i64 = row.try_get(key_columns.len()).unwrap_or(0);
        *groups.entry(key).or_insert(0) += count;
    }

    let count_sql = format!("SELECT COUNT(*) FROM {quoted_table} {where_clause}");
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(range) = range {
        count_query = count_query.bind(range.start).bind(range.end);
    }
    let total_rows = count_query.fetch_one(client.pool()).await?;

    debug!(
        "Duplicate query on '{table}' returned {} groups over {total_rows} rows",
        groups.len()
    );

    Ok(analyze_duplicates(groups, total_rows, thresholds))
}
