//! Header and sample-based schema checking
//!
//! Reads only the header row plus a bounded sample of data rows to
//! infer per-column types and count null-ish values, so the check stays
//! cheap regardless of file size.

use crate::app::models::FileDescriptor;
use crate::app::services::date_batch::parse_date_multi;
use crate::constants::{FILE_DATE_FORMATS, NULL_ESCAPE_TOKEN, SCHEMA_SAMPLE_ROWS};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use tracing::debug;

/// Column type inferred from the first non-null sampled value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnType {
    Integer,
    Float,
    Date,
    Varchar,
}

impl ColumnType {
    fn infer(value: &str) -> Self {
        if value.parse::<i64>().is_ok() {
            ColumnType::Integer
        } else if value.parse::<f64>().is_ok() {
            ColumnType::Float
        } else if parse_date_multi(value, FILE_DATE_FORMATS).is_some() {
            ColumnType::Date
        } else {
            ColumnType::Varchar
        }
    }
}

/// Result of the header/sample schema check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaCheckResult {
    /// True when the header matches the expected columns exactly
    /// (names and order)
    pub matched: bool,

    pub expected_count: usize,
    pub actual_count: usize,

    /// Header columns as found in the file
    pub actual_columns: Vec<String>,

    /// Expected columns missing from the header
    pub missing_columns: Vec<String>,

    /// Header columns not among the expected set
    pub unexpected_columns: Vec<String>,

    /// Type inferred per column from the first non-null sampled value
    pub inferred_types: BTreeMap<String, ColumnType>,

    /// Null-ish values per column over the sample (empty string,
    /// `NULL`, `null`, or the loader's null-escape token)
    pub null_counts: BTreeMap<String, u64>,

    /// Data rows actually sampled
    pub sampled_rows: u64,
}

fn is_null_token(value: &str) -> bool {
    value.is_empty() || value == "NULL" || value == "null" || value == NULL_ESCAPE_TOKEN
}

/// Check a file's header and a bounded sample against the descriptor.
///
/// Does not read the whole file: at most [`SCHEMA_SAMPLE_ROWS`] data
/// rows are examined.
pub fn check_schema(descriptor: &FileDescriptor) -> Result<SchemaCheckResult> {
    if !descriptor.path.exists() {
        return Err(Error::file_not_found(descriptor.path.display().to_string()));
    }

    let file = File::open(&descriptor.path)
        .map_err(|e| Error::io(format!("opening {}", descriptor.path.display()), e))?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(descriptor.delimiter)
        .quote(descriptor.quote)
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let headers = reader.headers().map_err(|e| {
        Error::delimited_parsing(
            descriptor.path.display().to_string(),
            "reading header row",
            Some(e),
        )
    })?;
    let actual_columns: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();

    let missing_columns: Vec<String> = descriptor
        .expected_columns
        .iter()
        .filter(|c| !actual_columns.contains(c))
        .cloned()
        .collect();
    let unexpected_columns: Vec<String> = actual_columns
        .iter()
        .filter(|c| !descriptor.expected_columns.contains(c))
        .cloned()
        .collect();
    let matched = actual_columns == descriptor.expected_columns;

    let mut inferred_types: BTreeMap<String, ColumnType> = BTreeMap::new();
    let mut null_counts: BTreeMap<String, u64> =
        actual_columns.iter().map(|c| (c.clone(), 0)).collect();

    let mut sampled_rows = 0u64;
    for record in reader.records() {
        if sampled_rows >= SCHEMA_SAMPLE_ROWS as u64 {
            break;
        }
        let record = match record {
            Ok(record) => record,
            // Malformed sample rows are a data-quality matter for the
            // streaming pass, not a reason to abort the schema check
            Err(_) => continue,
        };
        sampled_rows += 1;

        for (index, column) in actual_columns.iter().enumerate() {
            let value = record.get(index).unwrap_or("").trim();
            if is_null_token(value) {
                *null_counts.entry(column.clone()).or_insert(0) += 1;
            } else if !inferred_types.contains_key(column) {
                inferred_types.insert(column.clone(), ColumnType::infer(value));
            }
        }
    }

    debug!(
        "Schema check for {}: matched={}, {} columns, {} rows sampled",
        descriptor.path.display(),
        matched,
        actual_columns.len(),
        sampled_rows
    );

    Ok(SchemaCheckResult {
        matched,
        expected_count: descriptor.expected_columns.len(),
        actual_count: actual_columns.len(),
        actual_columns,
        missing_columns,
        unexpected_columns,
        inferred_types,
        null_counts,
        sampled_rows,
    })
}
