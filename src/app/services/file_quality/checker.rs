//! Streaming file quality scans
//!
//! One buffered pass over the whole file produces the date tally and,
//! when a uniqueness key is configured, the key-tuple groups. Peak
//! memory is O(distinct dates + distinct duplicated keys + batch size),
//! never O(file size).

use crate::app::models::{
    DateCompletenessResult, DateRange, DuplicateFinding, FileDescriptor,
};
use crate::app::services::completeness::{CompletenessInput, build_completeness};
use crate::app::services::date_batch::{StreamingDateBatchProcessor, parse_date_multi};
use crate::app::services::duplicate::{analyze_duplicates, normalize_date_key};
use crate::app::services::file_quality::schema_check::{SchemaCheckResult, check_schema};
use crate::config::DuplicateThresholds;
use crate::constants::{FILE_DATE_FORMATS, FILE_READ_BUFFER_BYTES};
use crate::{Error, Result};
use indicatif::ProgressBar;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use tracing::{debug, info, warn};

/// Combined result of a full file validation
#[derive(Debug, Clone)]
pub struct FileValidationResult {
    pub schema: SchemaCheckResult,

    /// Present only when the schema check passed and the streaming pass
    /// ran
    pub completeness: Option<DateCompletenessResult>,

    /// Present only when the descriptor configures duplicate-key columns
    pub duplicates: Option<DuplicateFinding>,
}

impl FileValidationResult {
    /// True when the file is fit to load
    pub fn is_loadable(&self) -> bool {
        self.schema.matched
            && self
                .completeness
                .as_ref()
                .map(|c| c.is_complete())
                .unwrap_or(false)
    }
}

/// Outcome of one streaming pass
struct StreamScan {
    completeness: DateCompletenessResult,
    key_groups: Option<HashMap<Vec<String>, i64>>,
    rows_in_scope: i64,
}

/// Quality checker for one described file
#[derive(Debug)]
pub struct FileQualityChecker {
    descriptor: FileDescriptor,
}

impl FileQualityChecker {
    pub fn new(descriptor: FileDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn descriptor(&self) -> &FileDescriptor {
        &self.descriptor
    }

    /// Run the schema check only (header plus bounded sample)
    pub fn check_schema(&self) -> Result<SchemaCheckResult> {
        check_schema(&self.descriptor)
    }

    /// Stream the whole file once and derive date completeness.
    ///
    /// `explicit_range` overrides the observed span as the expectation;
    /// without it, the file's own min/max defines the expected days.
    pub fn check_date_completeness(
        &self,
        explicit_range: Option<DateRange>,
        progress: Option<&ProgressBar>,
    ) -> Result<DateCompletenessResult> {
        let scan = self.stream_scan(explicit_range, false, progress)?;
        Ok(scan.completeness)
    }

    /// Stream the whole file once and group the configured key columns,
    /// optionally scoped to a date range
    pub fn check_duplicate_keys(
        &self,
        explicit_range: Option<DateRange>,
        thresholds: &DuplicateThresholds,
        progress: Option<&ProgressBar>,
    ) -> Result<DuplicateFinding> {
        if self.descriptor.duplicate_key_columns.is_none() {
            return Err(Error::configuration(format!(
                "No duplicate-key columns configured for table '{}'",
                self.descriptor.table_name
            )));
        }
        let scan = self.stream_scan(explicit_range, true, progress)?;
        let groups = scan.key_groups.unwrap_or_default();
        Ok(analyze_duplicates(groups, scan.rows_in_scope, thresholds))
    }

    /// Full validation: schema gate first, then a single streaming pass
    /// that produces completeness and (when configured) duplicates.
    ///
    /// The streaming pass is skipped entirely when the schema check
    /// fails; reading gigabytes of a file already known to be wrong
    /// helps nobody.
    pub fn validate_file(
        &self,
        explicit_range: Option<DateRange>,
        thresholds: &DuplicateThresholds,
        progress: Option<&ProgressBar>,
    ) -> Result<FileValidationResult> {
        let schema = self.check_schema()?;

        if !schema.matched {
            warn!(
                "Schema mismatch for {}: expected {} columns, found {}; skipping streaming pass",
                self.descriptor.path.display(),
                schema.expected_count,
                schema.actual_count
            );
            return Ok(FileValidationResult {
                schema,
                completeness: None,
                duplicates: None,
            });
        }

        let collect_duplicates = self.descriptor.duplicate_key_columns.is_some();
        let scan = self.stream_scan(explicit_range, collect_duplicates, progress)?;

        let duplicates = scan
            .key_groups
            .map(|groups| analyze_duplicates(groups, scan.rows_in_scope, thresholds));

        info!(
            "Validated {}: {} rows, {} distinct dates, {} missing",
            self.descriptor.path.display(),
            scan.completeness.total_rows,
            scan.completeness.unique_dates,
            scan.completeness.missing_dates.len()
        );

        Ok(FileValidationResult {
            schema,
            completeness: Some(scan.completeness),
            duplicates,
        })
    }

    /// The single streaming pass shared by the public operations
    fn stream_scan(
        &self,
        explicit_range: Option<DateRange>,
        collect_duplicates: bool,
        progress: Option<&ProgressBar>,
    ) -> Result<StreamScan> {
        let descriptor = &self.descriptor;
        if !descriptor.path.exists() {
            return Err(Error::file_not_found(descriptor.path.display().to_string()));
        }

        let file = File::open(&descriptor.path)
            .map_err(|e| Error::io(format!("opening {}", descriptor.path.display()), e))?;
        let buffered = BufReader::with_capacity(FILE_READ_BUFFER_BYTES, file);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(descriptor.delimiter)
            .quote(descriptor.quote)
            .has_headers(true)
            .flexible(true)
            .from_reader(buffered);

        let date_index = descriptor.date_column_index();
        let key_indexes = if collect_duplicates {
            descriptor.key_column_indexes()
        } else {
            None
        };

        let mut processor = StreamingDateBatchProcessor::new(FILE_DATE_FORMATS, explicit_range);
        let mut key_groups: Option<HashMap<Vec<String>, i64>> =
            key_indexes.as_ref().map(|_| HashMap::new());
        let mut total_rows = 0i64;
        let mut rows_in_scope = 0i64;
        let mut malformed_rows = 0u64;

        let mut record = csv::ByteRecord::new();
        loop {
            match reader.read_byte_record(&mut record) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    // Malformed rows accumulate; the stream continues
                    malformed_rows += 1;
                    debug!("Skipping malformed row: {e}");
                    continue;
                }
            }

            total_rows += 1;
            let row_number = total_rows as u64;
            if let Some(pb) = progress {
                if total_rows % 100_000 == 0 {
                    pb.set_message(format!("{total_rows} rows"));
                    pb.inc(100_000);
                }
            }

            let raw_date = record
                .get(date_index)
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .unwrap_or_default();

            // Range scoping for the key grouping reuses the same parse
            let in_scope = match (explicit_range, parse_date_multi(&raw_date, FILE_DATE_FORMATS)) {
                (Some(range), Some(date)) => range.contains(date),
                (Some(_), None) => false,
                (None, _) => true,
            };

            if let (Some(groups), Some(indexes)) = (key_groups.as_mut(), key_indexes.as_ref()) {
                if in_scope {
                    rows_in_scope += 1;
                    let key: Vec<String> = indexes
                        .iter()
                        .map(|&index| {
                            let value = record
                                .get(index)
                                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                                .unwrap_or_default();
                            if index == date_index {
                                normalize_date_key(&value)
                            } else {
                                value.trim().to_string()
                            }
                        })
                        .collect();
                    *groups.entry(key).or_insert(0) += 1;
                }
            } else if in_scope {
                rows_in_scope += 1;
            }

            processor.push(row_number, raw_date);
        }

        if malformed_rows > 0 {
            warn!(
                "{}: {} malformed rows skipped during streaming scan",
                descriptor.path.display(),
                malformed_rows
            );
        }

        let tally = processor.finish();
        let authoritative = explicit_range.or_else(|| tally.observed_range());
        let completeness = build_completeness(CompletenessInput {
            counts: tally.counts,
            total_rows,
            authoritative_range: authoritative,
            table_range: None,
            invalid_samples: tally.invalid_samples,
            invalid_count: tally.invalid_count,
        });

        Ok(StreamScan {
            completeness,
            key_groups,
            rows_in_scope,
        })
    }
}
