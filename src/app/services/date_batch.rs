//! Batched multi-format date parsing
//!
//! The streaming scan hands rows to this processor in fixed-size batches
//! rather than one at a time, which amortizes per-call overhead on
//! multi-gigabyte inputs. Batching is a throughput concern only: output
//! is identical for any batch size.

use crate::app::models::DateRange;
use crate::constants::{DATE_BATCH_SIZE, MAX_INVALID_DATE_SAMPLES};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

/// Attempt to parse a raw value against an ordered list of formats,
/// returning the first success
pub fn parse_date_multi(raw: &str, formats: &[&str]) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    formats
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}

/// Accumulated outcome of a batched date scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DateTally {
    /// Rows per parsed in-range date
    pub counts: BTreeMap<NaiveDate, i64>,

    /// Rows whose date parsed, whether or not it fell in range
    pub parsed_rows: u64,

    /// Parsed rows whose date fell outside the accepted range (dropped
    /// from `counts` but not treated as invalid)
    pub out_of_range_rows: u64,

    /// Sampled unparseable values as (row number, raw value), capped
    pub invalid_samples: Vec<(u64, String)>,

    /// Total unparseable values encountered
    pub invalid_count: u64,
}

impl DateTally {
    /// Observed min/max over the counted dates
    pub fn observed_range(&self) -> Option<DateRange> {
        let start = *self.counts.keys().next()?;
        let end = *self.counts.keys().next_back()?;
        Some(DateRange { start, end })
    }

    /// Total rows counted into the per-date map
    pub fn counted_rows(&self) -> i64 {
        self.counts.values().sum()
    }
}

/// Streaming batch processor for raw date strings.
///
/// Rows are buffered until a full batch accumulates, then parsed in one
/// pass. Out-of-range dates are silently dropped from the counted set;
/// unparseable values are recorded up to a fixed sample cap.
#[derive(Debug)]
pub struct StreamingDateBatchProcessor {
    formats: Vec<&'static str>,
    accepted_range: Option<DateRange>,
    batch: Vec<(u64, String)>,
    batch_size: usize,
    tally: DateTally,
}

impl StreamingDateBatchProcessor {
    /// Create a processor with the given format list and optional
    /// accepted range
    pub fn new(formats: &[&'static str], accepted_range: Option<DateRange>) -> Self {
        Self::with_batch_size(formats, accepted_range, DATE_BATCH_SIZE)
    }

    /// Create a processor with an explicit batch size (exposed so tests
    /// can verify batch size does not change output)
    pub fn with_batch_size(
        formats: &[&'static str],
        accepted_range: Option<DateRange>,
        batch_size: usize,
    ) -> Self {
        Self {
            formats: formats.to_vec(),
            accepted_range,
            batch: Vec::with_capacity(batch_size),
            batch_size: batch_size.max(1),
            tally: DateTally::default(),
        }
    }

    /// Buffer one (row number, raw value) pair, flushing a full batch
    pub fn push(&mut self, row_number: u64, raw: String) {
        self.batch.push((row_number, raw));
        if self.batch.len() >= self.batch_size {
            self.process_pending();
        }
    }

    /// Flush any buffered rows and return the accumulated tally
    pub fn finish(mut self) -> DateTally {
        self.process_pending();
        if self.tally.invalid_count > 0 {
            debug!(
                "Date scan finished with {} unparseable values ({} sampled)",
                self.tally.invalid_count,
                self.tally.invalid_samples.len()
            );
        }
        self.tally
    }

    fn process_pending(&mut self) {
        let pending = std::mem::take(&mut self.batch);
        for (row_number, raw) in pending {
            match parse_date_multi(&raw, &self.formats) {
                Some(date) => {
                    self.tally.parsed_rows += 1;
                    let in_range = self
                        .accepted_range
                        .map(|range| range.contains(date))
                        .unwrap_or(true);
                    if in_range {
                        *self.tally.counts.entry(date).or_insert(0) += 1;
                    } else {
                        self.tally.out_of_range_rows += 1;
                    }
                }
                None => {
                    self.tally.invalid_count += 1;
                    if self.tally.invalid_samples.len() < MAX_INVALID_DATE_SAMPLES {
                        self.tally.invalid_samples.push((row_number, raw));
                    }
                }
            }
        }
    }
}
