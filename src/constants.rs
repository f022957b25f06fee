//! Application constants for the warehouse auditor
//!
//! This module contains default values, caps, and format lists used
//! throughout the loading and validation pipeline.

// =============================================================================
// Date Parsing
// =============================================================================

/// Ordered list of date formats attempted when parsing file values.
///
/// Order matters: the first successful parse wins, so the most common
/// formats come first.
pub const FILE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d", "%m/%d/%Y"];

/// Formats attempted when reading date strings back out of a warehouse
/// table, which may hold values rendered by the warehouse itself
/// (e.g. "Apr 01 2024") alongside the file formats.
pub const WAREHOUSE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d", "%m/%d/%Y", "%b %d %Y"];

// =============================================================================
// Caps and Batch Sizes
// =============================================================================

/// Rows fed to the date batch processor per call
pub const DATE_BATCH_SIZE: usize = 10_000;

/// Maximum invalid date samples retained per scan
pub const MAX_INVALID_DATE_SAMPLES: usize = 100;

/// Maximum missing-date strings retained in a completeness result
pub const MAX_MISSING_DATES: usize = 100;

/// Maximum anomaly records returned per window
pub const MAX_ANOMALY_RECORDS: usize = 100;

/// Missing-date runs wider than this many days report boundaries only;
/// individual days inside them are not enumerated
pub const MAX_GAP_ENUMERATION_DAYS: i64 = 31;

/// Rows sampled for the schema check (header excluded)
pub const SCHEMA_SAMPLE_ROWS: usize = 10_000;

/// Default sample size of offending key tuples in a duplicate finding
pub const DEFAULT_DUPLICATE_SAMPLE: usize = 5;

// =============================================================================
// I/O and Concurrency Defaults
// =============================================================================

/// Buffer size for streaming file reads (8 MB keeps syscall count low
/// on multi-gigabyte inputs)
pub const FILE_READ_BUFFER_BYTES: usize = 8 * 1024 * 1024;

/// Default field delimiter for input files
pub const DEFAULT_DELIMITER: u8 = b'\t';

/// Default quote character for input files
pub const DEFAULT_QUOTE: u8 = b'"';

/// Token the loader writes for NULL fields; the schema check also
/// counts it as a null value
pub const NULL_ESCAPE_TOKEN: &str = "\\N";

/// Default maximum connections in the warehouse pool
pub const DEFAULT_POOL_CONNECTIONS: u32 = 10;

/// Connections held back from the worker count so a slow worker cannot
/// exhaust the pool
pub const POOL_SAFETY_MARGIN: u32 = 2;

/// Default wait budget for a single COPY load, in seconds
pub const DEFAULT_LOAD_TIMEOUT_SECS: u64 = 3_600;

/// Default wait budget for a single analysis query, in seconds
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 300;

// =============================================================================
// Severity Thresholds
// =============================================================================

/// Anomaly classification defaults (overridable via config)
pub mod anomaly_defaults {
    /// A date below this fraction of the window mean is SEVERELY_LOW
    pub const SEVERE_FRACTION: f64 = 0.10;

    /// A date below this fraction of the window mean is LOW
    pub const LOW_FRACTION: f64 = 0.50;

    /// Tukey fence multiplier applied to the IQR
    pub const IQR_MULTIPLIER: f64 = 1.5;
}

/// Duplicate severity defaults (overridable via config).
///
/// Percentages are of total rows, and the boundaries are inclusive:
/// a duplicate-row share of exactly 10.0% grades CRITICAL.
pub mod duplicate_defaults {
    pub const CRITICAL_PERCENT: f64 = 10.0;
    pub const HIGH_PERCENT: f64 = 5.0;
    pub const MEDIUM_PERCENT: f64 = 1.0;

    pub const CRITICAL_MAX_GROUP: i64 = 100;
    pub const HIGH_MAX_GROUP: i64 = 50;
    pub const MEDIUM_MAX_GROUP: i64 = 10;
}

/// Environment variable holding the warehouse connection URL
pub const ENV_WAREHOUSE_URL: &str = "WAREHOUSE_AUDITOR_DATABASE_URL";

/// Default config file name looked up under the user config directory
pub const DEFAULT_CONFIG_FILE: &str = "warehouse-auditor/config.json";
