//! Warehouse Auditor Library
//!
//! A Rust library for loading large delimited (TSV/CSV) files into a data
//! warehouse and auditing the loaded data for quality problems.
//!
//! This library provides tools for:
//! - Streaming single-pass quality scans of delimited files (row counts,
//!   date completeness, schema agreement) with bounded memory
//! - Equivalent completeness analysis computed warehouse-side via
//!   aggregate and window queries
//! - Statistical row-count anomaly detection (mean/quartile/IQR)
//! - Composite-key duplicate detection with severity grading
//! - Multi-table validation reports with per-table status isolation
//! - COPY-based loading with a fail-fast quality gate

pub mod config;
pub mod constants;

// Core application modules
pub mod app {
    pub mod models;
    pub mod services {
        pub mod aggregator;
        pub mod anomaly;
        pub mod completeness;
        pub mod date_batch;
        pub mod duplicate;
        pub mod file_quality;
        pub mod warehouse;
    }
}

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use app::models::{DateCompletenessResult, Severity, ValidationVerdict};
pub use config::Config;

/// Result type alias for the warehouse auditor
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error types for loading and validation operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV/TSV parsing error
    #[error("Delimited parsing error in file '{file}': {message}")]
    DelimitedParsing {
        file: String,
        message: String,
        #[source]
        source: Option<csv::Error>,
    },

    /// Warehouse query or connection error
    #[error("Warehouse error: {message}")]
    Warehouse {
        message: String,
        #[source]
        source: Option<sqlx::Error>,
    },

    /// Operation exceeded its wait budget
    #[error("Timed out after {budget_secs}s: {operation}")]
    Timeout {
        operation: String,
        budget_secs: u64,
    },

    /// Target table does not exist in the warehouse
    #[error("Table not found in warehouse: {table}")]
    TableNotFound { table: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Identifier failed the safe-charset check for SQL use
    #[error("Unsafe identifier rejected: {identifier}")]
    UnsafeIdentifier { identifier: String },

    /// Data validation error
    #[error("Data validation error: {message}")]
    DataValidation { message: String },

    /// Date/time parsing error
    #[error("Date parsing error: {message}")]
    DateParsing {
        message: String,
        #[source]
        source: Option<chrono::ParseError>,
    },

    /// File not found
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    /// JSON serialization/deserialization error
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// Processing interrupted
    #[error("Processing interrupted: {reason}")]
    ProcessingInterrupted { reason: String },
}

impl Error {
    /// Create an I/O error with context
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a delimited parsing error with context
    pub fn delimited_parsing(
        file: impl Into<String>,
        message: impl Into<String>,
        source: Option<csv::Error>,
    ) -> Self {
        Self::DelimitedParsing {
            file: file.into(),
            message: message.into(),
            source,
        }
    }

    /// Create a warehouse error with context
    pub fn warehouse(message: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Warehouse {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a warehouse error with a plain message
    pub fn warehouse_msg(message: impl Into<String>) -> Self {
        Self::Warehouse {
            message: message.into(),
            source: None,
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, budget_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            budget_secs,
        }
    }

    /// Create a table-not-found error
    pub fn table_not_found(table: impl Into<String>) -> Self {
        Self::TableNotFound {
            table: table.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an unsafe-identifier error
    pub fn unsafe_identifier(identifier: impl Into<String>) -> Self {
        Self::UnsafeIdentifier {
            identifier: identifier.into(),
        }
    }

    /// Create a data validation error
    pub fn data_validation(message: impl Into<String>) -> Self {
        Self::DataValidation {
            message: message.into(),
        }
    }

    /// Create a date parsing error
    pub fn date_parsing(message: impl Into<String>) -> Self {
        Self::DateParsing {
            message: message.into(),
            source: None,
        }
    }

    /// Create a file-not-found error
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a processing-interrupted error
    pub fn processing_interrupted(reason: impl Into<String>) -> Self {
        Self::ProcessingInterrupted {
            reason: reason.into(),
        }
    }

    /// True when the error means the check could not run at all, as
    /// opposed to a check that ran and found problems
    pub fn is_fatal_for_table(&self) -> bool {
        matches!(
            self,
            Self::Warehouse { .. } | Self::Timeout { .. } | Self::TableNotFound { .. }
        )
    }
}

// Automatic conversions from common error types
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: "I/O operation failed".to_string(),
            source: error,
        }
    }
}

impl From<csv::Error> for Error {
    fn from(error: csv::Error) -> Self {
        Self::DelimitedParsing {
            file: "unknown".to_string(),
            message: "delimited parsing failed".to_string(),
            source: Some(error),
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(error: sqlx::Error) -> Self {
        Self::Warehouse {
            message: "warehouse operation failed".to_string(),
            source: Some(error),
        }
    }
}

impl From<chrono::ParseError> for Error {
    fn from(error: chrono::ParseError) -> Self {
        Self::DateParsing {
            message: "date parsing failed".to_string(),
            source: Some(error),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Json {
            message: "JSON serialization failed".to_string(),
            source: error,
        }
    }
}
