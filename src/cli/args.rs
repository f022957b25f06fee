//! Command-line argument definitions for the warehouse auditor
//!
//! This module defines the complete CLI interface using the clap derive
//! API. Argument validation lives here so commands can assume clean
//! inputs.

use crate::app::models::DateRange;
use crate::{Error, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;

/// CLI arguments for the warehouse auditor
///
/// Loads delimited files into a warehouse table and audits loaded data
/// for completeness, row-count anomalies, and duplicate keys.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "warehouse-auditor",
    version,
    about = "Load delimited files into a warehouse and audit table data quality",
    long_about = "An ETL companion tool that loads large TSV/CSV files into a data warehouse \
                  with a fail-fast quality gate, then validates loaded tables for missing \
                  dates, statistically anomalous daily volumes, and duplicate composite keys, \
                  producing severity-graded reports."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Quality-check a delimited file and load it into its table
    Load(LoadArgs),
    /// Validate one or all configured tables against loaded data
    Validate(ValidateArgs),
    /// Run the duplicate-key analysis alone
    CheckDuplicates(CheckDuplicatesArgs),
    /// Validate many tables in parallel and emit a structured summary
    Report(ReportArgs),
    /// Delete a table's rows within a date range
    Delete(DeleteArgs),
}

/// Output format options for machine-readable results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON format for scripting
    Json,
}

/// Wrapper for parsing comma-separated column lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnList {
    pub columns: Vec<String>,
}

impl FromStr for ColumnList {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let columns: Vec<String> = s
            .split(',')
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect();

        if columns.is_empty() {
            return Err(Error::configuration("Column list cannot be empty"));
        }
        Ok(ColumnList { columns })
    }
}

/// Parse a YYYY-MM-DD date argument
pub fn parse_date_arg(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| Error::configuration(format!("Invalid date '{raw}': expected YYYY-MM-DD")))
}

/// Expand a YYYY-MM month argument to its first/last day
pub fn month_range(raw: &str) -> Result<DateRange> {
    let parts: Vec<&str> = raw.trim().split('-').collect();
    if parts.len() != 2 {
        return Err(Error::configuration(format!(
            "Invalid month '{raw}': expected YYYY-MM"
        )));
    }
    let year: i32 = parts[0]
        .parse()
        .map_err(|_| Error::configuration(format!("Invalid year in month '{raw}'")))?;
    let month: u32 = parts[1]
        .parse()
        .map_err(|_| Error::configuration(format!("Invalid month in '{raw}'")))?;

    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| Error::configuration(format!("Invalid month '{raw}'")))?;
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| Error::configuration(format!("Invalid month '{raw}'")))?;
    let end = next_month.pred_opt().expect("first of month has a predecessor");

    DateRange::new(start, end)
}

/// Resolve optional --month / --start-date / --end-date flags into one
/// range. Both endpoints must be given together.
pub fn resolve_range(
    month: Option<&str>,
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Result<Option<DateRange>> {
    match (month, start_date, end_date) {
        (Some(month), None, None) => Ok(Some(month_range(month)?)),
        (None, Some(start), Some(end)) => {
            Ok(Some(DateRange::new(parse_date_arg(start)?, parse_date_arg(end)?)?))
        }
        (None, None, None) => Ok(None),
        (Some(_), _, _) => Err(Error::configuration(
            "--month cannot be combined with --start-date/--end-date",
        )),
        _ => Err(Error::configuration(
            "--start-date and --end-date must be given together",
        )),
    }
}

/// Arguments shared by every command
#[derive(Debug, Clone, Parser)]
pub struct CommonArgs {
    /// Path to configuration file
    ///
    /// JSON configuration listing tables, their columns, and analysis
    /// thresholds. If not specified, looks under the user config
    /// directory.
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        help = "Path to configuration file (JSON format)"
    )]
    pub config_file: Option<PathBuf>,

    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Suppress output (quiet mode)
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    /// Output format for results
    #[arg(
        long = "output-format",
        value_enum,
        default_value = "human",
        help = "Output format for results"
    )]
    pub output_format: OutputFormat,
}

impl CommonArgs {
    /// Determine the appropriate log level based on verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    /// Check if we should show progress bars (not in quiet mode)
    pub fn show_progress(&self) -> bool {
        !self.quiet && self.output_format == OutputFormat::Human
    }
}

/// Arguments for the load command
#[derive(Debug, Clone, Parser)]
pub struct LoadArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Delimited input file to load
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    pub file: PathBuf,

    /// Target table; must be present in the config
    #[arg(short = 't', long = "table", value_name = "NAME")]
    pub table: String,

    /// Expected first date of the file's data
    #[arg(long = "start-date", value_name = "DATE")]
    pub start_date: Option<String>,

    /// Expected last date of the file's data
    #[arg(long = "end-date", value_name = "DATE")]
    pub end_date: Option<String>,

    /// Field delimiter (single character; default tab)
    #[arg(long = "delimiter", value_name = "CHAR")]
    pub delimiter: Option<char>,

    /// Maximum seconds to wait for the COPY to finish
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout_secs: Option<u64>,
}

impl LoadArgs {
    /// Validate the load command arguments for consistency
    pub fn validate(&self) -> Result<()> {
        if !self.file.exists() {
            return Err(Error::configuration(format!(
                "Input file does not exist: {}",
                self.file.display()
            )));
        }
        if self.start_date.is_some() != self.end_date.is_some() {
            return Err(Error::configuration(
                "--start-date and --end-date must be given together",
            ));
        }
        if let Some(delimiter) = self.delimiter {
            if !delimiter.is_ascii() {
                return Err(Error::configuration(
                    "Delimiter must be a single ASCII character",
                ));
            }
        }
        Ok(())
    }

    /// Resolve the expected date range, if both endpoints were given
    pub fn expected_range(&self) -> Result<Option<DateRange>> {
        resolve_range(None, self.start_date.as_deref(), self.end_date.as_deref())
    }
}

/// Arguments for the validate command
#[derive(Debug, Clone, Parser)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Table to validate; all configured tables when omitted
    #[arg(short = 't', long = "table", value_name = "NAME")]
    pub table: Option<String>,

    /// Restrict the window to one month (YYYY-MM)
    #[arg(
        long = "month",
        value_name = "YYYY-MM",
        conflicts_with_all = ["start_date", "end_date"]
    )]
    pub month: Option<String>,

    /// Window start date
    #[arg(long = "start-date", value_name = "DATE")]
    pub start_date: Option<String>,

    /// Window end date
    #[arg(long = "end-date", value_name = "DATE")]
    pub end_date: Option<String>,

    /// Write the machine-readable result to this file
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,
}

impl ValidateArgs {
    /// Resolve the analysis window from the month/date flags
    pub fn resolve_range(&self) -> Result<Option<DateRange>> {
        resolve_range(
            self.month.as_deref(),
            self.start_date.as_deref(),
            self.end_date.as_deref(),
        )
    }
}

/// Arguments for the check-duplicates command
#[derive(Debug, Clone, Parser)]
pub struct CheckDuplicatesArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Table to analyze
    #[arg(short = 't', long = "table", value_name = "NAME")]
    pub table: String,

    /// Comma-separated ordered key columns
    #[arg(short = 'k', long = "key-columns", value_name = "LIST")]
    pub key_columns: ColumnList,

    /// Date column for range scoping and date-key normalization
    #[arg(long = "date-column", value_name = "NAME")]
    pub date_column: Option<String>,

    /// Scope start date
    #[arg(long = "start-date", value_name = "DATE", requires = "date_column")]
    pub start_date: Option<String>,

    /// Scope end date
    #[arg(long = "end-date", value_name = "DATE", requires = "date_column")]
    pub end_date: Option<String>,

    /// Offending key tuples to show
    #[arg(long = "sample-limit", value_name = "N", default_value_t = crate::constants::DEFAULT_DUPLICATE_SAMPLE)]
    pub sample_limit: usize,
}

impl CheckDuplicatesArgs {
    /// Resolve the scoping range from the date flags
    pub fn resolve_range(&self) -> Result<Option<DateRange>> {
        resolve_range(None, self.start_date.as_deref(), self.end_date.as_deref())
    }
}

/// Arguments for the report command
#[derive(Debug, Clone, Parser)]
pub struct ReportArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Glob filter on table names (e.g. "sales_*")
    #[arg(long = "table-filter", value_name = "GLOB")]
    pub table_filter: Option<String>,

    /// Number of parallel table workers
    ///
    /// Clamped to the warehouse pool size minus a safety margin: a
    /// worker without a connection would only deadlock the run.
    #[arg(short = 'j', long = "max-workers", value_name = "COUNT")]
    pub max_workers: Option<usize>,

    /// Write the JSON report to this file
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,
}

impl ReportArgs {
    /// Validate the report command arguments for consistency
    pub fn validate(&self) -> Result<()> {
        if let Some(workers) = self.max_workers {
            if workers == 0 {
                return Err(Error::configuration(
                    "Number of workers must be greater than 0",
                ));
            }
            if workers > 100 {
                return Err(Error::configuration(
                    "Number of workers cannot exceed 100",
                ));
            }
        }
        if let Some(output) = &self.output {
            if let Some(parent) = output.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(Error::configuration(format!(
                        "Output directory does not exist: {}",
                        parent.display()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Arguments for the delete command
#[derive(Debug, Clone, Parser)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Table to delete from
    #[arg(short = 't', long = "table", value_name = "NAME")]
    pub table: String,

    /// First date to delete (inclusive)
    #[arg(long = "start-date", value_name = "DATE")]
    pub start_date: String,

    /// Last date to delete (inclusive)
    #[arg(long = "end-date", value_name = "DATE")]
    pub end_date: String,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long = "yes")]
    pub assume_yes: bool,
}

impl DeleteArgs {
    /// Resolve the mandatory deletion range
    pub fn resolve_range(&self) -> Result<DateRange> {
        DateRange::new(
            parse_date_arg(&self.start_date)?,
            parse_date_arg(&self.end_date)?,
        )
    }
}

impl Args {
    /// Get the command if one was specified
    pub fn get_command(&self) -> Commands {
        self.command
            .clone()
            .expect("Command should be present when get_command() is called")
    }
}
