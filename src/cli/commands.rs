//! Command implementations for the warehouse auditor CLI
//!
//! This module contains command execution logic, progress reporting,
//! and human/JSON rendering. Commands return a process exit code: data
//! quality failures exit non-zero without being errors.

use crate::app::models::{DuplicateFinding, FileDescriptor, Severity, ValidationStatus};
use crate::app::services::aggregator::report::{
    MultiTableReport, ReportOptions, run_report,
};
use crate::app::services::aggregator::validator::TableValidation;
use crate::app::services::warehouse::client::WarehouseClient;
use crate::app::services::warehouse::duplicates::analyze_table_duplicates;
use crate::app::services::warehouse::loader::WarehouseLoader;
use crate::cli::args::{
    Args, CheckDuplicatesArgs, Commands, CommonArgs, DeleteArgs, LoadArgs, OutputFormat,
    ReportArgs, ValidateArgs,
};
use crate::config::Config;
use crate::constants::{DEFAULT_DELIMITER, DEFAULT_QUOTE};
use crate::{Error, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Main command runner
///
/// Returns the process exit code: 0 when every check passed, 1 when any
/// table FAILED or ERRORed or a load was refused.
pub async fn run(args: Args) -> Result<i32> {
    match args.get_command() {
        Commands::Load(load) => run_load(load).await,
        Commands::Validate(validate) => run_validate(validate).await,
        Commands::CheckDuplicates(check) => run_check_duplicates(check).await,
        Commands::Report(report) => run_report_command(report).await,
        Commands::Delete(delete) => run_delete(delete).await,
    }
}

/// Set up tracing with the level derived from -v/-q flags
pub fn setup_logging(common: &CommonArgs) {
    let filter = format!("warehouse_auditor={}", common.get_log_level());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from the --config flag or the default location
fn load_configuration(common: &CommonArgs) -> Result<Config> {
    let path = match &common.config_file {
        Some(path) => path.clone(),
        None => Config::default_path().ok_or_else(|| {
            Error::configuration("No config file given and no default config directory found")
        })?,
    };
    Config::load(&path)
}

async fn connect(config: &Config) -> Result<WarehouseClient> {
    WarehouseClient::connect_from_env(config.max_connections).await
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb
}

fn status_label(status: ValidationStatus) -> String {
    match status {
        ValidationStatus::Passed => status.to_string().green().to_string(),
        ValidationStatus::Warning => status.to_string().yellow().to_string(),
        ValidationStatus::Failed => status.to_string().red().to_string(),
        ValidationStatus::Error => status.to_string().red().bold().to_string(),
        other => other.to_string(),
    }
}

// =============================================================================
// load
// =============================================================================

async fn run_load(args: LoadArgs) -> Result<i32> {
    setup_logging(&args.common);
    args.validate()?;
    let config = load_configuration(&args.common)?;

    let spec = config.table_spec(&args.table)?;
    let descriptor = FileDescriptor::new(
        args.file.clone(),
        spec.table_name.clone(),
        spec.expected_columns.clone(),
        spec.date_column.clone(),
        args.expected_range()?,
        spec.duplicate_key_columns.clone(),
        args.delimiter.map(|c| c as u8).unwrap_or(DEFAULT_DELIMITER),
        DEFAULT_QUOTE,
    )?;

    let client = connect(&config).await?;
    let mut loader = WarehouseLoader::new(&client);
    if let Some(secs) = args.timeout_secs {
        loader = loader.with_load_timeout(Duration::from_secs(secs));
    }

    let start = Instant::now();
    info!("Loading {} into '{}'", args.file.display(), args.table);
    let outcome = loader.load(&descriptor, &config.duplicates).await?;
    let loaded = outcome.loaded();

    match args.common.output_format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "table": args.table,
                "file": args.file,
                "loaded": loaded,
                "rows_loaded": outcome.rows_loaded,
                "schema": outcome.validation.schema,
                "completeness": outcome.validation.completeness,
                "duplicates": outcome.validation.duplicates,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Human => match outcome.rows_loaded {
            Some(rows) => {
                println!(
                    "{} loaded {} rows into '{}' in {:.1}s",
                    "OK".green().bold(),
                    rows,
                    args.table,
                    start.elapsed().as_secs_f64()
                );
            }
            None => {
                println!(
                    "{} file failed the quality gate; nothing was loaded",
                    "REFUSED".red().bold()
                );
                if !outcome.validation.schema.matched {
                    println!(
                        "  schema: expected {} columns, found {} (missing: {:?})",
                        outcome.validation.schema.expected_count,
                        outcome.validation.schema.actual_count,
                        outcome.validation.schema.missing_columns
                    );
                }
                if let Some(completeness) = &outcome.validation.completeness {
                    if !completeness.is_complete() {
                        println!(
                            "  completeness: {} missing dates, {} gaps",
                            completeness.missing_dates.len(),
                            completeness.gaps.len()
                        );
                    }
                }
            }
        },
    }

    Ok(if loaded { 0 } else { 1 })
}

// =============================================================================
// validate / report
// =============================================================================

async fn run_validate(args: ValidateArgs) -> Result<i32> {
    setup_logging(&args.common);
    let config = load_configuration(&args.common)?;
    let range = args.resolve_range()?;

    // Fail on unknown table names before touching the warehouse
    if let Some(table) = &args.table {
        config.table_spec(table)?;
    }

    let client = connect(&config).await?;
    let options = ReportOptions {
        table_filter: args.table.clone(),
        range,
        max_workers: None,
    };

    let progress = args.common.show_progress().then(|| spinner("Validating"));
    let report = run_report(&client, &config, &options, progress.as_ref()).await?;
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    if let Some(output) = &args.output {
        report.write_json(output)?;
    }

    match args.common.output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Human => render_report(&report, true),
    }

    Ok(if report.has_failures() { 1 } else { 0 })
}

async fn run_report_command(args: ReportArgs) -> Result<i32> {
    setup_logging(&args.common);
    args.validate()?;
    let config = load_configuration(&args.common)?;

    let client = connect(&config).await?;
    let options = ReportOptions {
        table_filter: args.table_filter.clone(),
        range: None,
        max_workers: args.max_workers,
    };

    let progress = if args.common.show_progress() {
        let pb = ProgressBar::new(config.files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.set_message("Validating tables");
        Some(pb)
    } else {
        None
    };

    let start = Instant::now();
    let report = run_report(&client, &config, &options, progress.as_ref()).await?;
    if let Some(pb) = &progress {
        pb.finish_with_message(format!("done in {:.1}s", start.elapsed().as_secs_f64()));
    }

    if let Some(output) = &args.output {
        report.write_json(output)?;
    }

    match args.common.output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Human => render_report(&report, false),
    }

    Ok(if report.has_failures() { 1 } else { 0 })
}

fn render_report(report: &MultiTableReport, detailed: bool) {
    println!();
    println!("Validation Summary");
    println!("==================");
    println!(
        "  tables: {}   passed: {}   warnings: {}   failed: {}   errors: {}",
        report.summary.total_tables,
        report.summary.passed.to_string().green(),
        report.summary.warnings.to_string().yellow(),
        report.summary.failed.to_string().red(),
        report.summary.errors.to_string().red()
    );

    if !report.summary.largest_tables.is_empty() {
        println!();
        println!("Largest tables:");
        for entry in &report.summary.largest_tables {
            println!("  {:<32} {:>12} rows", entry.table, entry.total_rows);
        }
    }

    println!();
    for (name, validation) in &report.tables {
        println!("{} {}", status_label(validation.status), name.bold());
        render_table_detail(validation, detailed);
    }
}

fn render_table_detail(validation: &TableValidation, detailed: bool) {
    if let Some(error) = &validation.error {
        println!("    could not run: {error}");
        return;
    }
    let Some(verdict) = &validation.verdict else {
        return;
    };

    for reason in &verdict.failure_reasons {
        println!("    {} {reason}", "-".red());
    }

    if let Some(completeness) = &verdict.completeness {
        println!(
            "    rows: {}, dates: {}/{} expected",
            completeness.total_rows, completeness.unique_dates, completeness.expected_dates
        );
        if detailed && !completeness.missing_dates.is_empty() {
            let preview: Vec<&str> = completeness
                .missing_dates
                .iter()
                .take(10)
                .map(String::as_str)
                .collect();
            let suffix = if completeness.missing_dates.len() > 10 {
                format!(" (+{} more)", completeness.missing_dates.len() - 10)
            } else {
                String::new()
            };
            println!("    missing: {}{}", preview.join(", "), suffix);
        }
        if detailed {
            for gap in &completeness.gaps {
                println!(
                    "    gap: {} .. {} ({} days)",
                    gap.before, gap.after, gap.missing_days
                );
            }
        }
    }

    for anomaly in &verdict.anomalies {
        println!(
            "    {} {}: {} rows ({:.1}% of {:.0} avg)",
            anomaly.severity.to_string().yellow(),
            anomaly.date,
            anomaly.row_count,
            anomaly.percent_of_average,
            anomaly.expected_count
        );
    }

    if let Some(duplicates) = &verdict.duplicates {
        if duplicates.duplicate_keys > 0 {
            render_duplicates(duplicates, detailed);
        }
    }
}

// =============================================================================
// check-duplicates
// =============================================================================

async fn run_check_duplicates(args: CheckDuplicatesArgs) -> Result<i32> {
    setup_logging(&args.common);
    let config = load_configuration(&args.common)?;
    let range = args.resolve_range()?;

    let client = connect(&config).await?;
    let thresholds = config.duplicates.clone().with_sample_limit(args.sample_limit);

    debug!(
        "Checking duplicates on '{}' over key {:?}",
        args.table, args.key_columns.columns
    );
    let finding = analyze_table_duplicates(
        &client,
        &args.table,
        &args.key_columns.columns,
        args.date_column.as_deref(),
        range,
        &thresholds,
    )
    .await?;

    match args.common.output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&finding)?),
        OutputFormat::Human => {
            if finding.duplicate_keys == 0 {
                println!(
                    "{} no duplicate keys in '{}' ({} rows)",
                    "OK".green().bold(),
                    args.table,
                    finding.total_rows
                );
            } else {
                render_duplicates(&finding, true);
            }
        }
    }

    Ok(if finding.severity == Severity::Critical {
        1
    } else {
        0
    })
}

fn render_duplicates(finding: &DuplicateFinding, detailed: bool) {
    println!(
        "    duplicates [{}]: {} keys, {} excess rows ({:.2}% of {}), max group {}",
        finding.severity,
        finding.duplicate_keys,
        finding.excess_rows,
        finding.duplicate_percent,
        finding.total_rows,
        finding.max_duplicates
    );
    if detailed {
        for sample in &finding.samples {
            println!("      ({}) x{}", sample.key.join(", "), sample.count);
        }
    }
}

// =============================================================================
// delete
// =============================================================================

async fn run_delete(args: DeleteArgs) -> Result<i32> {
    setup_logging(&args.common);
    let config = load_configuration(&args.common)?;
    let spec = config.table_spec(&args.table)?;
    let range = args.resolve_range()?;

    if !args.assume_yes {
        print!(
            "Delete rows of '{}' from {} to {} inclusive? [y/N] ",
            args.table, range.start, range.end
        );
        std::io::stdout().flush().map_err(Error::from)?;
        let mut answer = String::new();
        std::io::stdin()
            .read_line(&mut answer)
            .map_err(Error::from)?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("Aborted.");
            return Ok(1);
        }
    }

    let client = connect(&config).await?;
    let loader = WarehouseLoader::new(&client);
    let deleted = loader
        .delete_date_range(&args.table, &spec.date_column, range)
        .await?;

    match args.common.output_format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "table": args.table,
                    "start_date": range.start,
                    "end_date": range.end,
                    "rows_deleted": deleted,
                })
            );
        }
        OutputFormat::Human => {
            println!(
                "{} deleted {} rows from '{}'",
                "OK".green().bold(),
                deleted,
                args.table
            );
        }
    }

    Ok(0)
}
