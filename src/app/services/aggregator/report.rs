//! Multi-table validation reports
//!
//! Analyzes many tables concurrently with a worker pool bounded by the
//! warehouse pool size, collects per-table outcomes into a map (arrival
//! order does not matter), and renders a deterministic JSON document
//! with an aggregate summary.

use crate::app::models::{DateRange, ValidationStatus};
use crate::app::services::aggregator::validator::{TableValidation, ValidationAggregator};
use crate::app::services::warehouse::client::{TableColumnCache, WarehouseClient};
use crate::config::Config;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// How many of the biggest tables the summary lists
const LARGEST_TABLE_COUNT: usize = 5;

/// Options for a multi-table report run
#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    /// Glob filter on table names; `None` runs every configured table
    pub table_filter: Option<String>,

    /// Restrict every table's analysis window
    pub range: Option<DateRange>,

    /// Requested worker count; clamped to what the connection pool can
    /// actually serve
    pub max_workers: Option<usize>,
}

/// One of the largest tables by row count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LargestTable {
    pub table: String,
    pub total_rows: i64,
}

/// Aggregate counts across a report run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_tables: usize,
    pub passed: usize,
    pub warnings: usize,
    pub failed: usize,
    pub errors: usize,
    pub tables_with_issues: Vec<String>,
    pub largest_tables: Vec<LargestTable>,
}

/// The persisted report document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiTableReport {
    pub generated_at: DateTime<Utc>,
    pub tables: BTreeMap<String, TableValidation>,
    pub summary: ReportSummary,
}

impl MultiTableReport {
    /// True when any table FAILED or ERRORed; drives the exit code
    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0 || self.summary.errors > 0
    }

    /// Write the report as pretty-printed JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .map_err(|e| Error::io(format!("creating report file {}", path.display()), e))?;
        serde_json::to_writer_pretty(file, self)?;
        info!("Wrote validation report to {}", path.display());
        Ok(())
    }
}

/// Fold per-table outcomes into the aggregate summary
pub fn summarize(tables: &BTreeMap<String, TableValidation>) -> ReportSummary {
    let mut summary = ReportSummary {
        total_tables: tables.len(),
        passed: 0,
        warnings: 0,
        failed: 0,
        errors: 0,
        tables_with_issues: Vec::new(),
        largest_tables: Vec::new(),
    };

    let mut sized: Vec<LargestTable> = Vec::new();
    for (name, validation) in tables {
        match validation.status {
            ValidationStatus::Passed => summary.passed += 1,
            ValidationStatus::Warning => summary.warnings += 1,
            ValidationStatus::Failed => summary.failed += 1,
            ValidationStatus::Error => summary.errors += 1,
            ValidationStatus::NotRun | ValidationStatus::Running => {}
        }
        if !matches!(validation.status, ValidationStatus::Passed) {
            summary.tables_with_issues.push(name.clone());
        }
        if let Some(total_rows) = validation.total_rows() {
            sized.push(LargestTable {
                table: name.clone(),
                total_rows,
            });
        }
    }

    sized.sort_by(|a, b| b.total_rows.cmp(&a.total_rows).then(a.table.cmp(&b.table)));
    sized.truncate(LARGEST_TABLE_COUNT);
    summary.largest_tables = sized;
    summary
}

/// Run the full aggregator across the configured tables in parallel.
///
/// Worker count never exceeds the connection pool minus its safety
/// margin: a worker that cannot get a connection should not exist in
/// the first place. Per-table failures (including connectivity errors)
/// become ERROR records; siblings always run to completion.
pub async fn run_report(
    client: &WarehouseClient,
    config: &Config,
    options: &ReportOptions,
    progress: Option<&ProgressBar>,
) -> Result<MultiTableReport> {
    let filter = match &options.table_filter {
        Some(pattern) => Some(glob::Pattern::new(pattern).map_err(|e| {
            Error::configuration(format!("Invalid table filter '{pattern}': {e}"))
        })?),
        None => None,
    };

    let specs: Vec<_> = config
        .files
        .iter()
        .filter(|spec| {
            filter
                .as_ref()
                .map(|p| p.matches(&spec.table_name))
                .unwrap_or(true)
        })
        .collect();

    if specs.is_empty() {
        return Err(Error::configuration(
            "No configured tables match the report filter",
        ));
    }

    let workers = options
        .max_workers
        .unwrap_or_else(num_cpus::get)
        .clamp(1, client.max_workers());
    debug!(
        "Running report across {} tables with {} workers",
        specs.len(),
        workers
    );

    // One column cache per run; concurrent runs stay independent
    let column_cache = TableColumnCache::new();
    let aggregator = ValidationAggregator::new(
        client,
        &column_cache,
        config.anomaly.clone(),
        config.duplicates.clone(),
    );

    let tables: BTreeMap<String, TableValidation> = stream::iter(specs)
        .map(|spec| {
            let aggregator = &aggregator;
            let range = options.range;
            async move {
                let validation = aggregator.validate_table(spec, range).await;
                if let Some(pb) = progress {
                    pb.set_message(format!("{}: {}", validation.table, validation.status));
                    pb.inc(1);
                }
                (validation.table.clone(), validation)
            }
        })
        .buffer_unordered(workers)
        .collect()
        .await;

    let summary = summarize(&tables);
    info!(
        "Report complete: {} tables, {} passed, {} warnings, {} failed, {} errors",
        summary.total_tables, summary.passed, summary.warnings, summary.failed, summary.errors
    );

    Ok(MultiTableReport {
        generated_at: Utc::now(),
        tables,
        summary,
    })
}
