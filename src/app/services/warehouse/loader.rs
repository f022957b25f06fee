//! COPY-based loading and scoped deletion
//!
//! The loader is deliberately thin: the interesting work is the
//! fail-fast quality gate in front of it. A file only starts streaming
//! into the warehouse after its schema matched and its dates checked
//! out. The COPY itself runs under a wait budget with periodic
//! keepalive pings so an idle-session reaper cannot reclaim the
//! warehouse session mid-load.

use crate::app::models::{DateRange, FileDescriptor};
use crate::app::services::file_quality::checker::{FileQualityChecker, FileValidationResult};
use crate::app::services::warehouse::client::{WarehouseClient, quote_ident, with_timeout};
use crate::config::DuplicateThresholds;
use crate::constants::DEFAULT_LOAD_TIMEOUT_SECS;
use crate::{Error, Result};
use std::time::Duration;
use tracing::{info, warn};

/// Outcome of one load attempt
#[derive(Debug)]
pub struct LoadOutcome {
    /// The gate's findings, always present
    pub validation: FileValidationResult,

    /// Rows loaded; `None` when the gate refused the file
    pub rows_loaded: Option<u64>,
}

impl LoadOutcome {
    pub fn loaded(&self) -> bool {
        self.rows_loaded.is_some()
    }
}

/// SQL literal for the COPY delimiter option
fn delimiter_literal(delimiter: u8) -> Result<String> {
    match delimiter {
        b'\t' => Ok("E'\\t'".to_string()),
        b'\'' | b'\\' | b'"' => Err(Error::configuration(
            "Quote and escape characters cannot be used as field delimiters",
        )),
        c if c.is_ascii_graphic() || c == b' ' => Ok(format!("'{}'", c as char)),
        other => Err(Error::configuration(format!(
            "Unsupported delimiter byte {other:#04x}"
        ))),
    }
}

/// Loader bound to a warehouse client
#[derive(Debug)]
pub struct WarehouseLoader<'a> {
    client: &'a WarehouseClient,
    load_timeout: Duration,
}

impl<'a> WarehouseLoader<'a> {
    pub fn new(client: &'a WarehouseClient) -> Self {
        Self {
            client,
            load_timeout: Duration::from_secs(DEFAULT_LOAD_TIMEOUT_SECS),
        }
    }

    /// Override the load wait budget
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// Validate a file and, if it passes the gate, stream it into its
    /// target table with COPY FROM STDIN.
    pub async fn load(
        &self,
        descriptor: &FileDescriptor,
        thresholds: &DuplicateThresholds,
    ) -> Result<LoadOutcome> {
        // Quality gate: a full streaming scan is blocking work, so it
        // runs off the async executor
        let gate_descriptor = descriptor.clone();
        let gate_thresholds = thresholds.clone();
        let validation = tokio::task::spawn_blocking(move || {
            FileQualityChecker::new(gate_descriptor).validate_file(None, &gate_thresholds, None)
        })
        .await
        .map_err(|e| Error::processing_interrupted(format!("quality gate task failed: {e}")))??;

        if !validation.is_loadable() {
            warn!(
                "Refusing to load {}: schema matched={}, completeness ok={}",
                descriptor.path.display(),
                validation.schema.matched,
                validation
                    .completeness
                    .as_ref()
                    .map(|c| c.is_complete())
                    .unwrap_or(false)
            );
            return Ok(LoadOutcome {
                validation,
                rows_loaded: None,
            });
        }

        if !self.client.table_exists(&descriptor.table_name).await? {
            return Err(Error::table_not_found(&descriptor.table_name));
        }

        let rows = self.copy_file(descriptor).await?;
        info!(
            "Loaded {} rows from {} into '{}'",
            rows,
            descriptor.path.display(),
            descriptor.table_name
        );

        Ok(LoadOutcome {
            validation,
            rows_loaded: Some(rows),
        })
    }

    /// The COPY round-trip under its wait budget, with a keepalive ping
    /// on a second pooled connection every minute
    async fn copy_file(&self, descriptor: &FileDescriptor) -> Result<u64> {
        let quoted_table = quote_ident(&descriptor.table_name)?;
        let quoted_columns: Vec<String> = descriptor
            .expected_columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Result<_>>()?;
        let statement = format!(
            "COPY {quoted_table} ({columns}) FROM STDIN WITH \
             (FORMAT csv, DELIMITER {delimiter}, QUOTE '\"', HEADER true, NULL '\\N')",
            columns = quoted_columns.join(", "),
            delimiter = delimiter_literal(descriptor.delimiter)?,
        );

        let copy_work = async {
            let file = tokio::fs::File::open(&descriptor.path)
                .await
                .map_err(|e| Error::io(format!("opening {}", descriptor.path.display()), e))?;
            let mut conn = self
                .client
                .pool()
                .acquire()
                .await
                .map_err(|e| Error::warehouse("acquiring connection for COPY", e))?;
            let mut copy = conn
                .copy_in_raw(&statement)
                .await
                .map_err(|e| Error::warehouse("starting COPY", e))?;
            copy.read_from(file)
                .await
                .map_err(|e| Error::warehouse("streaming file into COPY", e))?;
            copy.finish()
                .await
                .map_err(|e| Error::warehouse("finishing COPY", e))
        };

        let keepalive = async {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            interval.tick().await; // first tick fires immediately
            loop {
                interval.tick().await;
                if let Err(e) = self.client.ping().await {
                    warn!("Keepalive ping failed during load: {e}");
                }
            }
        };

        with_timeout(
            format!("COPY into {}", descriptor.table_name).as_str(),
            self.load_timeout,
            async {
                tokio::select! {
                    result = copy_work => result,
                    // The keepalive loop never completes
                    _ = keepalive => unreachable!("keepalive loop is infinite"),
                }
            },
        )
        .await
    }

    /// Delete rows of a table within an inclusive date range, returning
    /// the number of rows removed. The range is mandatory: unscoped
    /// deletion is not something this tool offers.
    pub async fn delete_date_range(
        &self,
        table: &str,
        date_column: &str,
        range: DateRange,
    ) -> Result<u64> {
        if !self.client.table_exists(table).await? {
            return Err(Error::table_not_found(table));
        }

        let quoted_table = quote_ident(table)?;
        let quoted_date = quote_ident(date_column)?;
        let sql = format!(
            "DELETE FROM {quoted_table} WHERE {quoted_date}::date >= $1 AND {quoted_date}::date <= $2"
        );

        let result = sqlx::query(&sql)
            .bind(range.start)
            .bind(range.end)
            .execute(self.client.pool())
            .await
            .map_err(|e| Error::warehouse(format!("deleting from '{table}'"), e))?;

        info!(
            "Deleted {} rows from '{}' between {} and {}",
            result.rows_affected(),
            table,
            range.start,
            range.end
        );
        Ok(result.rows_affected())
    }
}
