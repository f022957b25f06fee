//! Warehouse connection handling and identifier safety
//!
//! Wraps a sqlx connection pool with the pieces the analyzers need:
//! existence/column introspection via information_schema, a per-run
//! column cache, query timeouts, and strict identifier quoting for
//! dynamic table/column names.

use crate::constants::{
    DEFAULT_QUERY_TIMEOUT_SECS, ENV_WAREHOUSE_URL, POOL_SAFETY_MARGIN,
};
use crate::{Error, Result};
use regex::Regex;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

static IDENT_PATTERN: OnceLock<Regex> = OnceLock::new();

fn ident_pattern() -> &'static Regex {
    IDENT_PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid pattern"))
}

/// Validate and double-quote an identifier for use in dynamic SQL.
///
/// Identifiers outside the safe charset are rejected outright rather
/// than escaped; config-supplied names have no business containing
/// quotes or whitespace.
pub fn quote_ident(name: &str) -> Result<String> {
    if name.len() > 63 || !ident_pattern().is_match(name) {
        return Err(Error::unsafe_identifier(name));
    }
    Ok(format!("\"{name}\""))
}

/// Run a future under a wait budget, surfacing a typed timeout error
pub async fn with_timeout<T, F>(operation: &str, budget: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(budget, future).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(operation, budget.as_secs())),
    }
}

/// Shared warehouse access for one process
#[derive(Debug, Clone)]
pub struct WarehouseClient {
    pool: PgPool,
    max_connections: u32,
    query_timeout: Duration,
}

impl WarehouseClient {
    /// Connect using the URL from the environment
    pub async fn connect_from_env(max_connections: u32) -> Result<Self> {
        let url = std::env::var(ENV_WAREHOUSE_URL).map_err(|_| {
            Error::configuration(format!("Missing environment variable {ENV_WAREHOUSE_URL}"))
        })?;
        Self::connect(&url, max_connections).await
    }

    /// Connect to the warehouse with a bounded pool
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| Error::warehouse("connecting to warehouse", e))?;

        debug!("Connected to warehouse with pool of {max_connections}");
        Ok(Self {
            pool,
            max_connections,
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        })
    }

    /// Wrap an existing pool (used by tests against a local database)
    pub fn from_pool(pool: PgPool, max_connections: u32) -> Self {
        Self {
            pool,
            max_connections,
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        }
    }

    /// Override the per-query wait budget
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    /// Upper bound for concurrent table workers: never more than the
    /// pool can serve minus a safety margin, and at least one
    pub fn max_workers(&self) -> usize {
        self.max_connections.saturating_sub(POOL_SAFETY_MARGIN).max(1) as usize
    }

    /// Connectivity check; also used as a session keepalive
    pub async fn ping(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::warehouse("warehouse ping failed", e))?;
        Ok(())
    }

    /// Whether a table exists in the public schema
    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )
            "#,
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::warehouse(format!("checking existence of table '{table}'"), e))?;

        Ok(exists)
    }

    /// Ordered column names of a table
    pub async fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let columns: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT column_name::text
            FROM information_schema.columns
            WHERE table_schema = 'public' AND table_name = $1
            ORDER BY ordinal_position
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::warehouse(format!("reading columns of table '{table}'"), e))?;

        if columns.is_empty() {
            return Err(Error::table_not_found(table));
        }
        Ok(columns)
    }

    /// Declared type of one column, lowercased (e.g. `date`, `text`)
    pub async fn column_type(&self, table: &str, column: &str) -> Result<String> {
        let data_type: Option<String> = sqlx::query_scalar(
            r#"
            SELECT lower(data_type)::text
            FROM information_schema.columns
            WHERE table_schema = 'public' AND table_name = $1 AND column_name = $2
            "#,
        )
        .bind(table)
        .bind(column)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::warehouse(format!("reading type of column '{table}.{column}'"), e)
        })?;

        data_type.ok_or_else(|| {
            Error::configuration(format!("Column '{column}' does not exist on table '{table}'"))
        })
    }
}

/// Per-run cache of table column lists.
///
/// Scoped to one aggregator run and passed in explicitly; concurrent
/// report runs each get their own cache, so there is nothing to
/// invalidate across runs.
#[derive(Debug, Default)]
pub struct TableColumnCache {
    columns: Mutex<HashMap<String, Vec<String>>>,
}

impl TableColumnCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a table's columns, hitting the warehouse only on first use
    pub async fn columns(&self, client: &WarehouseClient, table: &str) -> Result<Vec<String>> {
        {
            let cached = self.columns.lock().await;
            if let Some(columns) = cached.get(table) {
                return Ok(columns.clone());
            }
        }

        let columns = client.table_columns(table).await?;
        self.columns
            .lock()
            .await
            .insert(table.to_string(), columns.clone());
        Ok(columns)
    }
}
