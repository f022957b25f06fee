//! Warehouse-side analysis and loading
//!
//! Everything here delegates the heavy lifting to the warehouse:
//! aggregate and window queries for completeness, GROUP BY/HAVING for
//! duplicate keys, and COPY FROM STDIN for loading. Table and column
//! names from config pass through strict identifier quoting before they
//! ever reach a SQL string; values always travel as bind parameters.

pub mod client;
pub mod completeness;
pub mod duplicates;
pub mod loader;

pub use client::{TableColumnCache, WarehouseClient, quote_ident};
pub use completeness::WarehouseCompletenessAnalyzer;
pub use duplicates::analyze_table_duplicates;
pub use loader::WarehouseLoader;
