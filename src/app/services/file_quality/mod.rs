//! File-side quality checking
//!
//! This module scans delimited input files before they are loaded:
//! a cheap header-plus-sample schema check, and a single streaming pass
//! that produces date completeness and (when a key is configured)
//! duplicate-key findings with bounded memory.
//!
//! The expensive streaming pass only runs after the schema check
//! passes; a file whose header is already wrong never gets a full read.

pub mod checker;
pub mod schema_check;

#[cfg(test)]
pub mod tests;

pub use checker::{FileQualityChecker, FileValidationResult};
pub use schema_check::{ColumnType, SchemaCheckResult, check_schema};
