//! Configuration management and validation.
//!
//! Provides the JSON config file structures (per-table specs) and the
//! threshold configuration consumed by the anomaly and duplicate
//! analyzers. Thresholds carry builder-style overrides so report-level
//! severity aggregation can be tuned without code changes.

use crate::constants::{
    self, DEFAULT_DUPLICATE_SAMPLE, DEFAULT_POOL_CONNECTIONS, MAX_ANOMALY_RECORDS,
    anomaly_defaults, duplicate_defaults,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

// =============================================================================
// Analyzer Thresholds
// =============================================================================

/// Classification thresholds for the row-count anomaly detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyThresholds {
    /// A date below this fraction of the window mean is SEVERELY_LOW
    pub severe_fraction: f64,

    /// A date below this fraction of the window mean is LOW
    pub low_fraction: f64,

    /// Tukey fence multiplier applied to the IQR
    pub iqr_multiplier: f64,

    /// Maximum anomaly records returned per window
    pub max_records: usize,
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        Self {
            severe_fraction: anomaly_defaults::SEVERE_FRACTION,
            low_fraction: anomaly_defaults::LOW_FRACTION,
            iqr_multiplier: anomaly_defaults::IQR_MULTIPLIER,
            max_records: MAX_ANOMALY_RECORDS,
        }
    }
}

impl AnomalyThresholds {
    /// Override the severe fraction
    pub fn with_severe_fraction(mut self, fraction: f64) -> Self {
        self.severe_fraction = fraction;
        self
    }

    /// Override the low fraction
    pub fn with_low_fraction(mut self, fraction: f64) -> Self {
        self.low_fraction = fraction;
        self
    }

    /// Override the IQR fence multiplier
    pub fn with_iqr_multiplier(mut self, multiplier: f64) -> Self {
        self.iqr_multiplier = multiplier;
        self
    }

    /// Validate threshold consistency before use
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.severe_fraction) {
            return Err(Error::configuration(format!(
                "severe_fraction {} must be in [0, 1)",
                self.severe_fraction
            )));
        }
        if !(0.0..1.0).contains(&self.low_fraction) {
            return Err(Error::configuration(format!(
                "low_fraction {} must be in [0, 1)",
                self.low_fraction
            )));
        }
        if self.severe_fraction >= self.low_fraction {
            return Err(Error::configuration(format!(
                "severe_fraction {} must be below low_fraction {}",
                self.severe_fraction, self.low_fraction
            )));
        }
        if self.iqr_multiplier <= 0.0 {
            return Err(Error::configuration(format!(
                "iqr_multiplier {} must be positive",
                self.iqr_multiplier
            )));
        }
        Ok(())
    }
}

/// Severity thresholds for the duplicate-key analyzer.
///
/// Percentages are duplicate (excess) rows as a share of total rows; the
/// boundaries are inclusive, so a share of exactly `critical_percent`
/// grades CRITICAL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateThresholds {
    pub critical_percent: f64,
    pub high_percent: f64,
    pub medium_percent: f64,

    pub critical_max_group: i64,
    pub high_max_group: i64,
    pub medium_max_group: i64,

    /// Offending key tuples retained as a sample
    pub sample_limit: usize,
}

impl Default for DuplicateThresholds {
    fn default() -> Self {
        Self {
            critical_percent: duplicate_defaults::CRITICAL_PERCENT,
            high_percent: duplicate_defaults::HIGH_PERCENT,
            medium_percent: duplicate_defaults::MEDIUM_PERCENT,
            critical_max_group: duplicate_defaults::CRITICAL_MAX_GROUP,
            high_max_group: duplicate_defaults::HIGH_MAX_GROUP,
            medium_max_group: duplicate_defaults::MEDIUM_MAX_GROUP,
            sample_limit: DEFAULT_DUPLICATE_SAMPLE,
        }
    }
}

impl DuplicateThresholds {
    /// Override the sample size of offending keys
    pub fn with_sample_limit(mut self, limit: usize) -> Self {
        self.sample_limit = limit;
        self
    }

    /// Validate threshold ordering before use
    pub fn validate(&self) -> Result<()> {
        if !(self.medium_percent < self.high_percent && self.high_percent < self.critical_percent)
        {
            return Err(Error::configuration(format!(
                "duplicate percent thresholds must be ordered: {} < {} < {}",
                self.medium_percent, self.high_percent, self.critical_percent
            )));
        }
        if !(self.medium_max_group < self.high_max_group
            && self.high_max_group < self.critical_max_group)
        {
            return Err(Error::configuration(format!(
                "duplicate group-size thresholds must be ordered: {} < {} < {}",
                self.medium_max_group, self.high_max_group, self.critical_max_group
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Table Specs (JSON config file)
// =============================================================================

/// One table entry from the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Warehouse table name
    pub table_name: String,

    /// Column holding the observation date
    pub date_column: String,

    /// Ordered column names the table and its files carry
    pub expected_columns: Vec<String>,

    /// Ordered uniqueness key, when the table has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_key_columns: Option<Vec<String>>,

    /// Glob pattern matching this table's input files
    pub file_pattern: String,
}

impl TableSpec {
    /// Validate column membership invariants
    pub fn validate(&self) -> Result<()> {
        if self.table_name.trim().is_empty() {
            return Err(Error::configuration("Table name cannot be empty"));
        }
        if self.expected_columns.is_empty() {
            return Err(Error::configuration(format!(
                "Table '{}' has no expected columns",
                self.table_name
            )));
        }
        if !self.expected_columns.contains(&self.date_column) {
            return Err(Error::configuration(format!(
                "Table '{}': date column '{}' is not among expected columns",
                self.table_name, self.date_column
            )));
        }
        if let Some(keys) = &self.duplicate_key_columns {
            for key in keys {
                if !self.expected_columns.contains(key) {
                    return Err(Error::configuration(format!(
                        "Table '{}': duplicate-key column '{}' is not among expected columns",
                        self.table_name, key
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Top-level config file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Per-table file/validation specs
    pub files: Vec<TableSpec>,

    /// Warehouse pool size
    #[serde(default = "default_pool_connections")]
    pub max_connections: u32,

    /// Anomaly detector thresholds
    #[serde(default)]
    pub anomaly: AnomalyThresholds,

    /// Duplicate analyzer thresholds
    #[serde(default)]
    pub duplicates: DuplicateThresholds,
}

fn default_pool_connections() -> u32 {
    DEFAULT_POOL_CONNECTIONS
}

impl Config {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::configuration(format!(
                "Config file does not exist: {}",
                path.display()
            )));
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::io(format!("reading config {}", path.display()), e))?;
        let config: Config = serde_json::from_str(&contents).map_err(|e| {
            Error::configuration(format!("Invalid config {}: {e}", path.display()))
        })?;

        config.validate()?;
        debug!(
            "Loaded config from {} with {} table specs",
            path.display(),
            config.files.len()
        );
        Ok(config)
    }

    /// Default config file location under the user config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(constants::DEFAULT_CONFIG_FILE))
    }

    /// Validate every table spec and the threshold blocks
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(Error::configuration("max_connections must be positive"));
        }
        for spec in &self.files {
            spec.validate()?;
        }
        self.anomaly.validate()?;
        self.duplicates.validate()?;
        Ok(())
    }

    /// Look up one table's spec by name
    pub fn table_spec(&self, table_name: &str) -> Result<&TableSpec> {
        self.files
            .iter()
            .find(|spec| spec.table_name == table_name)
            .ok_or_else(|| {
                Error::configuration(format!("Table '{table_name}' is not in the config"))
            })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            max_connections: DEFAULT_POOL_CONNECTIONS,
            anomaly: AnomalyThresholds::default(),
            duplicates: DuplicateThresholds::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn spec() -> TableSpec {
        TableSpec {
            table_name: "events".to_string(),
            date_column: "event_date".to_string(),
            expected_columns: vec![
                "event_date".to_string(),
                "account_id".to_string(),
                "amount".to_string(),
            ],
            duplicate_key_columns: Some(vec![
                "event_date".to_string(),
                "account_id".to_string(),
            ]),
            file_pattern: "events_*.tsv".to_string(),
        }
    }

    #[test]
    fn test_table_spec_validation() {
        assert!(spec().validate().is_ok());

        let mut bad = spec();
        bad.date_column = "nope".to_string();
        assert!(bad.validate().is_err());

        let mut bad = spec();
        bad.duplicate_key_columns = Some(vec!["nope".to_string()]);
        assert!(bad.validate().is_err());

        let mut bad = spec();
        bad.expected_columns.clear();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_anomaly_thresholds_validation() {
        assert!(AnomalyThresholds::default().validate().is_ok());
        assert!(
            AnomalyThresholds::default()
                .with_severe_fraction(0.8)
                .validate()
                .is_err()
        );
        assert!(
            AnomalyThresholds::default()
                .with_iqr_multiplier(-1.0)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_duplicate_thresholds_validation() {
        assert!(DuplicateThresholds::default().validate().is_ok());

        let mut bad = DuplicateThresholds::default();
        bad.medium_percent = 20.0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_config_load_round_trip() {
        let config = Config {
            files: vec![spec()],
            ..Default::default()
        };

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string_pretty(&config).unwrap().as_bytes())
            .unwrap();

        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.table_spec("events").unwrap().table_name, "events");
        assert!(loaded.table_spec("missing").is_err());
    }

    #[test]
    fn test_config_defaults_applied() {
        let json = r#"{"files": []}"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(loaded.max_connections, DEFAULT_POOL_CONNECTIONS);
        assert_eq!(loaded.anomaly, AnomalyThresholds::default());
    }

    #[test]
    fn test_missing_config_file() {
        let result = Config::load(Path::new("/nonexistent/config.json"));
        assert!(result.is_err());
    }
}
