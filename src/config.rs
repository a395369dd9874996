//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.revanomaly.toml` files.

use crate::detector::IsolationForestParams;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".revanomaly.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Input column names.
    #[serde(default)]
    pub columns: ColumnsConfig,

    /// CSV parsing settings.
    #[serde(default)]
    pub input: InputConfig,

    /// Detector settings.
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// Header names of the columns the pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnsConfig {
    #[serde(default = "default_region_column")]
    pub region: String,

    #[serde(default = "default_year_column")]
    pub year: String,

    #[serde(default = "default_revenue_type_column")]
    pub revenue_type: String,

    #[serde(default = "default_value_column")]
    pub value: String,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            region: default_region_column(),
            year: default_year_column(),
            revenue_type: default_revenue_type_column(),
            value: default_value_column(),
        }
    }
}

fn default_region_column() -> String {
    "UF".to_string()
}

fn default_year_column() -> String {
    "Ano".to_string()
}

fn default_revenue_type_column() -> String {
    "Tipo de arrecadação".to_string()
}

fn default_value_column() -> String {
    "Valor".to_string()
}

/// CSV parsing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Field delimiter (single ASCII character).
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Values use a comma as decimal separator and dots for thousands.
    #[serde(default)]
    pub decimal_comma: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            decimal_comma: false,
        }
    }
}

fn default_delimiter() -> char {
    ','
}

/// Isolation forest settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Expected fraction of anomalous rows.
    #[serde(default = "default_contamination")]
    pub contamination: f64,

    /// Random seed.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of trees in the forest.
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,

    /// Subsample size per tree.
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            contamination: default_contamination(),
            seed: default_seed(),
            n_estimators: default_n_estimators(),
            max_samples: default_max_samples(),
        }
    }
}

fn default_contamination() -> f64 {
    0.1
}

fn default_seed() -> u64 {
    42
}

fn default_n_estimators() -> usize {
    100
}

fn default_max_samples() -> usize {
    256
}

impl From<&DetectorConfig> for IsolationForestParams {
    fn from(config: &DetectorConfig) -> Self {
        Self {
            contamination: config.contamination,
            seed: config.seed,
            n_estimators: config.n_estimators,
            max_samples: config.max_samples,
        }
    }
}

/// Output format of the rendered report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Aligned text table (default)
    #[default]
    Table,
    /// Markdown report
    Markdown,
    /// JSON report
    Json,
    /// CSV table
    Csv,
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Output format.
    #[serde(default)]
    pub format: OutputFormat,

    /// How many anomalies to list in the ranked section.
    #[serde(default = "default_top_anomalies")]
    pub top_anomalies: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            top_anomalies: default_top_anomalies(),
        }
    }
}

fn default_top_anomalies() -> usize {
    10
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.revanomaly.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(DEFAULT_CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(contamination) = args.contamination {
            self.detector.contamination = contamination;
        }
        if let Some(seed) = args.seed {
            self.detector.seed = seed;
        }
        if let Some(n_estimators) = args.n_estimators {
            self.detector.n_estimators = n_estimators;
        }
        if let Some(max_samples) = args.max_samples {
            self.detector.max_samples = max_samples;
        }

        if let Some(delimiter) = args.delimiter {
            self.input.delimiter = delimiter;
        }
        if args.decimal_comma {
            self.input.decimal_comma = true;
        }

        if let Some(ref name) = args.region_column {
            self.columns.region = name.clone();
        }
        if let Some(ref name) = args.year_column {
            self.columns.year = name.clone();
        }
        if let Some(ref name) = args.revenue_type_column {
            self.columns.revenue_type = name.clone();
        }
        if let Some(ref name) = args.value_column {
            self.columns.value = name.clone();
        }

        if let Some(format) = args.format {
            self.report.format = format;
        }
        if let Some(top) = args.top {
            self.report.top_anomalies = top;
        }
    }

    /// Detector parameters derived from this configuration.
    pub fn detector_params(&self) -> IsolationForestParams {
        IsolationForestParams::from(&self.detector)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
