//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

pub use crate::config::OutputFormat;
use clap::Parser;
use std::path::PathBuf;

/// revanomaly - anomaly detection over aggregated tax revenue
///
/// Sums revenue by region, year and revenue type, fits an isolation
/// forest on the totals and labels each aggregate Anomalous or Normal.
///
/// Examples:
///   revanomaly --input arrecadacao.csv
///   revanomaly --input arrecadacao.csv --delimiter ';' --decimal-comma
///   revanomaly --input arrecadacao.csv --format markdown --output report.md
///   revanomaly --input arrecadacao.csv --aggregate-only
///   revanomaly --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// CSV dataset with region, year, revenue type and value columns
    #[arg(
        short,
        long,
        value_name = "FILE",
        required_unless_present = "init_config"
    )]
    pub input: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .revanomaly.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Expected fraction of anomalous rows, in (0, 0.5]
    #[arg(long, value_name = "FRACTION", env = "REVANOMALY_CONTAMINATION")]
    pub contamination: Option<f64>,

    /// Random seed of the isolation forest
    #[arg(long, value_name = "SEED", env = "REVANOMALY_SEED")]
    pub seed: Option<u64>,

    /// Number of trees in the isolation forest
    #[arg(long, value_name = "COUNT")]
    pub n_estimators: Option<usize>,

    /// Subsample size drawn for each tree
    #[arg(long, value_name = "COUNT")]
    pub max_samples: Option<usize>,

    /// CSV field delimiter
    #[arg(long, value_name = "CHAR")]
    pub delimiter: Option<char>,

    /// Parse values written as 1.234,56
    #[arg(long)]
    pub decimal_comma: bool,

    /// Header of the region column
    #[arg(long, value_name = "NAME")]
    pub region_column: Option<String>,

    /// Header of the year column
    #[arg(long, value_name = "NAME")]
    pub year_column: Option<String>,

    /// Header of the revenue type column
    #[arg(long, value_name = "NAME")]
    pub revenue_type_column: Option<String>,

    /// Header of the value column
    #[arg(long, value_name = "NAME")]
    pub value_column: Option<String>,

    /// Output format (table, markdown, json, csv)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Write the rendered report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Number of ranked anomalies listed in reports
    #[arg(long, value_name = "COUNT")]
    pub top: Option<usize>,

    /// Aggregate and print the table without running the detector
    ///
    /// Honours --format; rows carry no label or score.
    #[arg(long)]
    pub aggregate_only: bool,

    /// Exit with code 2 when any row is labeled anomalous
    ///
    /// Useful for scheduled checks.
    #[arg(long)]
    pub fail_on_anomaly: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .revanomaly.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(contamination) = self.contamination {
            if !(contamination > 0.0 && contamination <= 0.5) {
                return Err("Contamination must be in (0, 0.5]".to_string());
            }
        }

        if self.n_estimators == Some(0) {
            return Err("Number of estimators must be at least 1".to_string());
        }

        if let Some(max_samples) = self.max_samples {
            if max_samples < 2 {
                return Err("Max samples must be at least 2".to_string());
            }
        }

        if let Some(delimiter) = self.delimiter {
            if !delimiter.is_ascii() {
                return Err("Delimiter must be a single ASCII character".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref input) = self.input {
            if !input.exists() {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
            if !input.is_file() {
                return Err(format!("Input path is not a file: {}", input.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
