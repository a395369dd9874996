//! revanomaly - anomaly detection over aggregated tax revenue
//!
//! Loads a CSV dataset, sums revenue per (region, year, revenue type),
//! labels each aggregate with an isolation forest and prints the table.
//!
//! Exit codes:
//!   0 - Success (or no --fail-on-anomaly set)
//!   1 - Runtime error (config, input, detector, etc.)
//!   2 - Anomalies found with --fail-on-anomaly

use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use revanomaly::analysis::{aggregate, grand_total};
use revanomaly::cli::Args;
use revanomaly::config::{Config, DEFAULT_CONFIG_FILE};
use revanomaly::loader::{load_csv, LoadConfig};
use revanomaly::models::{LabelSummary, Report, ReportMetadata};
use revanomaly::pipeline::OutlierLabeler;
use revanomaly::report;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("revanomaly v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_detection(args) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Detection failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .revanomaly.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize columns, delimiter and detector parameters.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Spinner shown while a step runs; hidden in quiet mode.
fn spinner(message: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Run the full pipeline. Returns exit code (0 or 2).
fn run_detection(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    let params = config.detector_params();
    params.validate()?;
    let load_settings = LoadConfig::try_from(&config).context("Invalid input settings")?;

    let input = args
        .input
        .as_deref()
        .context("An input file is required")?;

    // Step 1: Load the raw records
    let pb = spinner("Loading records...", args.quiet);
    let records = load_csv(input, &load_settings)
        .with_context(|| format!("Failed to load {}", input.display()))?;
    pb.finish_and_clear();
    info!("Loaded {} raw records", records.len());

    // Step 2: Aggregate
    let rows = aggregate(&records);
    info!(
        "Aggregated into {} rows (grand total {:.2})",
        rows.len(),
        grand_total(&records)
    );

    if args.aggregate_only {
        let output = report::render_aggregates(&rows, config.report.format)?;
        emit(&output, args.output.as_deref())?;
        return Ok(0);
    }

    // Step 3: Fit the detector and label every aggregate
    let pb = spinner("Fitting isolation forest...", args.quiet);
    let aggregate_rows = rows.len();
    let labeled = OutlierLabeler::new(params).label(rows);
    pb.finish_and_clear();
    let labeled = labeled.context("Failed to label aggregates")?;

    // Step 4: Build and render the report
    let summary = LabelSummary::from_rows(&labeled);
    let report = Report {
        metadata: ReportMetadata {
            source: input.display().to_string(),
            generated_at: Utc::now(),
            raw_records: records.len(),
            aggregate_rows,
            detector: params,
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        summary: summary.clone(),
        rows: labeled,
    };

    let output = report::render(&report, config.report.format, config.report.top_anomalies)?;
    emit(&output, args.output.as_deref())?;

    if !args.quiet {
        eprintln!("\n📊 Detection Summary:");
        eprintln!("   Aggregate rows: {}", summary.total);
        eprintln!(
            "   🔴 Anomalous: {} | 🔵 Normal: {} ({:.1}% flagged)",
            summary.anomalous,
            summary.normal,
            summary.anomalous_fraction() * 100.0
        );
        eprintln!("   Duration: {:.2}s", start_time.elapsed().as_secs_f64());
    }

    if args.fail_on_anomaly && summary.anomalous > 0 {
        eprintln!(
            "\n⛔ {} anomalous aggregates found. Failing (exit code 2).",
            summary.anomalous
        );
        return Ok(2);
    }

    Ok(0)
}

/// Print rendered output, or write it to `path` when given.
fn emit(content: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!("Report saved to: {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
