//! revanomaly core: aggregate tax-revenue records and flag anomalous totals.
//!
//! Raw records are summed per (region, year, revenue type); an isolation
//! forest is fitted on the totals and every aggregate is labeled
//! [`Label::Anomalous`] or [`Label::Normal`].

pub mod analysis;
pub mod cli;
pub mod config;
pub mod detector;
pub mod error;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod report;

pub use analysis::aggregate;
pub use detector::{IsolationForest, IsolationForestParams, OutlierDetector, Prediction};
pub use error::{PipelineError, Result};
pub use models::{AggregateRow, Label, LabelSummary, LabeledRow, RawRecord, Report, ReportMetadata};
pub use pipeline::{run, OutlierLabeler};
