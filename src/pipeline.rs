//! Aggregate-then-label pipeline.
//!
//! The dataset is always passed in by the caller; nothing here reads
//! ambient state or performs I/O.

use crate::analysis::aggregate;
use crate::detector::{IsolationForest, IsolationForestParams, OutlierDetector};
use crate::error::{PipelineError, Result};
use crate::models::{AggregateRow, Label, LabeledRow, RawRecord};
use tracing::{debug, info};

/// Fits a detector on aggregate totals and labels every row.
pub struct OutlierLabeler<D = IsolationForest> {
    detector: D,
}

impl OutlierLabeler<IsolationForest> {
    /// Labeler backed by an isolation forest.
    pub fn new(params: IsolationForestParams) -> Self {
        Self {
            detector: IsolationForest::new(params),
        }
    }
}

impl<D: OutlierDetector> OutlierLabeler<D> {
    /// Labeler backed by any outlier detector.
    pub fn with_detector(detector: D) -> Self {
        Self { detector }
    }

    /// The underlying detector (fitted after a successful [`label`](Self::label)).
    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Fit on `total_value` and attach a score and label to each row, preserving order.
    pub fn label(&mut self, rows: Vec<AggregateRow>) -> Result<Vec<LabeledRow>> {
        if rows.is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let values: Vec<f64> = rows.iter().map(|r| r.total_value).collect();
        let predictions = self.detector.fit_predict(&values)?;
        let scores = self.detector.score_samples(&values)?;

        let labeled: Vec<LabeledRow> = rows
            .into_iter()
            .zip(scores)
            .zip(predictions)
            .map(|((row, score), prediction)| LabeledRow::new(row, score, Label::from(prediction)))
            .collect();

        debug!(
            "Labeled {} rows, {} anomalous",
            labeled.len(),
            labeled.iter().filter(|r| r.is_anomalous()).count()
        );
        Ok(labeled)
    }
}

/// Aggregate `records` and label the resulting table with an isolation forest.
pub fn run(records: &[RawRecord], params: &IsolationForestParams) -> Result<Vec<LabeledRow>> {
    let rows = aggregate(records);
    info!(
        "Aggregated {} raw records into {} rows",
        records.len(),
        rows.len()
    );

    OutlierLabeler::new(*params).label(rows)
}
