//! Data models for the revenue anomaly pipeline.
//!
//! This module contains the core data structures used throughout
//! the application for representing raw records, aggregates, labels and reports.

use crate::detector::{IsolationForestParams, Prediction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single raw revenue observation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// Administrative region (e.g. a state code such as `SP`).
    pub region: String,
    /// Fiscal year, kept categorical.
    pub year: String,
    /// Revenue-type category (e.g. `ICMS`).
    pub revenue_type: String,
    /// Collected amount.
    pub value: f64,
}

impl RawRecord {
    /// Creates a new raw record.
    pub fn new(
        region: impl Into<String>,
        year: impl Into<String>,
        revenue_type: impl Into<String>,
        value: f64,
    ) -> Self {
        Self {
            region: region.into(),
            year: year.into(),
            revenue_type: revenue_type.into(),
            value,
        }
    }
}

/// Grouping key of an aggregate row.
///
/// Field order defines the lexicographic order of the aggregate table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub region: String,
    pub year: String,
    pub revenue_type: String,
}

impl From<&RawRecord> for GroupKey {
    fn from(record: &RawRecord) -> Self {
        Self {
            region: record.region.clone(),
            year: record.year.clone(),
            revenue_type: record.revenue_type.clone(),
        }
    }
}

/// One summarized row per distinct (region, year, revenue type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub region: String,
    pub year: String,
    pub revenue_type: String,
    /// Sum of all raw values sharing this key.
    pub total_value: f64,
}

impl AggregateRow {
    /// Returns the grouping key of this row.
    pub fn key(&self) -> GroupKey {
        GroupKey {
            region: self.region.clone(),
            year: self.year.clone(),
            revenue_type: self.revenue_type.clone(),
        }
    }
}

/// Binary label assigned to an aggregate row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Label {
    Anomalous,
    Normal,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Anomalous => write!(f, "Anomalous"),
            Label::Normal => write!(f, "Normal"),
        }
    }
}

impl From<Prediction> for Label {
    fn from(prediction: Prediction) -> Self {
        match prediction {
            Prediction::Outlier => Label::Anomalous,
            Prediction::Inlier => Label::Normal,
        }
    }
}

impl Label {
    /// Color used for this label in scatter plots.
    pub fn color(&self) -> &'static str {
        match self {
            Label::Anomalous => "red",
            Label::Normal => "blue",
        }
    }

    /// Returns an emoji marker for console output.
    pub fn emoji(&self) -> &'static str {
        match self {
            Label::Anomalous => "🔴",
            Label::Normal => "🔵",
        }
    }
}

/// An aggregate row after labeling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledRow {
    pub region: String,
    pub year: String,
    pub revenue_type: String,
    pub total_value: f64,
    /// Isolation score in `[-1, 0]`; lower is more anomalous.
    pub score: f64,
    pub label: Label,
}

impl LabeledRow {
    /// Attaches a score and label to an aggregate row.
    pub fn new(row: AggregateRow, score: f64, label: Label) -> Self {
        Self {
            region: row.region,
            year: row.year,
            revenue_type: row.revenue_type,
            total_value: row.total_value,
            score,
            label,
        }
    }

    /// Whether this row was flagged by the detector.
    pub fn is_anomalous(&self) -> bool {
        self.label == Label::Anomalous
    }
}

/// Row and anomaly counts for one group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCount {
    pub rows: usize,
    pub anomalous: usize,
}

/// Summary of labels assigned in a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelSummary {
    /// Total number of aggregate rows.
    pub total: usize,
    /// Number of rows labeled anomalous.
    pub anomalous: usize,
    /// Number of rows labeled normal.
    pub normal: usize,
    /// Counts grouped by region.
    pub by_region: BTreeMap<String, GroupCount>,
    /// Counts grouped by revenue type.
    pub by_revenue_type: BTreeMap<String, GroupCount>,
}

impl LabelSummary {
    /// Creates a summary from labeled rows.
    pub fn from_rows(rows: &[LabeledRow]) -> Self {
        let mut summary = Self {
            total: rows.len(),
            ..Self::default()
        };

        for row in rows {
            let flagged = usize::from(row.is_anomalous());
            match row.label {
                Label::Anomalous => summary.anomalous += 1,
                Label::Normal => summary.normal += 1,
            }

            let region = summary.by_region.entry(row.region.clone()).or_default();
            region.rows += 1;
            region.anomalous += flagged;

            let kind = summary
                .by_revenue_type
                .entry(row.revenue_type.clone())
                .or_default();
            kind.rows += 1;
            kind.anomalous += flagged;
        }

        summary
    }

    /// Fraction of rows labeled anomalous (0.0 for an empty table).
    pub fn anomalous_fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.anomalous as f64 / self.total as f64
        }
    }
}

/// Metadata about a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Source of the raw records (usually a file path).
    pub source: String,
    /// Date and time the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Number of raw records read.
    pub raw_records: usize,
    /// Number of aggregate rows produced.
    pub aggregate_rows: usize,
    /// Detector parameters used for labeling.
    pub detector: IsolationForestParams,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
}

/// The complete anomaly report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub summary: LabelSummary,
    /// Labeled aggregate rows in table order.
    pub rows: Vec<LabeledRow>,
}
