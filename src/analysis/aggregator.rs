//! Revenue aggregation and table statistics.
//!
//! This module groups raw records into one aggregate row per
//! (region, year, revenue type) and provides helpers used by reporting.

use crate::models::{AggregateRow, GroupKey, Label, LabeledRow, RawRecord};
use serde::Serialize;
use std::collections::BTreeMap;

/// Group raw records by key triple and sum their values.
///
/// Rows come out in lexicographic key order.
pub fn aggregate(records: &[RawRecord]) -> Vec<AggregateRow> {
    let mut totals: BTreeMap<GroupKey, f64> = BTreeMap::new();

    for record in records {
        *totals.entry(GroupKey::from(record)).or_insert(0.0) += record.value;
    }

    totals
        .into_iter()
        .map(|(key, total_value)| AggregateRow {
            region: key.region,
            year: key.year,
            revenue_type: key.revenue_type,
            total_value,
        })
        .collect()
}

/// Sum of all raw values.
pub fn grand_total(records: &[RawRecord]) -> f64 {
    records.iter().map(|r| r.value).sum()
}

/// Group labeled rows by region.
pub fn group_by_region(rows: &[LabeledRow]) -> BTreeMap<String, Vec<LabeledRow>> {
    let mut grouped: BTreeMap<String, Vec<LabeledRow>> = BTreeMap::new();

    for row in rows {
        grouped
            .entry(row.region.clone())
            .or_default()
            .push(row.clone());
    }

    grouped
}

/// Get the `n` most anomalous flagged rows, lowest score first.
pub fn top_anomalies(rows: &[LabeledRow], n: usize) -> Vec<LabeledRow> {
    let mut flagged: Vec<LabeledRow> = rows.iter().filter(|r| r.is_anomalous()).cloned().collect();
    flagged.sort_by(|a, b| a.score.total_cmp(&b.score));
    flagged.truncate(n);
    flagged
}

/// One scatter series: all points sharing a label and a revenue type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterSeries {
    pub label: String,
    pub color: &'static str,
    pub revenue_type: String,
    /// `(region, total_value)` points.
    pub points: Vec<(String, f64)>,
}

/// Split labeled rows into scatter series keyed by label (color) and revenue type (marker).
pub fn scatter_series(rows: &[LabeledRow]) -> Vec<ScatterSeries> {
    let mut series: BTreeMap<(Label, String), Vec<(String, f64)>> = BTreeMap::new();

    for row in rows {
        series
            .entry((row.label, row.revenue_type.clone()))
            .or_default()
            .push((row.region.clone(), row.total_value));
    }

    series
        .into_iter()
        .map(|((label, revenue_type), points)| ScatterSeries {
            label: label.to_string(),
            color: label.color(),
            revenue_type,
            points,
        })
        .collect()
}
