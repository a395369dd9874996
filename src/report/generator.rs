//! Report generation.
//!
//! Renders labeled aggregate tables as aligned text, Markdown,
//! JSON (with scatter-ready series) or CSV.

use crate::analysis::{group_by_region, scatter_series, top_anomalies, ScatterSeries};
use crate::config::OutputFormat;
use crate::models::{AggregateRow, GroupCount, Label, LabelSummary, LabeledRow, Report, ReportMetadata};
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;

const TABLE_HEADER: [&str; 5] = ["region", "year", "revenue_type", "total_value", "label"];

/// Render a report in the requested format.
pub fn render(report: &Report, format: OutputFormat, top: usize) -> Result<String> {
    Ok(match format {
        OutputFormat::Table => generate_table(&report.rows),
        OutputFormat::Markdown => generate_markdown_report(report, top),
        OutputFormat::Json => generate_json_report(report)?,
        OutputFormat::Csv => generate_csv(&report.rows)?,
    })
}

/// Render unlabeled aggregates in the requested format.
///
/// Markdown and table output share the same columns; JSON is an array of rows.
pub fn render_aggregates(rows: &[AggregateRow], format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Table => generate_aggregate_table(rows),
        OutputFormat::Markdown => generate_aggregate_markdown(rows),
        OutputFormat::Json => serde_json::to_string_pretty(rows)?,
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            for row in rows {
                writer.serialize(row)?;
            }
            let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!(e.to_string()))?;
            String::from_utf8(bytes)?
        }
    })
}

/// Generate an aligned text table: header row, then one row per line.
pub fn generate_table(rows: &[LabeledRow]) -> String {
    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                r.region.clone(),
                r.year.clone(),
                r.revenue_type.clone(),
                format!("{:.2}", r.total_value),
                r.label.to_string(),
            ]
        })
        .collect();

    align(&TABLE_HEADER, &body)
}

/// Generate an aligned text table of unlabeled aggregates.
pub fn generate_aggregate_table(rows: &[AggregateRow]) -> String {
    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                r.region.clone(),
                r.year.clone(),
                r.revenue_type.clone(),
                format!("{:.2}", r.total_value),
            ]
        })
        .collect();

    align(&TABLE_HEADER[..4], &body)
}

fn generate_aggregate_markdown(rows: &[AggregateRow]) -> String {
    let mut output = String::new();

    output.push_str("# Revenue Aggregates\n\n");
    output.push_str("| Region | Year | Revenue Type | Total Value |\n");
    output.push_str("|:---|:---:|:---|---:|\n");
    for row in rows {
        output.push_str(&format!(
            "| {} | {} | {} | {:.2} |\n",
            row.region, row.year, row.revenue_type, row.total_value
        ));
    }

    output
}

/// Pad columns to a common width. The last column is not padded.
fn align(header: &[&str], body: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in body {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let render_line = |cells: Vec<&str>| -> String {
        let last = cells.len().saturating_sub(1);
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                if i == last {
                    cell.to_string()
                } else {
                    let pad = widths[i] - cell.chars().count();
                    format!("{}{}", cell, " ".repeat(pad))
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
    };

    let mut output = render_line(header.to_vec());
    output.push('\n');
    for row in body {
        output.push_str(&render_line(row.iter().map(String::as_str).collect()));
        output.push('\n');
    }

    output
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, top: usize) -> String {
    let mut output = String::new();

    output.push_str("# Revenue Anomaly Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.summary));
    output.push_str(&generate_top_anomalies_section(&report.rows, top));
    output.push_str(&generate_rows_section(&report.rows));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** `{}`\n", metadata.source));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Raw Records:** {}\n", metadata.raw_records));
    section.push_str(&format!(
        "- **Aggregate Rows:** {}\n",
        metadata.aggregate_rows
    ));
    section.push_str(&format!(
        "- **Detector:** isolation forest (contamination {}, seed {}, {} trees, max samples {})\n",
        metadata.detector.contamination,
        metadata.detector.seed,
        metadata.detector.n_estimators,
        metadata.detector.max_samples
    ));
    section.push_str(&format!(
        "- **Duration:** {:.2}s\n\n",
        metadata.duration_seconds
    ));

    section
}

/// Generate the summary section.
fn generate_summary_section(summary: &LabelSummary) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str(&format!(
        "| {} Anomalous | {} Normal | **Total** | Anomalous Fraction |\n",
        Label::Anomalous.emoji(),
        Label::Normal.emoji(),
    ));
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | **{}** | {:.1}% |\n\n",
        summary.anomalous,
        summary.normal,
        summary.total,
        summary.anomalous_fraction() * 100.0
    ));

    section.push_str(&generate_breakdown("By Region", "Region", &summary.by_region));
    section.push_str(&generate_breakdown(
        "By Revenue Type",
        "Revenue Type",
        &summary.by_revenue_type,
    ));

    section
}

fn generate_breakdown(title: &str, column: &str, counts: &BTreeMap<String, GroupCount>) -> String {
    if counts.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str(&format!("### {}\n\n", title));
    section.push_str(&format!("| {} | Rows | Anomalous |\n", column));
    section.push_str("|:---|:---:|:---:|\n");

    let mut entries: Vec<_> = counts.iter().collect();
    entries.sort_by_key(|(_, count)| std::cmp::Reverse(count.anomalous));

    for (name, count) in entries {
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            name, count.rows, count.anomalous
        ));
    }
    section.push('\n');

    section
}

/// Generate the ranked anomalies section.
fn generate_top_anomalies_section(rows: &[LabeledRow], top: usize) -> String {
    let mut section = String::new();

    section.push_str("## Top Anomalies\n\n");

    let ranked = top_anomalies(rows, top);
    if ranked.is_empty() {
        section.push_str("No aggregate was labeled anomalous.\n\n");
        return section;
    }

    section.push_str("| # | Region | Year | Revenue Type | Total Value | Score |\n");
    section.push_str("|:---:|:---|:---:|:---|---:|---:|\n");
    for (i, row) in ranked.iter().enumerate() {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {:.2} | {:.4} |\n",
            i + 1,
            row.region,
            row.year,
            row.revenue_type,
            row.total_value,
            row.score
        ));
    }
    section.push('\n');

    section
}

/// Generate the full table, one subsection per region.
fn generate_rows_section(rows: &[LabeledRow]) -> String {
    let mut section = String::new();

    section.push_str("## Aggregates by Region\n\n");

    for (region, region_rows) in group_by_region(rows) {
        section.push_str(&format!("### {}\n\n", region));
        section.push_str("| Year | Revenue Type | Total Value | Label |\n");
        section.push_str("|:---:|:---|---:|:---|\n");
        for row in &region_rows {
            section.push_str(&format!(
                "| {} | {} | {:.2} | {} {} |\n",
                row.year,
                row.revenue_type,
                row.total_value,
                row.label.emoji(),
                row.label
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by revanomaly*\n".to_string()
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    report: &'a Report,
    scatter: Vec<ScatterSeries>,
}

/// Generate a JSON report with scatter series for external plotting.
pub fn generate_json_report(report: &Report) -> Result<String> {
    let json = JsonReport {
        report,
        scatter: scatter_series(&report.rows),
    };
    serde_json::to_string_pretty(&json).map_err(Into::into)
}

#[derive(Serialize)]
struct CsvRow<'a> {
    region: &'a str,
    year: &'a str,
    revenue_type: &'a str,
    total_value: f64,
    label: Label,
}

/// Generate the labeled table as CSV.
pub fn generate_csv(rows: &[LabeledRow]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(CsvRow {
            region: &row.region,
            year: &row.year,
            revenue_type: &row.revenue_type,
            total_value: row.total_value,
            label: row.label,
        })?;
    }
    let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!(e.to_string()))?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::IsolationForestParams;
    use chrono::Utc;

    fn row(region: &str, kind: &str, total: f64, score: f64, label: Label) -> LabeledRow {
        LabeledRow {
            region: region.to_string(),
            year: "2020".to_string(),
            revenue_type: kind.to_string(),
            total_value: total,
            score,
            label,
        }
    }

    fn create_test_report() -> Report {
        let rows = vec![
            row("RJ", "ICMS", 10.0, -0.45, Label::Normal),
            row("SP", "ICMS", 150.0, -0.72, Label::Anomalous),
            row("SP", "IPVA", 12.0, -0.44, Label::Normal),
        ];
        let summary = LabelSummary::from_rows(&rows);

        Report {
            metadata: ReportMetadata {
                source: "arrecadacao.csv".to_string(),
                generated_at: Utc::now(),
                raw_records: 5,
                aggregate_rows: rows.len(),
                detector: IsolationForestParams::default(),
                duration_seconds: 0.01,
            },
            summary,
            rows,
        }
    }

    #[test]
    fn test_generate_table() {
        let report = create_test_report();
        let table = generate_table(&report.rows);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("region"));
        assert!(lines[0].ends_with("label"));
        assert!(lines[2].contains("150.00"));
        assert!(lines[2].ends_with("Anomalous"));
        // columns line up
        let col = lines[0].find("total_value").unwrap();
        assert_eq!(&lines[1][col..col + 5], "10.00");
    }

    #[test]
    fn test_generate_aggregate_table() {
        let rows = vec![AggregateRow {
            region: "SP".to_string(),
            year: "2020".to_string(),
            revenue_type: "ICMS".to_string(),
            total_value: 150.0,
        }];
        let table = generate_aggregate_table(&rows);
        assert!(table.starts_with("region"));
        assert!(!table.contains("label"));
        assert!(table.contains("150.00"));
    }

    #[test]
    fn test_render_aggregates_honours_format() {
        let rows = vec![
            AggregateRow {
                region: "RJ".to_string(),
                year: "2020".to_string(),
                revenue_type: "ICMS".to_string(),
                total_value: 10.0,
            },
            AggregateRow {
                region: "SP".to_string(),
                year: "2020".to_string(),
                revenue_type: "ICMS".to_string(),
                total_value: 150.0,
            },
        ];

        let table = render_aggregates(&rows, OutputFormat::Table).unwrap();
        assert!(table.starts_with("region"));

        let csv = render_aggregates(&rows, OutputFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "region,year,revenue_type,total_value");
        assert_eq!(lines[2], "SP,2020,ICMS,150.0");

        let json = render_aggregates(&rows, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_array().map(|r| r.len()), Some(2));
        assert_eq!(value[0]["region"], "RJ");
        assert_eq!(value[1]["total_value"], 150.0);

        let markdown = render_aggregates(&rows, OutputFormat::Markdown).unwrap();
        assert!(markdown.contains("| SP | 2020 | ICMS | 150.00 |"));
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report();
        let markdown = generate_markdown_report(&report, 10);

        assert!(markdown.contains("# Revenue Anomaly Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("arrecadacao.csv"));
        assert!(markdown.contains("## Summary"));
        assert!(markdown.contains("### By Region"));
        assert!(markdown.contains("## Top Anomalies"));
        assert!(markdown.contains("| 1 | SP | 2020 | ICMS | 150.00 |"));
        assert!(markdown.contains("### RJ"));
    }

    #[test]
    fn test_markdown_without_anomalies() {
        let mut report = create_test_report();
        for r in &mut report.rows {
            r.label = Label::Normal;
        }
        let markdown = generate_markdown_report(&report, 10);
        assert!(markdown.contains("No aggregate was labeled anomalous."));
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report();
        let json = generate_json_report(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert!(value.get("metadata").is_some());
        assert_eq!(value["rows"].as_array().map(|r| r.len()), Some(3));
        assert_eq!(value["rows"][1]["label"], "Anomalous");
        assert_eq!(value["scatter"][0]["color"], "red");
    }

    #[test]
    fn test_generate_csv() {
        let report = create_test_report();
        let csv = generate_csv(&report.rows).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "region,year,revenue_type,total_value,label");
        assert_eq!(lines[2], "SP,2020,ICMS,150.0,Anomalous");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_render_dispatch() {
        let report = create_test_report();
        assert!(render(&report, OutputFormat::Table, 5)
            .unwrap()
            .starts_with("region"));
        assert!(render(&report, OutputFormat::Json, 5).unwrap().starts_with('{'));
    }
}
