//! Terminal rendering for pipeline results.
//!
//! A vertical summary card followed by Arrow pretty tables for the team
//! and per-day breakdowns.

use arrow::util::pretty::pretty_format_batches;
use serde::Serialize;

use demandas_core::{ParseFailure, records_to_batch};
use demandas_pipeline::{BatchReport, Conservation};
use demandas_timeline::{TimelineReport, metrics_to_batch, teams_to_batch};

use crate::ingest::IngestStats;

const LABEL_WIDTH: usize = 22;
const MAX_FAILURES_SHOWN: usize = 20;

// ── JSON document ──

/// Document emitted by `process --format json`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOutput<'a> {
    #[serde(flatten)]
    pub timeline: &'a TimelineReport,
    pub counts: &'a Conservation,
    pub parse_failures: &'a [ParseFailure],
    pub corrections: usize,
    pub input: &'a IngestStats,
}

impl<'a> ProcessOutput<'a> {
    pub fn new(report: &'a BatchReport, input: &'a IngestStats) -> Self {
        Self {
            input,
            timeline: &report.timeline,
            counts: &report.counts,
            parse_failures: &report.failures,
            corrections: report.audit.len(),
        }
    }
}

// ── Public API ──

pub fn print_report(report: &BatchReport, input: &IngestStats) -> anyhow::Result<()> {
    print_card(report, input);

    if !report.timeline.teams.is_empty() {
        println!("Teams");
        println!("{}", pretty_format_batches(&[teams_to_batch(&report.timeline.teams)?])?);
        println!();
    }
    if !report.timeline.metrics.is_empty() {
        println!("Daily");
        println!(
            "{}",
            pretty_format_batches(&[metrics_to_batch(&report.timeline.metrics)?])?
        );
    }
    Ok(())
}

/// Corrected records as one table, quality columns included.
pub fn print_records(report: &BatchReport, input: &IngestStats) -> anyhow::Result<()> {
    let batch = records_to_batch(&report.records)?;
    println!("{}", pretty_format_batches(&[batch])?);
    println!(
        "{} records, {} parse failures ({} latin-1 cells, delimiter {:?})",
        report.records.len(),
        report.failures.len(),
        input.latin1_cells,
        input.delimiter
    );
    Ok(())
}

// ── Summary card ──

fn print_card(report: &BatchReport, input: &IngestStats) {
    let summary = &report.timeline.summary;
    let quality = &report.timeline.data_quality;
    let counts = &report.counts;

    println!("=== Demand summary ===");
    println!();

    println!("Input");
    line("rows read", input.rows);
    line("delimiter", format!("{:?}", input.delimiter));
    line("latin-1 cells", input.latin1_cells);
    line("repeated headers", input.repeated_headers);
    println!();

    println!("Totals");
    line("total", summary.total);
    line("resolved", summary.resolved);
    line("daily average", fmt_opt(summary.daily_average, 2));
    line("efficiency", fmt_pct(summary.efficiency));
    println!();

    println!("Data quality");
    line("unresolved", quality.unresolved);
    line("flagged outliers", quality.flagged_outliers);
    line("out of scope", quality.out_of_scope);
    line("audit entries", report.audit.len());
    println!();

    println!("Accounting");
    line("input rows", counts.input_rows);
    line("aggregated", counts.aggregated);
    line("unresolved", counts.unresolved);
    line("parse failed", counts.parse_failed);
    line("out of scope", counts.out_of_scope);
    line("balanced", counts.is_balanced());
    line("elapsed", format!("{:.3}s", report.elapsed_secs));
    println!();

    if !report.failures.is_empty() {
        println!("Parse failures");
        for failure in report.failures.iter().take(MAX_FAILURES_SHOWN) {
            let id = failure.id.as_deref().unwrap_or("-");
            println!("  row {:<6} {:<14} {}", failure.row, id, failure.reason.as_str());
        }
        if report.failures.len() > MAX_FAILURES_SHOWN {
            println!("  ... and {} more", report.failures.len() - MAX_FAILURES_SHOWN);
        }
        println!();
    }
}

fn line(label: &str, value: impl std::fmt::Display) {
    println!("  {label:<LABEL_WIDTH$} {value}");
}

fn fmt_opt(value: Option<f64>, places: usize) -> String {
    match value {
        Some(v) => format!("{v:.places$}"),
        None => "-".to_string(),
    }
}

fn fmt_pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}%", v * 100.0),
        None => "-".to_string(),
    }
}
