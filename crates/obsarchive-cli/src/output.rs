//! Table and JSON output for command summaries.

use serde::Serialize;
use tabled::{Table, Tabled};

use obsarchive_service::{DeleteRunSummary, IncompleteSummary};

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

#[derive(Debug, Tabled)]
struct Row {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

impl Row {
    fn new(metric: &'static str, value: impl ToString) -> Self {
        Self {
            metric,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Tabled)]
struct FailedRequestRow {
    #[tabled(rename = "Request")]
    request: String,
    #[tabled(rename = "Incomplete observations")]
    observations: String,
}

fn print_json<T: Serialize>(item: &T) {
    let json = serde_json::to_string_pretty(item).unwrap_or_else(|_| "{}".to_string());
    println!("{json}");
}

fn delete_rows(summary: &DeleteRunSummary) -> Vec<Row> {
    vec![
        Row::new("Delete requests to process", summary.review.total.max(summary.requests)),
        Row::new("Delete requests actioned", summary.review.actioned),
        Row::new("Delete requests not reviewed", summary.review.unreviewed.len()),
        Row::new("Observations", summary.observations),
        Row::new("Batches", summary.totals.batches),
        Row::new("Keys requested", summary.totals.keys_requested),
        Row::new("Keys confirmed", summary.totals.keys_confirmed),
        Row::new("Catalog rows updated", summary.totals.rows_updated),
        Row::new("Failed batches", summary.totals.failed_batches),
    ]
}

fn failed_rows(summary: &DeleteRunSummary) -> Vec<FailedRequestRow> {
    summary
        .review
        .failed
        .iter()
        .map(|(request, observations)| FailedRequestRow {
            request: request.to_string(),
            observations: observations
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect()
}

/// Print the outcome of a `delete` run
pub fn print_delete_summary(summary: &DeleteRunSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(summary),
        OutputFormat::Table => {
            println!("{}", Table::new(delete_rows(summary)));
            let failed = failed_rows(summary);
            if !failed.is_empty() {
                println!("{}", Table::new(failed));
            }
        }
    }
}

#[derive(Serialize)]
struct IncompleteReport<'a> {
    location: &'a str,
    #[serde(flatten)]
    summary: &'a IncompleteSummary,
}

/// Print the outcome of an `incomplete` run
pub fn print_incomplete_summary(location: &str, summary: &IncompleteSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&IncompleteReport { location, summary }),
        OutputFormat::Table => {
            let rows = vec![
                Row::new("Location", location),
                Row::new("Incomplete uploads found", summary.found),
                Row::new("Too recent to check", summary.too_new),
                Row::new("Incomplete files processed", summary.processed),
                Row::new("Checksums matched", summary.matched),
                Row::new("Incomplete files successfully removed", summary.removed),
                Row::new("Incomplete files FAILED", summary.failed),
            ];
            println!("{}", Table::new(rows));
        }
    }
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("⚠ {msg}");
}

/// Print an error message
pub fn print_error(msg: &str) {
    eprintln!("✗ {msg}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use obsarchive_core::types::{DeleteRequestId, ObsId};

    #[test]
    fn failed_requests_list_their_observations() {
        let mut summary = DeleteRunSummary::default();
        summary
            .review
            .failed
            .insert(DeleteRequestId(7), vec![ObsId(1300000000), ObsId(1300000008)]);

        let rows = failed_rows(&summary);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].request, "7");
        assert_eq!(rows[0].observations, "1300000000, 1300000008");
    }

    #[test]
    fn interrupted_run_still_reports_requests() {
        let mut summary = DeleteRunSummary {
            requests: 3,
            interrupted: true,
            ..DeleteRunSummary::default()
        };
        summary.review.unreviewed = vec![DeleteRequestId(2), DeleteRequestId(3)];
        let rows = delete_rows(&summary);
        assert_eq!(rows[0].value, "3");
        assert_eq!(rows[1].value, "0");
        assert_eq!(rows[2].value, "2");
    }
}
