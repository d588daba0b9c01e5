use std::path::{Path, PathBuf};

use anyhow::Context;
use time::Date;

use crate::configuration::DatabaseSettings;
use crate::excel::export_to_excel;
use crate::report::fetch_ticket_report;

pub struct ExportSummary {
    pub row_count: usize,
    pub output_path: PathBuf,
}

/// Run the full pipeline: fetch the report for the date range, then write it
/// to `output`.
///
/// # Errors
///
/// Will return an error when the date range is invalid, the database cannot
/// be reached or queried, or the workbook cannot be written
pub async fn run(
    settings: &DatabaseSettings,
    start_date: Date,
    end_date: Date,
    output: &Path,
) -> Result<ExportSummary, anyhow::Error> {
    let report = fetch_ticket_report(settings, start_date, end_date)
        .await
        .context("Failed to fetch the ticketing report")?;

    let output_path =
        export_to_excel(&report, output).context("Failed to export the ticketing report")?;

    Ok(ExportSummary {
        row_count: report.row_count(),
        output_path,
    })
}
