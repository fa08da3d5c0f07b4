//! The `metrics` stage: score every labeled file of a run.

use std::path::PathBuf;

use tracing::info;

use crate::error::Result;
use crate::layout::{RunLayout, file_name, list_csv};
use crate::metrics::{MetricsRow, metrics_for_table};
use crate::output::{log_metrics_row, write_metrics};
use crate::stages::outcome::StageReport;
use crate::table::Table;

/// Scores every subset file of a run and writes `results/<run_id>_metrics.csv`.
///
/// Returns the written path, or `None` when no file yielded metrics.
#[tracing::instrument(skip(layout))]
pub fn run_metrics(layout: &RunLayout, run_id: &str) -> Result<(StageReport, Option<PathBuf>)> {
    let files = list_csv(&layout.subset_dir(run_id), "")?;
    let mut report = StageReport::new("metrics");
    let mut rows = Vec::new();

    for path in files {
        let name = file_name(&path);
        let scored = Table::read_csv(&path).and_then(|table| metrics_for_table(&table, &name));
        if let Some(metrics) = report.record(&name, scored)? {
            let row = MetricsRow::new(run_id, &name, metrics);
            log_metrics_row(&row)?;
            rows.push(row);
            report.processed(&name, None);
        }
    }

    report.log_summary();

    if rows.is_empty() {
        info!("No metrics were calculated, nothing written");
        return Ok((report, None));
    }

    let path = layout.metrics_path(run_id);
    write_metrics(&path, &rows)?;
    info!(path = %path.display(), sources = rows.len(), "Metrics saved");

    Ok((report, Some(path)))
}
