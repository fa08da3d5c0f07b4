//! Persistence for run results.
//!
//! Metrics rows go to CSV, the Friedman verdict to a short text report and
//! the Nemenyi matrix to a labeled CSV grid.

use std::fs;
use std::path::Path;

use csv::WriterBuilder;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::metrics::MetricsRow;
use crate::stats::{ComparisonReport, PairwiseMatrix, PostHoc};

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Logs one metrics row as JSON.
pub fn log_metrics_row(row: &MetricsRow) -> Result<()> {
    info!(source = %row.source_file, "{}", serde_json::to_string(row)?);
    Ok(())
}

/// Writes the metrics of a run, replacing any earlier file.
pub fn write_metrics(path: &Path, rows: &[MetricsRow]) -> Result<()> {
    ensure_parent(path)?;
    debug!(path = %path.display(), rows = rows.len(), "Writing metrics");

    let mut writer = WriterBuilder::new().has_headers(true).from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

/// Renders the Friedman report text.
pub fn friedman_report(run_id: &str, report: &ComparisonReport) -> String {
    format!(
        "Friedman Test Results\nRun ID: {run_id}\nStatistic: {}\nP-value: {}\n{}\n",
        report.friedman.statistic,
        report.friedman.p_value,
        report.verdict()
    )
}

/// Renders the pairwise p-values: a header of model names behind an empty
/// corner cell, then one row per model.
pub fn nemenyi_csv(matrix: &PairwiseMatrix) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(Vec::new());

    let mut header = vec![String::new()];
    header.extend(matrix.models.iter().cloned());
    writer.write_record(&header)?;

    for (model, p_values) in matrix.models.iter().zip(&matrix.p_values) {
        let mut record = vec![model.clone()];
        record.extend(p_values.iter().map(|p| p.to_string()));
        writer.write_record(&record)?;
    }

    writer.into_inner().map_err(|e| e.into_error().into())
}

/// Writes the Friedman report and, when the post-hoc test ran, the Nemenyi
/// matrix.
///
/// Both outputs are rendered before any file is touched. The Nemenyi file is
/// written first and removed again if the report cannot be written, so an
/// error leaves neither file behind.
pub fn write_comparison(
    friedman_path: &Path,
    nemenyi_path: &Path,
    run_id: &str,
    report: &ComparisonReport,
) -> Result<()> {
    let friedman = friedman_report(run_id, report);
    let nemenyi = match &report.post_hoc {
        PostHoc::Nemenyi(matrix) => Some(nemenyi_csv(matrix)?),
        PostHoc::Skipped => None,
    };

    if let Some(bytes) = &nemenyi {
        ensure_parent(nemenyi_path)?;
        fs::write(nemenyi_path, bytes)?;
        debug!(path = %nemenyi_path.display(), "Wrote Nemenyi matrix");
    }

    let written = ensure_parent(friedman_path).and_then(|()| Ok(fs::write(friedman_path, friedman)?));
    if let Err(e) = written {
        if nemenyi.is_some() {
            if let Err(cleanup) = fs::remove_file(nemenyi_path) {
                warn!(path = %nemenyi_path.display(), error = %cleanup, "Failed to remove Nemenyi matrix");
            }
        }
        return Err(e);
    }
    debug!(path = %friedman_path.display(), "Wrote Friedman report");

    Ok(())
}
