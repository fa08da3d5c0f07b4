//! The `add-expected` stage: join ground-truth labels onto every ensemble file.

use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::labels::join_expected;
use crate::layout::{ENSEMBLE_FILE_PREFIX, RunLayout, file_name, list_csv};
use crate::services::prediction_source::PredictionSource;
use crate::stages::outcome::StageReport;
use crate::table::Table;

/// Attaches `expected_prediction` to every ensemble file of a run.
///
/// The ground truth is fetched once up front; if that fails the stage fails.
/// Each ensemble file is then joined and written under
/// `runs_with_expected_predictions/<run_id>/` with the same name.
#[tracing::instrument(skip(source, layout))]
pub async fn run_add_expected(source: &dyn PredictionSource, layout: &RunLayout, run_id: &str) -> Result<StageReport> {
    let files = list_csv(&layout.runs_dir(run_id), ENSEMBLE_FILE_PREFIX)?;

    info!("Fetching expected predictions");
    let ground_truth = source.fetch_expected_predictions().await?;
    info!(rows = ground_truth.len(), "Expected predictions fetched");

    let output_dir = layout.labeled_dir(run_id);
    let mut report = StageReport::new("add-expected");

    for path in files {
        let name = file_name(&path);
        let output = output_dir.join(&name);
        if report.record(&name, label_file(&path, &ground_truth, &output))?.is_some() {
            info!(source = %name, output = %output.display(), "Added expected predictions");
            report.processed(&name, Some(output));
        }
    }

    report.log_summary();
    Ok(report)
}

fn label_file(path: &Path, ground_truth: &Table, output: &Path) -> Result<()> {
    let ensemble = Table::read_csv(path)?;
    let labeled = join_expected(&ensemble, ground_truth, &file_name(path))?;
    labeled.write_csv(output)
}
