//! The `ensemble` stage: fetch predictions and write the majority-vote table.

use std::path::PathBuf;

use tracing::info;

use crate::ensemble::{GroupBy, ensemble_table};
use crate::error::{EvalError, Result};
use crate::layout::RunLayout;
use crate::services::prediction_source::{PredictionFilter, PredictionSource};

/// Fetches predictions, resolves each group by majority vote and writes
/// `runs/<run_id>/ensemble_predictions_<filter>.csv`.
///
/// # Errors
///
/// An empty fetch is an empty-result error and nothing is written.
#[tracing::instrument(skip(source, layout, group_by), fields(group_by = ?group_by.columns()))]
pub async fn run_ensemble(
    source: &dyn PredictionSource,
    layout: &RunLayout,
    filter: &PredictionFilter,
    group_by: &GroupBy,
    run_id: &str,
) -> Result<PathBuf> {
    let records = source.fetch_predictions(filter).await?;
    if records.is_empty() {
        return Err(EvalError::empty(
            "predictions",
            "query returned no rows; check the filters and database content",
        ));
    }
    info!(rows = records.len(), columns = ?records.columns(), "Fetched prediction records");

    let table = ensemble_table(&records, group_by, "predictions")?;

    let path = layout.runs_dir(run_id).join(filter.file_name());
    table.write_csv(&path)?;

    info!(path = %path.display(), groups = table.len(), "Ensemble predictions saved");
    Ok(path)
}
