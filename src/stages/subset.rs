//! The `subset` stage: keep only rows from the requested datasets.

use std::path::Path;

use tracing::info;

use crate::error::{EvalError, Result};
use crate::labels::DatasetFilter;
use crate::layout::{RunLayout, file_name, list_csv};
use crate::stages::outcome::StageReport;
use crate::table::Table;

/// Narrows every labeled file of a run to the requested datasets and writes
/// the result under `subsetted_runs/<run_id>/`. A file with no matching rows
/// produces no output.
#[tracing::instrument(skip(layout, filter), fields(dataset_ids = ?filter.ids().collect::<Vec<_>>()))]
pub fn run_subset(layout: &RunLayout, run_id: &str, filter: &DatasetFilter) -> Result<StageReport> {
    let files = list_csv(&layout.labeled_dir(run_id), "")?;
    let output_dir = layout.subset_dir(run_id);
    let mut report = StageReport::new("subset");

    for path in files {
        let name = file_name(&path);
        let output = output_dir.join(&name);
        if let Some(rows) = report.record(&name, subset_file(&path, filter, &output))? {
            info!(source = %name, rows, output = %output.display(), "Subset saved");
            report.processed(&name, Some(output));
        }
    }

    report.log_summary();
    Ok(report)
}

fn subset_file(path: &Path, filter: &DatasetFilter, output: &Path) -> Result<usize> {
    let name = file_name(path);
    let table = Table::read_csv(path)?;
    let subset = filter.apply(&table, &name)?;
    if subset.is_empty() {
        return Err(EvalError::empty(&name, "no rows for the requested dataset ids"));
    }
    subset.write_csv(output)?;
    Ok(subset.len())
}
