//! The `inspect` stage: look up datasets by name.

use tracing::{info, warn};

use crate::error::Result;
use crate::services::prediction_source::{DatasetCount, PredictionSource};

/// Looks up each dataset by name and counts its rows.
#[tracing::instrument(skip(source))]
pub async fn run_inspect(source: &dyn PredictionSource, names: &[String]) -> Result<Vec<(String, Option<DatasetCount>)>> {
    let mut found = Vec::with_capacity(names.len());

    for name in names {
        let count = source.dataset_row_count(name).await?;
        match count {
            Some(c) => info!(dataset = %name, id = c.id, rows = c.rows, "Dataset"),
            None => warn!(dataset = %name, "Dataset missing"),
        }
        found.push((name.clone(), count));
    }

    Ok(found)
}

/// One tab-separated line per dataset: name, id and row count, or `MISSING`.
pub fn format_inspection(found: &[(String, Option<DatasetCount>)]) -> String {
    let mut out = String::from("dataset\tid\trows\n");
    for (name, count) in found {
        match count {
            Some(c) => out.push_str(&format!("{name}\t{}\t{}\n", c.id, c.rows)),
            None => out.push_str(&format!("{name}\tMISSING\tMISSING\n")),
        }
    }
    out
}
