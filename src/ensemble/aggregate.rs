use std::collections::HashMap;

use tracing::{debug, info};

use crate::columns::{ENSEMBLE_PREDICTION, PREDICTION, PREDICTION_LIST};
use crate::ensemble::types::{EnsembleResult, GroupBy, GroupKey};
use crate::ensemble::vote::majority_vote;
use crate::error::Result;
use crate::table::Table;

/// Groups prediction rows by `group_by` and resolves each group by majority vote.
///
/// Results come out in the order each key was first seen. Missing prediction
/// cells are votes too; when they win, the consensus is missing.
///
/// # Errors
///
/// Returns a schema error naming every grouping column (and the prediction
/// column) that `table` lacks.
pub fn aggregate(table: &Table, group_by: &GroupBy, source_name: &str) -> Result<Vec<EnsembleResult>> {
    let mut wanted: Vec<&str> = group_by.columns().iter().map(String::as_str).collect();
    wanted.push(PREDICTION);
    let mut indices = table.require(source_name, &wanted)?;
    let prediction_idx = indices.pop().unwrap_or_default();

    let mut slot_of: HashMap<GroupKey, usize> = HashMap::new();
    let mut groups: Vec<(GroupKey, Vec<Option<String>>)> = Vec::new();

    for row in table.rows() {
        let key = GroupKey(indices.iter().map(|&i| row[i].clone()).collect());
        let slot = *slot_of.entry(key.clone()).or_insert_with(|| {
            groups.push((key, Vec::new()));
            groups.len() - 1
        });

        groups[slot].1.push(row[prediction_idx].clone());
    }

    debug!(source = source_name, groups = groups.len(), rows = table.len(), "Grouped predictions");

    Ok(groups
        .into_iter()
        .map(|(group_key, prediction_list)| EnsembleResult {
            ensemble_prediction: majority_vote(&prediction_list).flatten(),
            group_key,
            prediction_list,
        })
        .collect())
}

/// Lays ensemble results out as a table: grouping columns, the JSON-encoded
/// vote list (missing votes as `null`), then the consensus prediction.
pub fn results_to_table(group_by: &GroupBy, results: &[EnsembleResult]) -> Result<Table> {
    let mut columns = group_by.columns().to_vec();
    columns.push(PREDICTION_LIST.to_string());
    columns.push(ENSEMBLE_PREDICTION.to_string());

    let mut table = Table::new(columns);
    for result in results {
        let mut row = result.group_key.0.clone();
        row.push(Some(serde_json::to_string(&result.prediction_list)?));
        row.push(result.ensemble_prediction.clone());
        table.push_row(row);
    }

    Ok(table)
}

/// Aggregates `table` and returns the serialized ensemble table.
pub fn ensemble_table(table: &Table, group_by: &GroupBy, source_name: &str) -> Result<Table> {
    info!(source = source_name, group_by = ?group_by.columns(), "Calculating ensemble predictions");

    let results = aggregate(table, group_by, source_name)?;

    let undecided = results.iter().filter(|r| r.ensemble_prediction.is_none()).count();
    if undecided > 0 {
        info!(source = source_name, undecided, "Groups where a missing prediction won the vote");
    }

    results_to_table(group_by, &results)
}
