//! Attaching ground-truth labels and narrowing rows to a set of datasets.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::columns::{DATASET_ID, EXPECTED_PREDICTION, ROW_ID};
use crate::error::{EvalError, Result};
use crate::table::{Table, normalize_label};

/// Left-joins `ground_truth` onto `ensemble` by `row_id`.
///
/// Every ensemble row survives. Ground-truth columns the ensemble already has
/// are not duplicated: the ensemble value is kept and only filled in when it
/// is missing. When several ground-truth rows share a `row_id` the first wins.
pub fn join_expected(ensemble: &Table, ground_truth: &Table, source_name: &str) -> Result<Table> {
    let row_idx = ensemble.require(source_name, &[ROW_ID])?[0];
    let truth_idx = ground_truth.require("ground truth", &[ROW_ID, EXPECTED_PREDICTION])?;
    let truth_row_idx = truth_idx[0];

    let mut by_row_id: HashMap<String, usize> = HashMap::new();
    for (i, row) in ground_truth.rows().iter().enumerate() {
        if let Some(id) = &row[truth_row_idx] {
            by_row_id.entry(normalize_label(id)).or_insert(i);
        }
    }

    // (ground-truth column, position in the output)
    let mut columns = ensemble.columns().to_vec();
    let mut placements = Vec::new();
    for (gt_col, name) in ground_truth.columns().iter().enumerate() {
        if gt_col == truth_row_idx {
            continue;
        }
        match ensemble.column_index(name) {
            Some(existing) => placements.push((gt_col, existing)),
            None => {
                columns.push(name.clone());
                placements.push((gt_col, columns.len() - 1));
            }
        }
    }

    let mut joined = Table::new(columns);
    let mut matched = 0usize;

    for row in ensemble.rows() {
        let mut out = row.clone();
        out.resize(joined.columns().len(), None);

        let truth = row[row_idx]
            .as_deref()
            .and_then(|id| by_row_id.get(&normalize_label(id)))
            .map(|&i| &ground_truth.rows()[i]);

        if let Some(truth) = truth {
            matched += 1;
            for &(gt_col, out_col) in &placements {
                if out[out_col].is_none() {
                    out[out_col] = truth[gt_col].clone();
                }
            }
        }
        joined.push_row(out);
    }

    debug!(
        source = source_name,
        rows = joined.len(),
        matched,
        unmatched = joined.len() - matched,
        "Joined expected predictions"
    );

    Ok(joined)
}

/// A set of dataset ids that rows must belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetFilter {
    ids: BTreeSet<String>,
}

impl DatasetFilter {
    pub fn new<S: AsRef<str>>(ids: impl IntoIterator<Item = S>) -> Self {
        Self {
            ids: ids.into_iter().map(|id| normalize_label(id.as_ref())).collect(),
        }
    }

    /// Parses a comma-separated list of integer ids such as `"1, 2,3"`.
    pub fn parse(list: &str) -> Result<Self> {
        let mut ids = Vec::new();
        for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let id: i64 = part.parse().map_err(|_| {
                EvalError::Configuration(format!(
                    "dataset ids must be a comma-separated list of integers, got '{part}'"
                ))
            })?;
            ids.push(id.to_string());
        }

        if ids.is_empty() {
            return Err(EvalError::Configuration("no dataset ids given".to_string()));
        }

        Ok(Self::new(ids))
    }

    pub fn contains(&self, dataset_id: &str) -> bool {
        self.ids.contains(&normalize_label(dataset_id))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Keeps the rows whose `dataset_id` is in the set. The result may be empty.
    pub fn apply(&self, table: &Table, source_name: &str) -> Result<Table> {
        let idx = table.require(source_name, &[DATASET_ID])?[0];

        let mut filtered = table.clone();
        filtered.retain_rows(|row| row[idx].as_deref().is_some_and(|id| self.contains(id)));

        debug!(source = source_name, before = table.len(), after = filtered.len(), "Filtered by dataset");
        Ok(filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ensemble() -> Table {
        Table::from_rows(
            ["row_id", "prediction_list", "ensemble_prediction"],
            &[
                &["1", r#"["pos"]"#, "pos"],
                &["2", r#"["neg"]"#, "neg"],
                &["3", r#"["pos"]"#, "pos"],
            ],
        )
    }

    fn truth() -> Table {
        Table::from_rows(
            ["row_id", "dataset_id", "expected_prediction"],
            &[
                &["1.0", "10", "pos"],
                &["2", "11", "pos"],
                &["2", "12", "neg"],
            ],
        )
    }

    #[test]
    fn test_join_is_left_join() {
        let joined = join_expected(&ensemble(), &truth(), "e.csv").unwrap();

        assert_eq!(
            joined.columns(),
            &["row_id", "prediction_list", "ensemble_prediction", "dataset_id", "expected_prediction"]
        );
        assert_eq!(joined.len(), 3);
        assert_eq!(joined.get(0, 3), Some("10"));
        assert_eq!(joined.get(0, 4), Some("pos"));
        // first ground-truth row wins for a duplicated row_id
        assert_eq!(joined.get(1, 3), Some("11"));
        assert_eq!(joined.get(2, 3), None);
        assert_eq!(joined.get(2, 4), None);
    }

    #[test]
    fn test_join_does_not_duplicate_shared_columns() {
        let ensemble = Table::from_rows(
            ["row_id", "dataset_id", "ensemble_prediction"],
            &[&["1", "99", "pos"], &["2", "", "neg"]],
        );
        let joined = join_expected(&ensemble, &truth(), "e.csv").unwrap();

        assert_eq!(
            joined.columns(),
            &["row_id", "dataset_id", "ensemble_prediction", "expected_prediction"]
        );
        assert_eq!(joined.get(0, 1), Some("99"));
        assert_eq!(joined.get(1, 1), Some("11"));
    }

    #[test]
    fn test_join_requires_row_id() {
        let no_row_id = Table::from_rows(["ensemble_prediction"], &[&["pos"]]);
        assert!(matches!(
            join_expected(&no_row_id, &truth(), "e.csv"),
            Err(EvalError::Schema { .. })
        ));
    }

    fn labeled() -> Table {
        Table::from_rows(
            ["row_id", "dataset_id", "ensemble_prediction", "expected_prediction"],
            &[
                &["1", "1", "a", "a"],
                &["2", "2", "b", "a"],
                &["3", "3.0", "a", "a"],
                &["4", "", "a", "a"],
            ],
        )
    }

    #[test]
    fn test_parse_dataset_ids() {
        let filter = DatasetFilter::parse("3, 1,2").unwrap();
        assert_eq!(filter.ids().collect::<Vec<_>>(), vec!["1", "2", "3"]);
        assert!(matches!(DatasetFilter::parse("1,x"), Err(EvalError::Configuration(_))));
        assert!(matches!(DatasetFilter::parse(" , "), Err(EvalError::Configuration(_))));
    }

    #[test]
    fn test_filter_keeps_members_only() {
        let filtered = DatasetFilter::parse("1,3").unwrap().apply(&labeled(), "l.csv").unwrap();
        let ids: Vec<_> = filtered.column_values(0).collect();
        assert_eq!(ids, vec![Some("1"), Some("3")]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let filter = DatasetFilter::parse("2,3").unwrap();
        let once = filter.apply(&labeled(), "l.csv").unwrap();
        let twice = filter.apply(&once, "l.csv").unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_filter_by_all_present_ids_is_identity() {
        let table = Table::from_rows(["row_id", "dataset_id"], &[&["1", "5"], &["2", "6"]]);
        let filtered = DatasetFilter::new(["5", "6"]).apply(&table, "l.csv").unwrap();
        assert_eq!(filtered, table);
    }

    #[test]
    fn test_filter_may_be_empty() {
        let filtered = DatasetFilter::parse("42").unwrap().apply(&labeled(), "l.csv").unwrap();
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_filter_requires_dataset_id() {
        let table = Table::from_rows(["row_id"], &[&["1"]]);
        assert!(matches!(
            DatasetFilter::parse("1").unwrap().apply(&table, "l.csv"),
            Err(EvalError::Schema { .. })
        ));
    }
}
