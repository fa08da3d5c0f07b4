//! Data types used by the ensembling pipeline.

use crate::columns::ROW_ID;

/// Ordered values of the grouping columns for one ensemble decision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey(pub Vec<Option<String>>);

/// One consensus decision and the votes that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleResult {
    pub group_key: GroupKey,
    /// Every prediction cell of the group in encounter order, missing ones included.
    pub prediction_list: Vec<Option<String>>,
    /// `None` when the most frequent vote is a missing cell.
    pub ensemble_prediction: Option<String>,
}

/// Columns that define which predictions are voted together.
///
/// `row_id` is always the first column; duplicates are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupBy {
    columns: Vec<String>,
}

impl GroupBy {
    pub fn new<S: AsRef<str>>(extra: impl IntoIterator<Item = S>) -> Self {
        let mut columns = vec![ROW_ID.to_string()];
        for col in extra {
            let col = col.as_ref().trim();
            if !col.is_empty() && !columns.iter().any(|c| c == col) {
                columns.push(col.to_string());
            }
        }
        Self { columns }
    }

    /// Parses a comma-separated list such as `"model_id, prompt_id"`.
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl Default for GroupBy {
    fn default() -> Self {
        Self::new(std::iter::empty::<&str>())
    }
}
