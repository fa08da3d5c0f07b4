//! Trait and types for reading predictions and ground truth from a store.

use crate::error::Result;
use crate::table::Table;

/// Optional narrowing of the prediction fetch. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredictionFilter {
    pub model_id: Option<i64>,
    pub dataset_id: Option<i64>,
    pub prompt_id: Option<i64>,
    pub library: Option<String>,
}

impl PredictionFilter {
    pub fn is_empty(&self) -> bool {
        self.model_id.is_none() && self.dataset_id.is_none() && self.prompt_id.is_none() && self.library.is_none()
    }

    /// `model3_dataset1_library_hugging_face`, or `all` with no filter set.
    pub fn file_suffix(&self) -> String {
        let mut parts = Vec::new();
        if let Some(id) = self.model_id {
            parts.push(format!("model{id}"));
        }
        if let Some(id) = self.dataset_id {
            parts.push(format!("dataset{id}"));
        }
        if let Some(id) = self.prompt_id {
            parts.push(format!("prompt{id}"));
        }
        if let Some(library) = &self.library {
            parts.push(format!("library_{}", library.replace(' ', "_")));
        }

        if parts.is_empty() {
            "all".to_string()
        } else {
            parts.join("_")
        }
    }

    /// Name of the ensemble file this filter produces.
    pub fn file_name(&self) -> String {
        format!("ensemble_predictions_{}.csv", self.file_suffix())
    }
}

/// Row count of one named dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetCount {
    pub id: i64,
    pub rows: i64,
}

/// Abstraction over where predictions live (e.g., PostgreSQL).
///
/// Each call is self-contained: implementations open whatever connection they
/// need and release it before returning.
#[async_trait::async_trait]
pub trait PredictionSource: Send + Sync {
    /// Prediction records (`row_id, dataset_id, model_id, prompt_id,
    /// prediction`) matching `filter`.
    async fn fetch_predictions(&self, filter: &PredictionFilter) -> Result<Table>;

    /// Ground truth: `row_id, dataset_id, expected_prediction` for every row.
    async fn fetch_expected_predictions(&self) -> Result<Table>;

    /// Looks a dataset up by name. `None` when no such dataset exists.
    async fn dataset_row_count(&self, name: &str) -> Result<Option<DatasetCount>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unfiltered_file_name() {
        let filter = PredictionFilter::default();
        assert!(filter.is_empty());
        assert_eq!(filter.file_name(), "ensemble_predictions_all.csv");
    }

    #[test]
    fn test_file_suffix_parts_in_order() {
        let filter = PredictionFilter {
            model_id: Some(3),
            dataset_id: None,
            prompt_id: Some(2),
            library: Some("hugging face".to_string()),
        };
        assert!(!filter.is_empty());
        assert_eq!(filter.file_suffix(), "model3_prompt2_library_hugging_face");
    }
}
