//! One function per pipeline stage.
//!
//! Stages walk the files of a run one after another. A file that fails on its
//! own (bad schema, nothing left after filtering, unreadable) is recorded as
//! skipped in the [`StageReport`]; configuration and connectivity failures
//! abort the stage.

pub mod ensemble;
pub mod expected;
pub mod inspect;
pub mod metrics;
pub mod outcome;
pub mod stat_tests;
pub mod subset;

pub use ensemble::run_ensemble;
pub use expected::run_add_expected;
pub use inspect::{format_inspection, run_inspect};
pub use metrics::run_metrics;
pub use outcome::{SourceOutcome, StageReport};
pub use stat_tests::run_stat_tests;
pub use subset::run_subset;

#[cfg(test)]
pub(crate) mod testing {
    use crate::error::{EvalError, Result};
    use crate::services::prediction_source::{DatasetCount, PredictionFilter, PredictionSource};
    use crate::table::Table;

    /// In-memory source; ignores the filter.
    pub struct FakeSource {
        pub predictions: Table,
        pub expected: Table,
        pub datasets: Vec<(String, DatasetCount)>,
        pub offline: bool,
    }

    impl Default for FakeSource {
        fn default() -> Self {
            Self {
                predictions: Table::from_rows(
                    ["row_id", "dataset_id", "model_id", "prompt_id", "prediction"],
                    &[
                        &["1", "10", "1", "1", "pos"],
                        &["1", "10", "1", "2", "pos"],
                        &["1", "10", "1", "3", "neg"],
                        &["2", "10", "1", "1", "neg"],
                        &["3", "11", "1", "1", "pos"],
                    ],
                ),
                expected: Table::from_rows(
                    ["row_id", "dataset_id", "expected_prediction"],
                    &[&["1", "10", "pos"], &["2", "10", "pos"], &["3", "11", "pos"]],
                ),
                datasets: vec![("IMDB".to_string(), DatasetCount { id: 10, rows: 2 })],
                offline: false,
            }
        }
    }

    impl FakeSource {
        fn check(&self) -> Result<()> {
            if self.offline {
                return Err(EvalError::Connectivity("connection refused".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl PredictionSource for FakeSource {
        async fn fetch_predictions(&self, _filter: &PredictionFilter) -> Result<Table> {
            self.check()?;
            Ok(self.predictions.clone())
        }

        async fn fetch_expected_predictions(&self) -> Result<Table> {
            self.check()?;
            Ok(self.expected.clone())
        }

        async fn dataset_row_count(&self, name: &str) -> Result<Option<DatasetCount>> {
            self.check()?;
            Ok(self.datasets.iter().find(|(n, _)| n == name).map(|(_, c)| *c))
        }
    }
}
