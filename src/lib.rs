pub mod config;
pub mod ensemble;
pub mod error;
pub mod infra;
pub mod labels;
pub mod layout;
pub mod metrics;
pub mod output;
pub mod services;
pub mod stages;
pub mod stats;
pub mod table;

/// Column names shared by every stage's tables.
pub mod columns {
    pub const ROW_ID: &str = "row_id";
    pub const DATASET_ID: &str = "dataset_id";
    pub const MODEL_ID: &str = "model_id";
    pub const PROMPT_ID: &str = "prompt_id";
    pub const PREDICTION: &str = "prediction";
    pub const PREDICTION_LIST: &str = "prediction_list";
    pub const ENSEMBLE_PREDICTION: &str = "ensemble_prediction";
    pub const EXPECTED_PREDICTION: &str = "expected_prediction";
}
