//! Error taxonomy shared by every pipeline stage.

use thiserror::Error;

use crate::stats::comparator::Stage;

/// Errors raised while evaluating ensemble predictions.
#[derive(Debug, Error)]
pub enum EvalError {
    /// A required setting is missing or malformed. Aborts the run.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A required column is absent from a source table.
    #[error("{source_name}: missing column(s) {missing:?}; available columns: {available:?}")]
    Schema {
        source_name: String,
        missing: Vec<String>,
        available: Vec<String>,
    },

    /// A key column that must be unique repeats within one source.
    #[error("{source_name}: row_id '{row_id}' appears more than once")]
    DuplicateRowId { source_name: String, row_id: String },

    /// The database could not be reached or rejected the query.
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// Nothing survived filtering or cleaning for a source.
    #[error("{source_name}: {reason}")]
    EmptyResult { source_name: String, reason: String },

    /// Not enough valid sources to run a comparison.
    #[error("insufficient input: need at least {required} model sources, found {found}")]
    InsufficientInput { required: usize, found: usize },

    /// A statistical comparison failed at a specific stage.
    #[error("statistical comparison failed at {stage}: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<EvalError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl EvalError {
    pub fn schema(source_name: &str, missing: Vec<String>, available: &[String]) -> Self {
        Self::Schema {
            source_name: source_name.to_string(),
            missing,
            available: available.to_vec(),
        }
    }

    pub fn empty(source_name: &str, reason: impl Into<String>) -> Self {
        Self::EmptyResult {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }

    /// Errors confined to a single source file. The stage logs them, skips
    /// the file and carries on with the rest.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            Self::Schema { .. }
                | Self::DuplicateRowId { .. }
                | Self::EmptyResult { .. }
                | Self::Io(_)
                | Self::Csv(_)
                | Self::Json(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EvalError>;
