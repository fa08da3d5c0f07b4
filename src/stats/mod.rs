//! Non-parametric comparison of model performance.
//!
//! Each model contributes one binary correctness score per row. The Friedman
//! test checks whether any model differs; when it does, the Nemenyi test
//! says which pairs differ.

pub mod comparator;
pub mod distributions;
pub mod friedman;
pub mod nemenyi;

pub use comparator::{
    AlignedPredictions, ComparisonReport, ModelTable, PostHoc, ScoreMatrix, Stage,
    StatisticalComparator, model_name_from_file,
};
pub use friedman::{FriedmanResult, friedman};
pub use nemenyi::{PairwiseMatrix, nemenyi};
