//! Majority-vote ensembling of grouped prediction records.
//!
//! Raw predictions are grouped by a composite key that always starts with
//! `row_id`, each group is reduced to one consensus value, and the result is
//! laid out as a table for the downstream stages.

pub mod aggregate;
pub mod types;
pub mod vote;

pub use aggregate::{aggregate, ensemble_table, results_to_table};
pub use types::{EnsembleResult, GroupBy, GroupKey};
pub use vote::majority_vote;
