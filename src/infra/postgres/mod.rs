//! PostgreSQL-backed [`PredictionSource`](crate::services::prediction_source::PredictionSource).

mod client;

pub use client::PgPredictionSource;
