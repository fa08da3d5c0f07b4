pub mod prediction_source;
