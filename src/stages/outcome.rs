//! Per-source bookkeeping shared by every stage.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::error::Result;

/// What happened to one source file within a stage.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    Processed { source: String, output: Option<PathBuf> },
    Skipped { source: String, reason: String },
}

impl SourceOutcome {
    pub fn source(&self) -> &str {
        match self {
            Self::Processed { source, .. } | Self::Skipped { source, .. } => source,
        }
    }
}

/// Append-only record of per-source outcomes for one stage run.
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    pub stage: &'static str,
    outcomes: Vec<SourceOutcome>,
}

impl StageReport {
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            outcomes: Vec::new(),
        }
    }

    pub fn processed(&mut self, source: &str, output: Option<PathBuf>) {
        self.outcomes.push(SourceOutcome::Processed {
            source: source.to_string(),
            output,
        });
    }

    pub fn skipped(&mut self, source: &str, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(stage = self.stage, source, reason = %reason, "Skipping source");
        self.outcomes.push(SourceOutcome::Skipped {
            source: source.to_string(),
            reason,
        });
    }

    /// Files a per-source result. Errors local to the source become a skip;
    /// anything else is handed back to abort the stage.
    pub fn record<T>(&mut self, source: &str, result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_skippable() => {
                self.skipped(source, e.to_string());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn outcomes(&self) -> &[SourceOutcome] {
        &self.outcomes
    }

    pub fn processed_sources(&self) -> impl Iterator<Item = &str> {
        self.outcomes.iter().filter_map(|o| match o {
            SourceOutcome::Processed { source, .. } => Some(source.as_str()),
            SourceOutcome::Skipped { .. } => None,
        })
    }

    pub fn skipped_sources(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|o| match o {
            SourceOutcome::Skipped { source, reason } => Some((source.as_str(), reason.as_str())),
            SourceOutcome::Processed { .. } => None,
        })
    }

    pub fn log_summary(&self) {
        let processed = self.processed_sources().count();
        info!(
            stage = self.stage,
            processed,
            skipped = self.outcomes.len() - processed,
            "Stage finished"
        );
    }
}
