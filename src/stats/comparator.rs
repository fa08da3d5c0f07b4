//! Cross-model comparison: alignment, scoring and the rank tests.
//!
//! A run moves through `LOADING → ALIGNING → SCORING → FRIEDMAN_TESTED →
//! {NEMENYI_TESTED | SKIPPED} → DONE` and never steps back. A failure is
//! reported with the stage it happened in and nothing is produced.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::{debug, info};

use crate::columns::{ENSEMBLE_PREDICTION, EXPECTED_PREDICTION, ROW_ID};
use crate::error::{EvalError, Result};
use crate::layout::ENSEMBLE_FILE_PREFIX;
use crate::stats::friedman::{FriedmanResult, friedman};
use crate::stats::nemenyi::{PairwiseMatrix, nemenyi};
use crate::table::{Table, labels_match, normalize_label};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Loading,
    Aligning,
    Scoring,
    FriedmanTested,
    NemenyiTested,
    Skipped,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Loading => "LOADING",
            Stage::Aligning => "ALIGNING",
            Stage::Scoring => "SCORING",
            Stage::FriedmanTested => "FRIEDMAN_TESTED",
            Stage::NemenyiTested => "NEMENYI_TESTED",
            Stage::Skipped => "SKIPPED",
            Stage::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// Derives a model name from an ensemble file name:
/// `ensemble_predictions_model3.csv` → `model3`, otherwise the file stem.
pub fn model_name_from_file(file_name: &str) -> String {
    let stem = file_name.strip_suffix(".csv").unwrap_or(file_name);
    match stem.split_once(ENSEMBLE_FILE_PREFIX) {
        Some((_, name)) if !name.is_empty() => name.to_string(),
        _ => std::path::Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name)
            .to_string(),
    }
}

/// One model's labeled predictions keyed by `row_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelTable {
    pub name: String,
    /// `(row_id, expected_prediction, ensemble_prediction)` in file order.
    rows: Vec<(String, Option<String>, Option<String>)>,
}

impl ModelTable {
    /// Pulls the three columns the comparison needs out of a labeled table.
    ///
    /// # Errors
    ///
    /// A schema error if a column is missing, or a duplicate-row error when a
    /// `row_id` repeats (the file was grouped by more than `row_id`).
    pub fn from_table(name: &str, table: &Table, source_name: &str) -> Result<Self> {
        let idx = table.require(source_name, &[ROW_ID, EXPECTED_PREDICTION, ENSEMBLE_PREDICTION])?;

        let mut seen = HashSet::new();
        let mut rows = Vec::with_capacity(table.len());

        for row in table.rows() {
            // a row without an id can never align
            let Some(row_id) = row[idx[0]].as_deref().map(normalize_label) else {
                continue;
            };
            if !seen.insert(row_id.clone()) {
                return Err(EvalError::DuplicateRowId {
                    source_name: source_name.to_string(),
                    row_id,
                });
            }
            rows.push((row_id, row[idx[1]].clone(), row[idx[2]].clone()));
        }

        Ok(Self {
            name: name.to_string(),
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Model predictions aligned on the rows every model (and the expected
/// label) has a value for.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedPredictions {
    pub models: Vec<String>,
    pub row_ids: Vec<String>,
    pub expected: Vec<String>,
    /// One row per `row_id`, one prediction per model.
    pub predictions: Vec<Vec<String>>,
}

impl AlignedPredictions {
    /// Inner-joins the models on `row_id`, in the first model's row order.
    ///
    /// The expected label comes from the first model; rows missing any value
    /// are dropped.
    pub fn align(models: &[ModelTable]) -> Result<Self> {
        let Some(first) = models.first() else {
            return Err(EvalError::InsufficientInput { required: 2, found: 0 });
        };

        let lookups: Vec<HashMap<&str, &Option<String>>> = models
            .iter()
            .map(|m| m.rows.iter().map(|(id, _, pred)| (id.as_str(), pred)).collect())
            .collect();

        let mut aligned = Self {
            models: models.iter().map(|m| m.name.clone()).collect(),
            row_ids: Vec::new(),
            expected: Vec::new(),
            predictions: Vec::new(),
        };

        'rows: for (row_id, expected, _) in &first.rows {
            let Some(expected) = expected else { continue };

            let mut preds = Vec::with_capacity(models.len());
            for lookup in &lookups {
                match lookup.get(row_id.as_str()) {
                    Some(Some(pred)) => preds.push(pred.clone()),
                    _ => continue 'rows,
                }
            }

            aligned.row_ids.push(row_id.clone());
            aligned.expected.push(expected.clone());
            aligned.predictions.push(preds);
        }

        debug!(
            models = aligned.models.len(),
            candidate_rows = first.len(),
            aligned_rows = aligned.row_ids.len(),
            "Aligned model predictions"
        );

        Ok(aligned)
    }
}

/// Per-model binary correctness for every aligned row.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreMatrix {
    pub models: Vec<String>,
    pub row_ids: Vec<String>,
    /// `scores[row][model]` is 1 when the model got the row right.
    pub scores: Vec<Vec<u8>>,
}

impl ScoreMatrix {
    pub fn from_aligned(aligned: &AlignedPredictions) -> Self {
        let scores = aligned
            .predictions
            .iter()
            .zip(&aligned.expected)
            .map(|(preds, expected)| preds.iter().map(|p| u8::from(labels_match(p, expected))).collect())
            .collect();

        Self {
            models: aligned.models.clone(),
            row_ids: aligned.row_ids.clone(),
            scores,
        }
    }

    /// Rows as blocks of `f64` scores, the shape the rank tests expect.
    pub fn blocks(&self) -> Vec<Vec<f64>> {
        self.scores
            .iter()
            .map(|row| row.iter().map(|&s| f64::from(s)).collect())
            .collect()
    }

    /// Share of rows each model got right.
    pub fn accuracies(&self) -> Vec<f64> {
        let n = self.scores.len().max(1) as f64;
        (0..self.models.len())
            .map(|m| self.scores.iter().map(|row| f64::from(row[m])).sum::<f64>() / n)
            .collect()
    }
}

/// What happened after the Friedman test.
#[derive(Debug, Clone, PartialEq)]
pub enum PostHoc {
    Nemenyi(PairwiseMatrix),
    /// Friedman was not significant, so no pairwise test ran.
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonReport {
    pub models: Vec<String>,
    pub rows: usize,
    pub alpha: f64,
    pub friedman: FriedmanResult,
    pub post_hoc: PostHoc,
    pub accuracies: Vec<f64>,
    /// Stages visited, in order, ending with `Done`.
    pub stages: Vec<Stage>,
}

impl ComparisonReport {
    pub fn significant(&self) -> bool {
        self.friedman.p_value < self.alpha
    }

    pub fn verdict(&self) -> String {
        if self.significant() {
            format!("The result is significant at alpha = {}.", self.alpha)
        } else {
            format!("The result is not significant at alpha = {}.", self.alpha)
        }
    }
}

/// Drives one comparison through its stages.
#[derive(Debug)]
pub struct StatisticalComparator {
    alpha: f64,
    stage: Stage,
    stages: Vec<Stage>,
}

impl StatisticalComparator {
    pub fn new(alpha: f64) -> Result<Self> {
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(EvalError::Configuration(format!(
                "significance level must be between 0 and 1, got {alpha}"
            )));
        }
        Ok(Self {
            alpha,
            stage: Stage::Loading,
            stages: vec![Stage::Loading],
        })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn advance(&mut self, next: Stage) {
        debug!(from = %self.stage, to = %next, "Comparator stage");
        self.stage = next;
        self.stages.push(next);
    }

    fn fail(&self, err: EvalError) -> EvalError {
        EvalError::Stage {
            stage: self.stage,
            source: Box::new(err),
        }
    }

    /// Runs the full comparison over already-loaded model tables.
    pub fn run(mut self, models: &[ModelTable]) -> Result<ComparisonReport> {
        if models.len() < 2 {
            return Err(self.fail(EvalError::InsufficientInput {
                required: 2,
                found: models.len(),
            }));
        }

        self.advance(Stage::Aligning);
        let aligned = AlignedPredictions::align(models).map_err(|e| self.fail(e))?;
        if aligned.row_ids.is_empty() {
            return Err(self.fail(EvalError::empty(
                "aligned predictions",
                "no row has a value for every model and the expected label",
            )));
        }

        self.advance(Stage::Scoring);
        let matrix = ScoreMatrix::from_aligned(&aligned);
        let blocks = matrix.blocks();

        let friedman = friedman(&blocks).map_err(|e| self.fail(e))?;
        self.advance(Stage::FriedmanTested);
        info!(
            statistic = friedman.statistic,
            p_value = friedman.p_value,
            models = matrix.models.len(),
            rows = matrix.row_ids.len(),
            "Friedman test"
        );

        let post_hoc = if friedman.p_value < self.alpha {
            let pairwise = nemenyi(&blocks, &matrix.models).map_err(|e| self.fail(e))?;
            self.advance(Stage::NemenyiTested);
            PostHoc::Nemenyi(pairwise)
        } else {
            info!(alpha = self.alpha, "No significant difference detected, no pairwise test run");
            self.advance(Stage::Skipped);
            PostHoc::Skipped
        };

        self.advance(Stage::Done);

        Ok(ComparisonReport {
            models: matrix.models.clone(),
            rows: matrix.row_ids.len(),
            alpha: self.alpha,
            accuracies: matrix.accuracies(),
            friedman,
            post_hoc,
            stages: self.stages,
        })
    }
}
