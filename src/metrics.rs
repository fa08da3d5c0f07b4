//! Classification metrics for one labeled ensemble table.
//!
//! Precision, recall and F1 are averaged over classes weighted by each
//! class's true support. A class with no predicted (or no true) members
//! scores zero for the affected metric instead of failing.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::columns::{ENSEMBLE_PREDICTION, EXPECTED_PREDICTION};
use crate::error::{EvalError, Result};
use crate::table::{Table, normalize_label};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision_weighted: f64,
    pub recall_weighted: f64,
    pub f1_score_weighted: f64,
}

/// One line of the per-run metrics file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsRow {
    pub run_id: String,
    pub source_file: String,
    pub accuracy: f64,
    pub precision_weighted: f64,
    pub recall_weighted: f64,
    pub f1_score_weighted: f64,
}

impl MetricsRow {
    pub fn new(run_id: &str, source_file: &str, m: ClassificationMetrics) -> Self {
        Self {
            run_id: run_id.to_string(),
            source_file: source_file.to_string(),
            accuracy: m.accuracy,
            precision_weighted: m.precision_weighted,
            recall_weighted: m.recall_weighted,
            f1_score_weighted: m.f1_score_weighted,
        }
    }
}

#[derive(Default)]
struct ClassCounts {
    true_positives: usize,
    predicted: usize,
    support: usize,
}

fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Computes accuracy and support-weighted precision/recall/F1.
///
/// Returns `None` for empty input. Labels are compared after numeric
/// normalization.
pub fn classification_metrics<S: AsRef<str>>(y_true: &[S], y_pred: &[S]) -> Option<ClassificationMetrics> {
    let n = y_true.len().min(y_pred.len());
    if n == 0 {
        return None;
    }

    let mut classes: BTreeMap<String, ClassCounts> = BTreeMap::new();
    let mut correct = 0usize;

    for (t, p) in y_true.iter().zip(y_pred.iter()) {
        let t = normalize_label(t.as_ref());
        let p = normalize_label(p.as_ref());

        if t == p {
            correct += 1;
            classes.entry(t.clone()).or_default().true_positives += 1;
        }
        classes.entry(t).or_default().support += 1;
        classes.entry(p).or_default().predicted += 1;
    }

    let mut precision = 0.0;
    let mut recall = 0.0;
    let mut f1 = 0.0;

    for counts in classes.values() {
        let weight = ratio(counts.support, n);
        let p = ratio(counts.true_positives, counts.predicted);
        let r = ratio(counts.true_positives, counts.support);
        let f = if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };

        precision += weight * p;
        recall += weight * r;
        f1 += weight * f;
    }

    Some(ClassificationMetrics {
        accuracy: ratio(correct, n),
        precision_weighted: precision,
        recall_weighted: recall,
        f1_score_weighted: f1,
    })
}

/// Drops rows missing either label, then scores what is left.
///
/// # Errors
///
/// A schema error if either label column is absent, or an empty-result
/// error when no row has both labels.
pub fn metrics_for_table(table: &Table, source_name: &str) -> Result<ClassificationMetrics> {
    let idx = table.require(source_name, &[EXPECTED_PREDICTION, ENSEMBLE_PREDICTION])?;
    let (expected_idx, ensemble_idx) = (idx[0], idx[1]);

    let (y_true, y_pred): (Vec<&str>, Vec<&str>) = table
        .rows()
        .iter()
        .filter_map(|row| Some((row[expected_idx].as_deref()?, row[ensemble_idx].as_deref()?)))
        .unzip();

    debug!(
        source = source_name,
        rows = table.len(),
        kept = y_true.len(),
        "Dropped rows without both labels"
    );

    classification_metrics(&y_true, &y_pred)
        .ok_or_else(|| EvalError::empty(source_name, "no valid rows to score after cleaning"))
}
