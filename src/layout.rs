//! Directory conventions for a run.
//!
//! ```text
//! <base>/runs/<run_id>/ensemble_predictions_*.csv
//! <base>/runs_with_expected_predictions/<run_id>/*.csv
//! <base>/subsetted_runs/<run_id>/*.csv
//! <base>/results/<run_id>_{metrics.csv,friedman_test.txt,nemenyi_test.csv}
//! ```

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::debug;

use crate::error::{EvalError, Result};

pub const ENSEMBLE_FILE_PREFIX: &str = "ensemble_predictions_";

/// Timestamp run id, e.g. `20240131_154502`.
pub fn default_run_id() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    base_dir: PathBuf,
}

impl RunLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn runs_dir(&self, run_id: &str) -> PathBuf {
        self.base_dir.join("runs").join(run_id)
    }

    pub fn labeled_dir(&self, run_id: &str) -> PathBuf {
        self.base_dir.join("runs_with_expected_predictions").join(run_id)
    }

    pub fn subset_dir(&self, run_id: &str) -> PathBuf {
        self.base_dir.join("subsetted_runs").join(run_id)
    }

    pub fn results_dir(&self) -> PathBuf {
        self.base_dir.join("results")
    }

    pub fn metrics_path(&self, run_id: &str) -> PathBuf {
        self.results_dir().join(format!("{run_id}_metrics.csv"))
    }

    pub fn friedman_path(&self, run_id: &str) -> PathBuf {
        self.results_dir().join(format!("{run_id}_friedman_test.txt"))
    }

    pub fn nemenyi_path(&self, run_id: &str) -> PathBuf {
        self.results_dir().join(format!("{run_id}_nemenyi_test.csv"))
    }
}

/// Lists `*.csv` files directly inside `dir` whose names start with
/// `prefix`, sorted by file name.
///
/// # Errors
///
/// A configuration error when `dir` does not exist.
pub fn list_csv(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(EvalError::Configuration(format!(
            "run directory '{}' does not exist",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if path.is_file() && name.starts_with(prefix) && name.ends_with(".csv") {
            files.push(path);
        }
    }
    files.sort();

    debug!(dir = %dir.display(), count = files.len(), "Listed CSV sources");
    Ok(files)
}

/// File name of `path` as a display string.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
