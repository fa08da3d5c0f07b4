//! The `stat-tests` stage: Friedman across models, Nemenyi when significant.

use tracing::info;

use crate::error::{EvalError, Result};
use crate::layout::{RunLayout, file_name, list_csv};
use crate::output::write_comparison;
use crate::stages::outcome::StageReport;
use crate::stats::{ComparisonReport, ModelTable, PostHoc, Stage, StatisticalComparator, model_name_from_file};
use crate::table::Table;

/// Loads every subset file of a run as one model, runs the Friedman test
/// and, when it is significant, the Nemenyi test.
///
/// Writes `results/<run_id>_friedman_test.txt` and, only for a significant
/// result, `results/<run_id>_nemenyi_test.csv`. Nothing is written unless the
/// comparison completes.
#[tracing::instrument(skip(layout))]
pub fn run_stat_tests(layout: &RunLayout, run_id: &str, alpha: f64) -> Result<(StageReport, ComparisonReport)> {
    let comparator = StatisticalComparator::new(alpha)?;
    let files = list_csv(&layout.subset_dir(run_id), "").map_err(|e| EvalError::Stage {
        stage: Stage::Loading,
        source: Box::new(e),
    })?;

    let mut report = StageReport::new("stat-tests");
    let mut models = Vec::new();

    for path in files {
        let name = file_name(&path);
        let model = model_name_from_file(&name);
        let loaded = Table::read_csv(&path).and_then(|table| ModelTable::from_table(&model, &table, &name));
        if let Some(table) = report.record(&name, loaded)? {
            info!(source = %name, model = %model, rows = table.len(), "Loaded model");
            models.push(table);
            report.processed(&name, None);
        }
    }
    report.log_summary();

    let comparison = comparator.run(&models)?;

    let friedman_path = layout.friedman_path(run_id);
    let nemenyi_path = layout.nemenyi_path(run_id);
    write_comparison(&friedman_path, &nemenyi_path, run_id, &comparison)?;
    info!(path = %friedman_path.display(), "Friedman test results saved");

    if let PostHoc::Nemenyi(matrix) = &comparison.post_hoc {
        for (a, b, p) in matrix.significant_pairs(alpha) {
            info!(model_a = a, model_b = b, p_value = p, "Models differ");
        }
        info!(path = %nemenyi_path.display(), "Nemenyi test p-values saved");
    }

    Ok((report, comparison))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn write_model(dir: &Path, name: &str, predictions: &[&str]) {
        let mut body = String::from("row_id,dataset_id,ensemble_prediction,expected_prediction\n");
        for (i, p) in predictions.iter().enumerate() {
            body.push_str(&format!("{i},10,{p},x\n"));
        }
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn test_not_significant_writes_only_friedman() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(dir.path());
        let subset = layout.subset_dir("r1");
        fs::create_dir_all(&subset).unwrap();
        write_model(&subset, "ensemble_predictions_m1.csv", &["x", "x", "y"]);
        write_model(&subset, "ensemble_predictions_m2.csv", &["x", "y", "y"]);
        write_model(&subset, "ensemble_predictions_m3.csv", &["y", "y", "y"]);

        let (report, comparison) = run_stat_tests(&layout, "r1", 0.05).unwrap();

        assert_eq!(report.processed_sources().count(), 3);
        assert_eq!(comparison.models, vec!["m1", "m2", "m3"]);
        assert!((comparison.friedman.statistic - 3.0).abs() < 1e-12);

        let text = fs::read_to_string(layout.friedman_path("r1")).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[..2], ["Friedman Test Results", "Run ID: r1"]);
        let statistic: f64 = lines[2].strip_prefix("Statistic: ").unwrap().parse().unwrap();
        assert!((statistic - 3.0).abs() < 1e-12);
        assert!(text.ends_with("The result is not significant at alpha = 0.05.\n"));
        assert!(!layout.nemenyi_path("r1").exists());
    }

    #[test]
    fn test_significant_writes_nemenyi_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(dir.path());
        let subset = layout.subset_dir("r1");
        fs::create_dir_all(&subset).unwrap();
        write_model(&subset, "ensemble_predictions_good.csv", &["x"; 20]);
        write_model(&subset, "ensemble_predictions_bad.csv", &["y"; 20]);
        write_model(&subset, "ensemble_predictions_worse.csv", &["y"; 20]);

        let (_, comparison) = run_stat_tests(&layout, "r1", 0.05).unwrap();

        assert!(comparison.significant());
        let csv = fs::read_to_string(layout.nemenyi_path("r1")).unwrap();
        assert_eq!(csv.lines().next(), Some(",bad,good,worse"));
        assert_eq!(csv.lines().count(), 4);
    }

    #[test]
    fn test_unwritable_nemenyi_path_leaves_no_friedman_report() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(dir.path());
        let subset = layout.subset_dir("r1");
        fs::create_dir_all(&subset).unwrap();
        write_model(&subset, "ensemble_predictions_good.csv", &["x"; 20]);
        write_model(&subset, "ensemble_predictions_bad.csv", &["y"; 20]);
        write_model(&subset, "ensemble_predictions_worse.csv", &["y"; 20]);
        fs::create_dir_all(layout.nemenyi_path("r1")).unwrap();

        let err = run_stat_tests(&layout, "r1", 0.05).unwrap_err();

        assert!(matches!(err, EvalError::Io(_)));
        assert!(!layout.friedman_path("r1").exists());
    }

    #[test]
    fn test_bad_files_are_skipped_and_too_few_fail() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(dir.path());
        let subset = layout.subset_dir("r1");
        fs::create_dir_all(&subset).unwrap();
        write_model(&subset, "ensemble_predictions_m1.csv", &["x", "y"]);
        fs::write(subset.join("ensemble_predictions_m2.csv"), "row_id,ensemble_prediction\n1,x\n").unwrap();
        fs::write(
            subset.join("ensemble_predictions_m3.csv"),
            "row_id,ensemble_prediction,expected_prediction\n1,x,x\n1,y,x\n",
        )
        .unwrap();

        let err = run_stat_tests(&layout, "r1", 0.05).unwrap_err();

        assert!(matches!(
            err,
            EvalError::Stage {
                stage: Stage::Loading,
                ..
            }
        ));
        assert!(!layout.friedman_path("r1").exists());
    }

    #[test]
    fn test_missing_subset_dir_fails_at_loading() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(dir.path());
        let err = run_stat_tests(&layout, "r1", 0.05).unwrap_err();
        assert!(matches!(err, EvalError::Stage { stage: Stage::Loading, .. }));
    }
}
