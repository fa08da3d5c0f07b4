//! CLI entry point for the ensemble evaluation pipeline.
//!
//! Each subcommand runs one stage: build majority-vote ensembles from the
//! database, attach expected labels, subset by dataset, compute metrics, and
//! compare models with the Friedman and Nemenyi tests.

use anyhow::Result;
use clap::{Parser, Subcommand};
use ensemble_eval::{
    config::DbConfig,
    ensemble::GroupBy,
    infra::postgres::PgPredictionSource,
    labels::DatasetFilter,
    layout::{RunLayout, default_run_id},
    services::prediction_source::PredictionFilter,
    stages::{format_inspection, run_add_expected, run_ensemble, run_inspect, run_metrics, run_stat_tests, run_subset},
    stats::PostHoc,
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "ensemble_eval")]
#[command(about = "Majority-vote ensembles and statistical model comparison", long_about = None)]
struct Cli {
    /// Directory holding runs/, runs_with_expected_predictions/, subsetted_runs/ and results/
    #[arg(long, global = true, default_value = ".")]
    base_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch predictions and resolve each group by majority vote
    Ensemble {
        #[arg(long)]
        model_id: Option<i64>,

        #[arg(long)]
        dataset_id: Option<i64>,

        #[arg(long)]
        prompt_id: Option<i64>,

        /// Model library name (e.g., "hugging face")
        #[arg(long)]
        library: Option<String>,

        /// Extra comma-separated grouping columns; row_id is always included
        #[arg(long, default_value = "")]
        group_by: String,

        /// Run identifier (defaults to the current timestamp)
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Attach expected predictions to every ensemble file of a run
    AddExpected {
        #[arg(long)]
        run_id: String,
    },
    /// Keep only rows from the given datasets
    Subset {
        #[arg(long)]
        run_id: String,

        /// Comma-separated dataset ids (e.g., "1,2,3")
        #[arg(long)]
        dataset_ids: String,
    },
    /// Compute accuracy and weighted precision/recall/F1 per file
    Metrics {
        #[arg(long)]
        run_id: String,
    },
    /// Friedman test across models, Nemenyi post-hoc when significant
    StatTests {
        #[arg(long)]
        run_id: String,

        /// Significance level
        #[arg(long, default_value_t = 0.05)]
        alpha: f64,
    },
    /// Show the id and row count of datasets by name
    Inspect {
        #[arg(value_name = "DATASET_NAME", required = true)]
        names: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/ensemble_eval.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("ensemble_eval.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let layout = RunLayout::new(cli.base_dir);

    match cli.command {
        Commands::Ensemble {
            model_id,
            dataset_id,
            prompt_id,
            library,
            group_by,
            run_id,
        } => {
            let run_id = run_id.unwrap_or_else(default_run_id);
            let filter = PredictionFilter {
                model_id,
                dataset_id,
                prompt_id,
                library,
            };
            let source = PgPredictionSource::new(&DbConfig::from_env()?);

            let path = run_ensemble(&source, &layout, &filter, &GroupBy::parse(&group_by), &run_id).await?;
            info!(run_id = %run_id, path = %path.display(), "Ensemble run complete");
        }
        Commands::AddExpected { run_id } => {
            let source = PgPredictionSource::new(&DbConfig::from_env()?);
            run_add_expected(&source, &layout, &run_id).await?;
        }
        Commands::Subset { run_id, dataset_ids } => {
            let filter = DatasetFilter::parse(&dataset_ids)?;
            run_subset(&layout, &run_id, &filter)?;
        }
        Commands::Metrics { run_id } => {
            let (_, path) = run_metrics(&layout, &run_id)?;
            if path.is_none() {
                warn!(run_id = %run_id, "No metrics were calculated");
            }
        }
        Commands::StatTests { run_id, alpha } => {
            let (_, report) = run_stat_tests(&layout, &run_id, alpha)?;

            info!(
                statistic = report.friedman.statistic,
                p_value = report.friedman.p_value,
                "{}",
                report.verdict()
            );
            if let PostHoc::Skipped = report.post_hoc {
                info!(alpha, "Friedman test was not significant, no post-hoc test needed");
            }
            for (model, accuracy) in report.models.iter().zip(&report.accuracies) {
                info!(model = %model, accuracy, rows = report.rows, "Aligned accuracy");
            }
        }
        Commands::Inspect { names } => {
            let source = PgPredictionSource::new(&DbConfig::from_env()?);
            let found = run_inspect(&source, &names).await?;
            print!("{}", format_inspection(&found));
        }
    }

    Ok(())
}
