//! Run command implementation
//!
//! This module implements the `run` command, which anonymizes a JSON dataset
//! with a JSON job description in the current process.

use crate::anonymization::metrics::MIN_CLASS_SIZE;
use crate::anonymization::{AnonymizationDriver, CancelFlag};
use crate::cli::commands::{exit_code_for, read_dataset, read_job, write_json};
use clap::Args;
use std::sync::Arc;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Job description (JSON)
    #[arg(short, long)]
    pub job: String,

    /// Dataset to anonymize (JSON)
    #[arg(short, long)]
    pub input: String,

    /// Where to write the anonymized dataset
    #[arg(short, long, default_value = "anonymized.json")]
    pub output: String,

    /// Also write the metrics report to this path
    #[arg(long, value_name = "PATH")]
    pub metrics: Option<String>,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(job = %self.job, input = %self.input, "Running anonymization job");

        println!("🔒 Anonymizing {}", self.input);
        println!();

        let job = match read_job(&self.job) {
            Ok(job) => job,
            Err(e) => {
                println!("❌ Failed to load job");
                println!("   Error: {e:#}");
                return Ok(2);
            }
        };
        let dataset = match read_dataset(&self.input) {
            Ok(dataset) => Arc::new(dataset),
            Err(e) => {
                println!("❌ Failed to load dataset");
                println!("   Error: {e:#}");
                return Ok(2);
            }
        };

        let cancel = CancelFlag::new();
        let signal_cancel = cancel.clone();
        let signal_task = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received SIGINT (Ctrl+C), cancelling anonymization");
                println!("\n⚠️  Shutdown signal received, cancelling run...");
                signal_cancel.cancel();
            }
        });

        let driver = AnonymizationDriver::default();
        let run_job = job.clone();
        let result =
            tokio::task::spawn_blocking(move || driver.run(&run_job, dataset, &cancel)).await;
        signal_task.abort();

        let outcome = match result? {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error_code = e.code(), error = %e, "Anonymization job failed");
                println!("❌ Anonymization failed [{}]", e.code());
                println!("   Error: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        if let Err(e) = write_json(&outcome.dataset, Some(&self.output)) {
            println!("❌ {e:#}");
            return Ok(5);
        }
        if let Some(path) = &self.metrics {
            if let Err(e) = write_json(&outcome.metrics, Some(path)) {
                println!("❌ {e:#}");
                return Ok(5);
            }
        }

        println!("✅ Anonymized dataset written to {}", self.output);
        println!();
        println!("Summary:");
        println!("  Job: {}", job.name);
        println!("  Records: {}", outcome.dataset.row_count());
        println!("  Suppressed Records: {}", outcome.suppressed_records);
        for (attribute, level) in &outcome.generalization_levels {
            println!("  Level of {attribute}: {level}");
        }
        let anonymized_min = format!("{MIN_CLASS_SIZE}_anonymized");
        if let Some(min_class) = outcome.metrics.dataset(&anonymized_min) {
            println!("  Smallest Class: {min_class}");
        }
        println!("  Duration: {:.2}s", outcome.elapsed.as_secs_f64());
        if let Some(path) = &self.metrics {
            println!("  Metrics: {path}");
        }
        println!();
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymization::config::{HierarchyKind, IntervalSize, PrivacyModel};
    use crate::anonymization::{AttributeConfig, JobConfig};
    use crate::domain::{ColumnSpec, DataType, Dataset};
    use std::fs;

    fn write_inputs(dir: &std::path::Path, k: usize) -> (String, String) {
        let dataset = Dataset {
            columns: vec![
                ColumnSpec::new("age", DataType::Integer),
                ColumnSpec::new("diagnosis", DataType::String),
            ],
            rows: [21, 22, 23, 26, 27, 28]
                .iter()
                .map(|age| vec![age.to_string(), "flu".to_string()])
                .collect(),
        };
        let mut job = JobConfig::new("ages");
        job.privacy_models = vec![PrivacyModel::KAnonymity { k }];
        job.attribute_configs = vec![
            AttributeConfig::new(0, "age", DataType::Integer).generalized(
                HierarchyKind::Intervals {
                    interval_size: IntervalSize::Integer(5),
                },
            ),
            AttributeConfig::new(1, "diagnosis", DataType::String),
        ];

        let job_path = dir.join("job.json");
        let data_path = dir.join("data.json");
        fs::write(&job_path, serde_json::to_string(&job).unwrap()).unwrap();
        fs::write(&data_path, serde_json::to_string(&dataset).unwrap()).unwrap();
        (
            job_path.to_string_lossy().to_string(),
            data_path.to_string_lossy().to_string(),
        )
    }

    #[tokio::test]
    async fn test_run_writes_dataset_and_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let (job, input) = write_inputs(dir.path(), 3);
        let output = dir.path().join("out.json");
        let metrics = dir.path().join("metrics.json");

        let args = RunArgs {
            job,
            input,
            output: output.to_string_lossy().to_string(),
            metrics: Some(metrics.to_string_lossy().to_string()),
        };
        assert_eq!(args.execute().await.unwrap(), 0);

        let anonymized: Dataset =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(anonymized.row_count(), 6);
        assert!(metrics.exists());
    }

    #[tokio::test]
    async fn test_run_infeasible_exits_with_3() {
        let dir = tempfile::tempdir().unwrap();
        let (job, input) = write_inputs(dir.path(), 10);

        let args = RunArgs {
            job,
            input,
            output: dir.path().join("out.json").to_string_lossy().to_string(),
            metrics: None,
        };
        assert_eq!(args.execute().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_run_missing_job_exits_with_2() {
        let dir = tempfile::tempdir().unwrap();
        let args = RunArgs {
            job: dir.path().join("missing.json").to_string_lossy().to_string(),
            input: dir.path().join("data.json").to_string_lossy().to_string(),
            output: dir.path().join("out.json").to_string_lossy().to_string(),
            metrics: None,
        };
        assert_eq!(args.execute().await.unwrap(), 2);
    }
}
