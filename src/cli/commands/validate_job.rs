//! Validate job command implementation
//!
//! Checks a job description on its own and, when a dataset is given,
//! against that dataset.

use crate::cli::commands::{read_dataset, read_job};
use clap::Args;

/// Arguments for the validate-job command
#[derive(Args, Debug)]
pub struct ValidateJobArgs {
    /// Job description (JSON)
    #[arg(short, long)]
    pub job: String,

    /// Also check the job against this dataset (JSON)
    #[arg(short, long)]
    pub input: Option<String>,
}

impl ValidateJobArgs {
    /// Execute the validate-job command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(job = %self.job, "Validating job");

        println!("🔍 Validating job file: {}", self.job);
        println!();

        let job = match read_job(&self.job) {
            Ok(job) => {
                println!("✅ Job file loaded successfully");
                job
            }
            Err(e) => {
                println!("❌ Failed to load job file");
                println!("   Error: {e:#}");
                return Ok(2);
            }
        };

        let result = match &self.input {
            Some(input) => match read_dataset(input) {
                Ok(dataset) => job.validate_against(&dataset),
                Err(e) => {
                    println!("❌ Failed to load dataset");
                    println!("   Error: {e:#}");
                    return Ok(2);
                }
            },
            None => job.validate(),
        };

        if let Err(e) = result {
            println!("❌ Job validation failed [{}]", e.code());
            println!("   Error: {e}");
            println!();
            return Ok(2);
        }

        println!("✅ Job is valid");
        println!();
        println!("Job Summary:");
        println!("  Name: {}", job.name);
        let models: Vec<String> = job.privacy_models.iter().map(|m| m.to_string()).collect();
        println!("  Privacy Models: {}", models.join(", "));
        if let Ok(limit) = job.suppression_limit.fraction() {
            println!("  Suppression Limit: {:.1}%", limit * 100.0);
        }
        println!("  Algorithm: {:?}", job.algorithm);
        println!("  Local Generalization: {}", job.local_generalization);
        for attribute in job.attributes_in_order() {
            println!(
                "  [{}] {} ({}): {:?}",
                attribute.index, attribute.name, attribute.data_type, attribute.protection_strategy
            );
        }
        println!();
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_empty_job_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        fs::write(&path, r#"{"name": "empty"}"#).unwrap();

        let args = ValidateJobArgs {
            job: path.to_string_lossy().to_string(),
            input: None,
        };
        assert_eq!(args.execute().await.unwrap(), 2);
    }
}
