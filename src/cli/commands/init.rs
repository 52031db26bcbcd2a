//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file and, optionally, a sample job description.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "veil.toml")]
    pub output: String,

    /// Include example values and comments
    #[arg(long)]
    pub with_examples: bool,

    /// Also write a sample job description to this path
    #[arg(long, value_name = "PATH")]
    pub sample_job: Option<String>,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing Veil configuration");
        println!();

        let mut targets = vec![self.output.as_str()];
        if let Some(job) = &self.sample_job {
            targets.push(job.as_str());
        }
        if let Some(existing) = targets.iter().find(|t| Path::new(t).exists()) {
            if !self.force {
                println!("❌ File already exists: {existing}");
                println!("   Use --force to overwrite");
                return Ok(2);
            }
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        if let Err(e) = fs::write(&self.output, config_content) {
            println!("❌ Failed to write configuration file");
            println!("   Error: {e}");
            return Ok(5);
        }
        println!("✅ Configuration file created: {}", self.output);

        if let Some(job_path) = &self.sample_job {
            if let Err(e) = fs::write(job_path, Self::generate_sample_job()) {
                println!("❌ Failed to write sample job");
                println!("   Error: {e}");
                return Ok(5);
            }
            println!("✅ Sample job created: {job_path}");
        }

        println!();
        println!("Next steps:");
        println!("  1. Edit {} with your settings", self.output);
        println!("  2. Set VEIL_CALLBACK_TOKEN in a .env file if callbacks need a bearer token");
        println!("  3. Validate configuration: veil validate-config");
        println!("  4. Anonymize a dataset: veil run --job job.json --input data.json");
        println!();
        Ok(0)
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# Veil Configuration File

[application]
log_level = "info"

[workers]
max_concurrent_jobs = 4

[callback]
timeout_seconds = 30
max_retries = 3
retry_delay_ms = 1000

[audit]
enabled = true
log_path = "./audit/anonymization.log"
json_format = true

[logging]
local_enabled = false
local_path = "./logs"
local_rotation = "daily"
"#
        .to_string()
    }

    /// Generate configuration with examples and comments
    fn generate_config_with_examples() -> String {
        r#"# Veil Configuration File
#
# Every section is optional. Values of the form ${VAR} are replaced with
# environment variables, and VEIL_<SECTION>_<KEY> variables override any
# value below (e.g. VEIL_WORKERS_MAX_CONCURRENT_JOBS=8).

# ============================================================================
# Application Settings
# ============================================================================
[application]
# Log level (trace, debug, info, warn, error)
log_level = "info"

# ============================================================================
# Worker Pool
# ============================================================================
[workers]
# Anonymization jobs running at the same time (1-64)
max_concurrent_jobs = 4

# ============================================================================
# Callbacks
# ============================================================================
[callback]
# Timeout of one callback request
timeout_seconds = 30

# Retries of a failure callback after the first attempt (0-10); success
# callbacks are sent once
max_retries = 3

# Fixed delay between failure callback attempts
retry_delay_ms = 1000

# Bearer token sent with every callback
# auth_token = "${VEIL_CALLBACK_TOKEN}"

# ============================================================================
# Audit Log
# ============================================================================
[audit]
# One line per finished job; cell values are never written
enabled = true
log_path = "./audit/anonymization.log"
json_format = true

# ============================================================================
# Logging
# ============================================================================
[logging]
# JSON log files next to the console output
local_enabled = false
local_path = "./logs"

# Rotation (daily, hourly)
local_rotation = "daily"
"#
        .to_string()
    }

    /// Generate a sample job for a dataset with `age`, `zip` and `diagnosis`
    fn generate_sample_job() -> String {
        r#"{
  "name": "patients",
  "privacyModels": [{ "type": "K_ANONYMITY", "k": 5 }],
  "suppressionLimit": 0.05,
  "algorithm": "OPTIMAL",
  "attributeConfigs": [
    {
      "index": 0,
      "name": "age",
      "dataType": "INTEGER",
      "protectionStrategy": "GENERALIZATION",
      "hierarchyConfig": {
        "attributeName": "age",
        "hierarchyType": "INTERVALS",
        "intervalSize": 5
      }
    },
    {
      "index": 1,
      "name": "zip",
      "dataType": "STRING",
      "protectionStrategy": "GENERALIZATION",
      "hierarchyConfig": {
        "attributeName": "zip",
        "hierarchyType": "MASKING"
      }
    },
    {
      "index": 2,
      "name": "diagnosis",
      "dataType": "STRING",
      "protectionStrategy": "NO_PROTECTION"
    }
  ]
}
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymization::JobConfig;
    use crate::config::VeilConfig;

    #[test]
    fn test_generated_configs_parse() {
        let minimal: VeilConfig = toml::from_str(&InitArgs::generate_minimal_config()).unwrap();
        assert_eq!(minimal.workers.max_concurrent_jobs, 4);

        let annotated: VeilConfig =
            toml::from_str(&InitArgs::generate_config_with_examples()).unwrap();
        assert_eq!(annotated.callback.max_retries, 3);
        assert!(annotated.callback.auth_token.is_none());
    }

    #[test]
    fn test_sample_job_is_valid() {
        let job: JobConfig = serde_json::from_str(&InitArgs::generate_sample_job()).unwrap();
        assert_eq!(job.attribute_configs.len(), 3);
        assert!(job.validate().is_ok());
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("veil.toml");
        fs::write(&output, "").unwrap();

        let args = InitArgs {
            output: output.to_string_lossy().to_string(),
            with_examples: false,
            sample_job: None,
            force: false,
        };
        assert_eq!(args.execute().await.unwrap(), 2);
    }
}
