//! Hierarchy command implementation
//!
//! Prints the generalization hierarchy the driver would build for one
//! attribute of a job, one row per distinct value.

use crate::anonymization::build_hierarchy;
use crate::cli::commands::{exit_code_for, read_dataset, read_job};
use clap::Args;

/// Arguments for the hierarchy command
#[derive(Args, Debug)]
pub struct HierarchyArgs {
    /// Job description (JSON)
    #[arg(short, long)]
    pub job: String,

    /// Dataset the hierarchy is built from (JSON)
    #[arg(short, long)]
    pub input: String,

    /// Attribute whose hierarchy to print
    #[arg(short, long)]
    pub attribute: String,
}

impl HierarchyArgs {
    /// Execute the hierarchy command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        let (job, dataset) = match (read_job(&self.job), read_dataset(&self.input)) {
            (Ok(job), Ok(dataset)) => (job, dataset),
            (Err(e), _) | (_, Err(e)) => {
                println!("❌ {e:#}");
                return Ok(2);
            }
        };

        let Some(attribute) = job
            .attribute_configs
            .iter()
            .find(|a| a.name == self.attribute)
        else {
            println!("❌ Attribute '{}' is not configured in the job", self.attribute);
            return Ok(2);
        };
        let Some(config) = &attribute.hierarchy_config else {
            println!("❌ Attribute '{}' has no hierarchyConfig", self.attribute);
            return Ok(2);
        };
        let Some(column) = dataset.column_index(&attribute.name) else {
            println!("❌ Dataset has no column '{}'", attribute.name);
            return Ok(2);
        };

        let values: Vec<&str> = dataset.column_values(column).collect();
        let hierarchy =
            match build_hierarchy(&values, attribute.data_type, config, job.retain_data_type) {
                Ok(hierarchy) => hierarchy,
                Err(e) => {
                    println!("❌ Failed to build hierarchy [{}]", e.code());
                    println!("   Error: {e}");
                    return Ok(exit_code_for(&e));
                }
            };

        tracing::debug!(
            attribute = %hierarchy.attribute(),
            depth = hierarchy.depth(),
            "Built hierarchy"
        );
        println!(
            "🌲 Hierarchy of '{}' ({}, {} levels)",
            hierarchy.attribute(),
            config.kind.type_name(),
            hierarchy.depth()
        );
        for row in hierarchy.rows() {
            println!("  {}", row.join(" | "));
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymization::config::HierarchyKind;
    use crate::anonymization::{AttributeConfig, JobConfig};
    use crate::domain::{ColumnSpec, DataType, Dataset};
    use std::fs;

    #[tokio::test]
    async fn test_unknown_attribute_exits_with_2() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = JobConfig::new("zip");
        job.attribute_configs = vec![AttributeConfig::new(0, "zip", DataType::String)
            .generalized(HierarchyKind::Masking { mask_char: '*' })];
        let dataset = Dataset {
            columns: vec![ColumnSpec::new("zip", DataType::String)],
            rows: vec![vec!["81667".to_string()]],
        };
        let job_path = dir.path().join("job.json");
        let data_path = dir.path().join("data.json");
        fs::write(&job_path, serde_json::to_string(&job).unwrap()).unwrap();
        fs::write(&data_path, serde_json::to_string(&dataset).unwrap()).unwrap();

        let args = HierarchyArgs {
            job: job_path.to_string_lossy().to_string(),
            input: data_path.to_string_lossy().to_string(),
            attribute: "age".to_string(),
        };
        assert_eq!(args.execute().await.unwrap(), 2);

        let args = HierarchyArgs {
            attribute: "zip".to_string(),
            ..args
        };
        assert_eq!(args.execute().await.unwrap(), 0);
    }
}
