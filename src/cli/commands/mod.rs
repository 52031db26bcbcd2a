//! CLI command implementations
//!
//! This module contains all CLI command implementations plus the file
//! helpers they share.

pub mod hierarchy;
pub mod init;
pub mod run;
pub mod submit;
pub mod validate;
pub mod validate_job;

use crate::anonymization::JobConfig;
use crate::config::{load_config, VeilConfig};
use crate::domain::{AnonymizationError, Dataset};
use anyhow::Context;
use std::fs;
use std::path::Path;

/// Read a JSON job description
pub(crate) fn read_job(path: &str) -> anyhow::Result<JobConfig> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read job file: {path}"))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse job file: {path}"))
}

/// Read a JSON dataset
pub(crate) fn read_dataset(path: &str) -> anyhow::Result<Dataset> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read dataset file: {path}"))?;
    let dataset: Dataset = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse dataset file: {path}"))?;
    dataset
        .validate_shape()
        .with_context(|| format!("Malformed dataset: {path}"))?;
    Ok(dataset)
}

/// Write a value as pretty JSON to `path`, or to stdout when `path` is None
pub(crate) fn write_json<T: serde::Serialize>(
    value: &T,
    path: Option<&str>,
) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    match path {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write output file: {path}"))
        }
        None => {
            println!("{json}");
            Ok(())
        }
    }
}

/// Load the configuration file, falling back to defaults when it is absent
pub(crate) fn load_config_or_default(config_path: &str) -> crate::domain::Result<VeilConfig> {
    if Path::new(config_path).exists() {
        load_config(config_path)
    } else {
        tracing::debug!(config_path = %config_path, "No configuration file, using defaults");
        Ok(VeilConfig::default())
    }
}

/// Exit code for a failed job
pub(crate) fn exit_code_for(error: &AnonymizationError) -> i32 {
    match error {
        e if e.is_infeasible() => 3,
        AnonymizationError::UnexpectedAnonymizationFailure { .. } => 5,
        _ => 2,
    }
}
