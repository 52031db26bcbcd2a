//! Audit logger for anonymization jobs

use crate::domain::{AnonymizationError, Dataset, ProcessId};
use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Audit log entry
#[derive(Debug, Serialize)]
struct AuditLogEntry<'a> {
    timestamp: String,
    process_id: &'a str,
    job: &'a str,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<&'static str>,
    records: usize,
    suppressed_records: usize,
    generalization_levels: &'a BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics: Option<&'a BTreeMap<String, f64>>,
    processing_time_ms: u64,
    /// Result thrown away because the task was replaced or cancelled
    discarded: bool,
    /// SHA-256 of the input dataset (never log cell values)
    dataset_fingerprint: String,
}

/// Finished job as seen by the audit log
#[derive(Debug)]
pub struct AuditRecord<'a> {
    pub process_id: &'a ProcessId,
    pub job: &'a str,
    pub input: &'a Dataset,
    pub suppressed_records: usize,
    pub generalization_levels: &'a BTreeMap<String, usize>,
    /// Dataset-level metrics of a successful run
    pub dataset_metrics: Option<&'a BTreeMap<String, f64>>,
    pub processing_time_ms: u64,
    pub error: Option<&'a AnonymizationError>,
    pub discarded: bool,
}

/// Audit logger for anonymization jobs
#[derive(Debug)]
pub struct AuditLogger {
    log_path: PathBuf,
    json_format: bool,
    enabled: bool,
}

impl AuditLogger {
    /// Create a new audit logger
    pub fn new(log_path: PathBuf, json_format: bool, enabled: bool) -> Result<Self> {
        if enabled {
            if let Some(parent) = log_path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create audit log directory: {}", parent.display())
                })?;
            }
        }

        Ok(Self {
            log_path,
            json_format,
            enabled,
        })
    }

    /// Disabled logger that writes nothing
    pub fn disabled() -> Self {
        Self {
            log_path: PathBuf::new(),
            json_format: true,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Append one line for a finished job
    pub fn log_job(&self, record: &AuditRecord<'_>) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let entry = AuditLogEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            process_id: record.process_id.as_str(),
            job: record.job,
            outcome: match record.error {
                None => "succeeded",
                Some(e) if e.is_infeasible() => "infeasible",
                Some(_) => "failed",
            },
            error_code: record.error.map(AnonymizationError::code),
            records: record.input.row_count(),
            suppressed_records: record.suppressed_records,
            generalization_levels: record.generalization_levels,
            metrics: record.dataset_metrics,
            processing_time_ms: record.processing_time_ms,
            discarded: record.discarded,
            dataset_fingerprint: fingerprint(record.input)?,
        };

        self.write_entry(&entry)
    }

    fn write_entry(&self, entry: &AuditLogEntry<'_>) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .with_context(|| format!("Failed to open audit log: {}", self.log_path.display()))?;

        if self.json_format {
            let json_line =
                serde_json::to_string(entry).context("Failed to serialize audit entry")?;
            writeln!(file, "{json_line}").context("Failed to write audit entry")?;
        } else {
            writeln!(
                file,
                "[{}] Process: {} | Job: {} | Outcome: {} | Records: {} | Suppressed: {} | Time: {}ms{}",
                entry.timestamp,
                entry.process_id,
                entry.job,
                entry.outcome,
                entry.records,
                entry.suppressed_records,
                entry.processing_time_ms,
                if entry.discarded { " | Discarded" } else { "" }
            )
            .context("Failed to write audit entry")?;
        }

        Ok(())
    }
}

/// SHA-256 of a dataset's JSON encoding
pub fn fingerprint(dataset: &Dataset) -> Result<String> {
    let bytes = dataset
        .to_json_bytes()
        .context("Failed to encode dataset for fingerprinting")?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}
