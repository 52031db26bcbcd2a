//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Console output with `RUST_LOG` filtering
//! - JSON-formatted local log files with daily or hourly rotation
//! - Job lifecycle macros with consistent field names
//!
//! # Example
//!
//! ```no_run
//! use veil::logging::init_logging;
//! use veil::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};

/// Log the start of an anonymization job
///
/// # Example
///
/// ```no_run
/// use veil::log_job_start;
/// use veil::domain::ProcessId;
///
/// let process_id = ProcessId::new("session-1").unwrap();
/// log_job_start!(&process_id, "patients", 1200);
/// ```
#[macro_export]
macro_rules! log_job_start {
    ($process_id:expr, $job:expr, $rows:expr) => {
        tracing::info!(
            process_id = %$process_id,
            job = %$job,
            rows = $rows,
            "Starting anonymization job"
        );
    };
}

/// Log the completion of an anonymization job
///
/// # Example
///
/// ```no_run
/// use veil::log_job_complete;
/// use veil::domain::ProcessId;
/// use std::time::Duration;
///
/// let process_id = ProcessId::new("session-1").unwrap();
/// log_job_complete!(&process_id, 3, Duration::from_secs(2));
/// ```
#[macro_export]
macro_rules! log_job_complete {
    ($process_id:expr, $suppressed:expr, $duration:expr) => {
        tracing::info!(
            process_id = %$process_id,
            suppressed_records = $suppressed,
            duration_ms = $duration.as_millis() as u64,
            "Anonymization job completed"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use veil::log_error_with_context;
/// use veil::domain::VeilError;
///
/// let error = VeilError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use veil::log_retry_attempt;
///
/// log_retry_attempt!(2, 3, "Connection refused");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_attempts:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_attempts = $max_attempts,
            reason = %$reason,
            "Retrying operation"
        );
    };
}
