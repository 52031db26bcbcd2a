// Veil - Tabular Dataset Anonymization Service
// Copyright (c) 2025 Veil Contributors
// Licensed under the MIT License

//! # Veil - Tabular Dataset Anonymization
//!
//! Veil anonymizes tabular datasets with generalization hierarchies,
//! suppression and microaggregation so that a release satisfies privacy
//! models such as k-anonymity, then reports privacy and utility metrics of
//! the original and the anonymized data.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Building** generalization hierarchies (intervals, masking, ordering,
//!   dates, suppression) from column values
//! - **Searching** the generalization lattice for a transformation meeting
//!   every configured privacy model within the suppression limit
//! - **Measuring** re-identification risk, class sizes and information loss
//! - **Running** jobs asynchronously per process id, reporting outcomes
//!   through HTTP callbacks
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Asynchronous job orchestration and callbacks
//! - [`anonymization`] - Job model, hierarchies, solver, driver and metrics
//! - [`domain`] - Datasets, identifiers and error types
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use veil::anonymization::{AnonymizationDriver, CancelFlag, JobConfig};
//! use veil::domain::Dataset;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let job: JobConfig = serde_json::from_str(&std::fs::read_to_string("job.json")?)?;
//!     let dataset: Dataset = serde_json::from_str(&std::fs::read_to_string("data.json")?)?;
//!
//!     let outcome = AnonymizationDriver::default().run(&job, Arc::new(dataset), &CancelFlag::new())?;
//!
//!     println!("Suppressed {} records", outcome.suppressed_records);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Anonymization failures are [`domain::AnonymizationError`] values with a
//! stable code; the infrastructure around them reports [`domain::VeilError`]:
//!
//! ```rust,no_run
//! use veil::domain::VeilError;
//!
//! fn example() -> Result<(), VeilError> {
//!     let config = veil::config::load_config("veil.toml")?;
//!     println!("{} workers", config.workers.max_concurrent_jobs);
//!     Ok(())
//! }
//! ```
//!
//! ## Logging
//!
//! Veil uses structured logging with the `tracing` crate:
//!
//! ```rust,no_run
//! use tracing::{info, warn};
//!
//! info!(process_id = "session-1", "Starting anonymization job");
//! warn!(attribute = "age", "Hierarchy has a single level");
//! ```

pub mod anonymization;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
