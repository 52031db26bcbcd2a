//! Core orchestration for Veil.
//!
//! This module runs anonymization jobs asynchronously and reports their
//! outcome to the caller.
//!
//! # Modules
//!
//! - [`jobs`] - Task registry, job orchestrator and callbacks
//!
//! # Job Workflow
//!
//! 1. **Validate**: the job is checked against the dataset before anything is queued
//! 2. **Register**: the task replaces any running task with the same process id
//! 3. **Run**: the driver runs on a bounded pool of blocking workers
//! 4. **Publish**: the outcome is stored unless the task was replaced meanwhile
//! 5. **Notify**: a success or failure callback is posted
//!
//! # Example
//!
//! ```rust,no_run
//! use veil::config::load_config;
//! use veil::core::jobs::{JobOrchestrator, TaskStatus};
//! use veil::domain::ProcessId;
//!
//! # async fn example(job: veil::anonymization::JobConfig, dataset: veil::domain::Dataset)
//! #     -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("veil.toml")?;
//! let orchestrator = JobOrchestrator::from_config(&config)?;
//!
//! let process_id = ProcessId::generate();
//! orchestrator
//!     .submit(process_id.clone(), job, dataset, "https://example.com/callback")
//!     .await?;
//!
//! while orchestrator.status(&process_id) == TaskStatus::Running {
//!     tokio::time::sleep(std::time::Duration::from_millis(100)).await;
//! }
//! # Ok(())
//! # }
//! ```

pub mod jobs;
