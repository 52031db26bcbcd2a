//! Anonymization module for Veil
//!
//! This module turns a per-attribute protection configuration into
//! generalization hierarchies, searches for a transformation that satisfies
//! the configured privacy models, applies it, and measures the result.
//!
//! # Architecture
//!
//! The anonymization pipeline consists of:
//! - **Configuration**: job, attribute and privacy model descriptions ([`config`])
//! - **Hierarchies**: value generalization tables per attribute ([`hierarchy`])
//! - **Date codec**: calendar bucket labels and their representative dates ([`granularity`])
//! - **Solver**: lattice search over generalization levels ([`solver`])
//! - **Driver**: end-to-end run with optional local generalization ([`engine`])
//! - **Metrics**: re-identification risk and information loss ([`metrics`])
//! - **Audit**: structured job log with dataset fingerprints ([`audit`])
//!
//! # Usage
//!
//! ```rust,ignore
//! use veil::anonymization::{AnonymizationDriver, CancelFlag, JobConfig};
//!
//! let job: JobConfig = serde_json::from_str(&job_json)?;
//! let outcome = AnonymizationDriver::default().run(&job, dataset, &CancelFlag::new())?;
//! ```

pub mod audit;
pub mod config;
pub mod engine;
pub mod granularity;
pub mod hierarchy;
pub mod metrics;
pub mod microaggregation;
pub mod solver;
pub mod transform;

// Re-export main types
pub use config::{AttributeConfig, HierarchyConfig, HierarchyKind, JobConfig, PrivacyModel};
pub use engine::{AnonymizationDriver, AnonymizationOutcome, RunStatus};
pub use granularity::Granularity;
pub use hierarchy::{build_hierarchy, Hierarchy};
pub use metrics::MetricsReport;
pub use solver::{AnonymizationSolver, CancelFlag, LatticeSolver};
