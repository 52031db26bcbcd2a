//! Configuration management for Veil.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! Veil uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `VEIL_<SECTION>_<KEY>` overrides
//! - Default values for every section
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use veil::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("veil.toml")?;
//! println!("Workers: {}", config.workers.max_concurrent_jobs);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Application settings (log level)
//! - [`WorkerConfig`] - Size of the job worker pool
//! - [`CallbackConfig`] - Callback timeout, retries and bearer token
//! - [`AuditConfig`] - Audit log location and format
//! - [`LoggingConfig`] - Local rolling log files
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [workers]
//! max_concurrent_jobs = 4
//!
//! [callback]
//! timeout_seconds = 30
//! max_retries = 3
//! retry_delay_ms = 1000
//! auth_token = "${VEIL_CALLBACK_TOKEN}"
//!
//! [audit]
//! enabled = true
//! log_path = "./audit/anonymization.log"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use crate::anonymization::config::AuditConfig;
pub use loader::{load_config, load_default_config};
pub use schema::{ApplicationConfig, CallbackConfig, LoggingConfig, VeilConfig, WorkerConfig};
pub use secret::{secret_string, SecretString, SecretValue};
