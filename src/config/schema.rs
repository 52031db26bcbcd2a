//! Configuration schema types
//!
//! This module defines the configuration structure for Veil.

use crate::anonymization::config::AuditConfig;
use crate::config::SecretString;
use serde::{Deserialize, Serialize};

/// Main Veil configuration
///
/// This is the root configuration structure that maps to the TOML file.
/// Every section is optional; missing sections take their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VeilConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Worker pool settings
    #[serde(default)]
    pub workers: WorkerConfig,

    /// Outbound callback settings
    #[serde(default)]
    pub callback: CallbackConfig,

    /// Audit log settings
    #[serde(default)]
    pub audit: AuditConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl VeilConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.workers.validate()?;
        self.callback.validate()?;
        self.audit.validate().map_err(|e| format!("{e:#}"))?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Jobs allowed to run at the same time
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
        }
    }
}

impl WorkerConfig {
    fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_jobs == 0 || self.max_concurrent_jobs > 64 {
            return Err(format!(
                "workers.max_concurrent_jobs must be between 1 and 64, got {}",
                self.max_concurrent_jobs
            ));
        }
        Ok(())
    }
}

/// Outbound callback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Retries of a failure callback after its first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between failure callback attempts
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Bearer token sent with every callback
    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default)]
    pub auth_token: Option<SecretString>,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            auth_token: None,
        }
    }
}

impl CallbackConfig {
    fn validate(&self) -> Result<(), String> {
        if self.timeout_seconds == 0 {
            return Err("callback.timeout_seconds must be > 0".to_string());
        }
        if self.max_retries > 10 {
            return Err(format!(
                "callback.max_retries must be between 0 and 10, got {}",
                self.max_retries
            ));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default)]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy (daily, hourly)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }
        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path must not be empty".to_string());
        }
        Ok(())
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: VeilConfig = toml::from_str("").unwrap();
        assert_eq!(config.application.log_level, "info");
        assert_eq!(config.workers.max_concurrent_jobs, 4);
        assert_eq!(config.callback.max_retries, 3);
        assert_eq!(config.callback.retry_delay_ms, 1000);
        assert!(config.callback.auth_token.is_none());
        assert!(!config.logging.local_enabled);
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = VeilConfig::default();
        config.application.log_level = "loud".to_string();
        assert!(config.validate().unwrap_err().contains("log_level"));
    }

    #[test]
    fn test_worker_bounds() {
        let mut config = VeilConfig::default();
        config.audit.enabled = false;
        config.workers.max_concurrent_jobs = 0;
        assert!(config.validate().is_err());
        config.workers.max_concurrent_jobs = 65;
        assert!(config.validate().is_err());
        config.workers.max_concurrent_jobs = 64;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_callback_retry_bounds() {
        let mut config = VeilConfig::default();
        config.audit.enabled = false;
        config.callback.max_retries = 11;
        assert!(config.validate().unwrap_err().contains("max_retries"));
        config.callback.max_retries = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_auth_token_is_secret() {
        let config: VeilConfig = toml::from_str(
            r#"
[callback]
auth_token = "s3cret"
"#,
        )
        .unwrap();
        let token = config.callback.auth_token.as_ref().unwrap();
        assert_eq!(token.expose_secret(), "s3cret");
        assert!(!format!("{config:?}").contains("s3cret"));
    }

    #[test]
    fn test_invalid_rotation() {
        let mut config = VeilConfig::default();
        config.audit.enabled = false;
        config.logging.local_rotation = "weekly".to_string();
        assert!(config.validate().is_err());
    }
}
