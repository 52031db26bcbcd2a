//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Veil configuration file.

use crate::config::load_config;
use clap::Args;
use secrecy::ExposeSecret;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates after applying overrides
        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration file loaded successfully");
                c
            }
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                println!();
                return Ok(2);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Max Concurrent Jobs: {}", config.workers.max_concurrent_jobs);
        println!("  Callback Timeout: {}s", config.callback.timeout_seconds);
        println!(
            "  Callback Retries: {} (every {}ms)",
            config.callback.max_retries, config.callback.retry_delay_ms
        );
        let token = match &config.callback.auth_token {
            Some(token) if !token.expose_secret().is_empty() => "configured",
            _ => "none",
        };
        println!("  Callback Auth Token: {token}");
        if config.audit.enabled {
            println!("  Audit Log: {}", config.audit.log_path.display());
        } else {
            println!("  Audit Log: disabled");
        }
        if config.logging.local_enabled {
            println!(
                "  Log Files: {} ({})",
                config.logging.local_path, config.logging.local_rotation
            );
        }
        println!();
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_invalid_config_exits_with_2() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("veil.toml");
        fs::write(&path, "[workers]\nmax_concurrent_jobs = 0\n").unwrap();

        let args = ValidateArgs {};
        let code = args.execute(path.to_str().unwrap()).await.unwrap();
        assert_eq!(code, 2);
    }

    #[tokio::test]
    async fn test_missing_config_exits_with_2() {
        let args = ValidateArgs {};
        let code = args.execute("/nonexistent/veil.toml").await.unwrap();
        assert_eq!(code, 2);
    }
}
