//! Integration tests for logging functionality

use tempfile::TempDir;
use veil::config::LoggingConfig;
use veil::logging::structured::parse_log_level;

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert!(!config.local_enabled);
    assert_eq!(config.local_path, "./logs");
    assert_eq!(config.local_rotation, "daily");
}

#[test]
fn test_log_levels() {
    for level in ["trace", "debug", "info", "warn", "error", "INFO"] {
        assert!(parse_log_level(level).is_ok(), "{level} should parse");
    }
    assert!(parse_log_level("verbose").is_err());
}

#[test]
fn test_init_logging_with_local_files() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("logs");

    let config = LoggingConfig {
        local_enabled: true,
        local_path: log_path.to_string_lossy().to_string(),
        local_rotation: "hourly".to_string(),
    };

    // Only one global subscriber can be installed per test binary
    let guard = veil::logging::init_logging("debug", &config).expect("logging initializes");
    tracing::info!(process_id = "session-1", "written to the rolling file");
    drop(guard);

    assert!(log_path.exists());
}
