//! Domain error types
//!
//! This module defines the error hierarchy for Veil. All errors are
//! domain-specific and don't expose third-party types.

use thiserror::Error;

/// Callback `error_code` used when a failure has no more specific kind
pub const UNKNOWN_ERROR_CODE: &str = "ANON_UNKNOWN";

/// Main Veil error type
///
/// Used for everything around the anonymization core: configuration,
/// I/O, serialization, logging setup and callback delivery.
#[derive(Debug, Error)]
pub enum VeilError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Anonymization errors
    #[error("Anonymization error: {0}")]
    Anonymization(#[from] AnonymizationError),

    /// Callback delivery errors
    #[error("Callback error: {0}")]
    Callback(#[from] CallbackError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Anonymization errors
///
/// Every variant carries the attribute, configured value and expected
/// constraint where one applies, so a failure can be acted on without
/// re-running the job.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AnonymizationError {
    /// The job has no attribute configuration, or none of them is protected
    #[error("No attribute configured: {0}")]
    NoAttributeConfigured(String),

    /// A risk threshold is outside (0, 1]
    #[error("Invalid risk threshold for {model}: {value} (expected a value in (0, 1])")]
    InvalidRiskThreshold { model: String, value: f64 },

    /// Suppression limit outside [0, 1] or its percentage outside [0, 100]
    #[error("Invalid suppression limit '{value}': {reason}")]
    InvalidSuppressionLimit { value: String, reason: String },

    /// Generalization level bounds are inconsistent
    #[error("Invalid generalization setting for attribute '{attribute}': {reason}")]
    InvalidGeneralizationSetting { attribute: String, reason: String },

    /// Attribute configuration is internally inconsistent
    #[error("Invalid configuration for attribute '{attribute}': {reason}")]
    InvalidAttributeConfig { attribute: String, reason: String },

    /// Privacy model parameters are malformed
    #[error("Invalid privacy model {model}: {reason}")]
    InvalidPrivacyModel { model: String, reason: String },

    /// Search algorithm limits are malformed
    #[error("Invalid search setting '{setting}': {reason}")]
    InvalidSearchSetting { setting: String, reason: String },

    /// Dataset and attribute configuration disagree
    #[error("Dataset does not match configuration: {0}")]
    DatasetConfigMismatch(String),

    /// A generalized date label cannot be decoded
    #[error("Malformed generalized date label '{label}' for granularity {granularity}")]
    MalformedGeneralizedDateLabel { label: String, granularity: String },

    /// A cell of a date attribute doesn't match the configured format
    #[error("Value '{value}' of attribute '{attribute}' does not match date format '{format}'")]
    MalformedDateValue {
        attribute: String,
        value: String,
        format: String,
    },

    /// The hierarchy type cannot be applied to the attribute's data type
    #[error("Hierarchy type {hierarchy_type} is not supported for attribute '{attribute}' of type {data_type}")]
    UnsupportedHierarchyType {
        attribute: String,
        hierarchy_type: String,
        data_type: String,
    },

    /// Interval width cannot be parsed for the attribute's numeric type
    #[error("Malformed interval size '{value}' for attribute '{attribute}' of type {data_type}")]
    MalformedIntervalSize {
        attribute: String,
        value: String,
        data_type: String,
    },

    /// A numeric generalization met a non-numeric cell
    #[error("Non-numeric value '{value}' in numeric attribute '{attribute}'")]
    NonNumericValue { attribute: String, value: String },

    /// Process identifier is empty or malformed
    #[error("Invalid process id: {0}")]
    InvalidProcessId(String),

    /// Callback URL cannot be parsed or uses an unsupported scheme
    #[error("Invalid callback URL '{url}': {reason}")]
    InvalidCallbackUrl { url: String, reason: String },

    /// The solver found no transformation satisfying the privacy criteria
    #[error("No optimum found: {0}")]
    NoOptimumFound(String),

    /// The run was cancelled before it completed
    #[error("Anonymization run was cancelled")]
    Cancelled,

    /// Catch-all wrapping any other cause
    #[error("Unexpected anonymization failure: {message}")]
    UnexpectedAnonymizationFailure {
        message: String,
        cause: Option<String>,
    },
}

impl AnonymizationError {
    /// Wrap an arbitrary cause as an unexpected failure
    pub fn unexpected(message: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::UnexpectedAnonymizationFailure {
            message: message.into(),
            cause: Some(cause.to_string()),
        }
    }

    /// Short machine code sent as the callback `error_code`
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoAttributeConfigured(_) => "ANON_NO_ATTRIBUTE_CONFIGURED",
            Self::InvalidRiskThreshold { .. } => "ANON_INVALID_RISK_THRESHOLD",
            Self::InvalidSuppressionLimit { .. } => "ANON_INVALID_SUPPRESSION_LIMIT",
            Self::InvalidGeneralizationSetting { .. } => "ANON_INVALID_GENERALIZATION_SETTING",
            Self::InvalidAttributeConfig { .. } => "ANON_INVALID_ATTRIBUTE_CONFIG",
            Self::InvalidPrivacyModel { .. } => "ANON_INVALID_PRIVACY_MODEL",
            Self::InvalidSearchSetting { .. } => "ANON_INVALID_SEARCH_SETTING",
            Self::DatasetConfigMismatch(_) => "ANON_DATASET_CONFIG_MISMATCH",
            Self::MalformedGeneralizedDateLabel { .. } => "ANON_MALFORMED_DATE_LABEL",
            Self::MalformedDateValue { .. } => "ANON_MALFORMED_DATE_VALUE",
            Self::UnsupportedHierarchyType { .. } => "ANON_UNSUPPORTED_HIERARCHY_TYPE",
            Self::MalformedIntervalSize { .. } => "ANON_MALFORMED_INTERVAL_SIZE",
            Self::NonNumericValue { .. } => "ANON_NON_NUMERIC_VALUE",
            Self::InvalidProcessId(_) => "ANON_INVALID_PROCESS_ID",
            Self::InvalidCallbackUrl { .. } => "ANON_INVALID_CALLBACK_URL",
            Self::NoOptimumFound(_) => "ANON_NO_OPTIMUM_FOUND",
            Self::Cancelled => "ANON_CANCELLED",
            Self::UnexpectedAnonymizationFailure { .. } => UNKNOWN_ERROR_CODE,
        }
    }

    /// Raw underlying cause, when the error wraps one
    pub fn cause(&self) -> Option<&str> {
        match self {
            Self::UnexpectedAnonymizationFailure { cause, .. } => cause.as_deref(),
            _ => None,
        }
    }

    /// Whether the error means the privacy criteria could not be met
    pub fn is_infeasible(&self) -> bool {
        matches!(self, Self::NoOptimumFound(_))
    }
}

/// Callback delivery errors
///
/// These errors don't expose third-party HTTP client types.
#[derive(Debug, Error)]
pub enum CallbackError {
    /// Request could not be sent
    #[error("Failed to reach callback endpoint {url}: {message}")]
    Transport { url: String, message: String },

    /// Endpoint answered with a non-success status
    #[error("Callback endpoint {url} rejected the request: {status} - {body}")]
    Rejected {
        url: String,
        status: u16,
        body: String,
    },

    /// Payload could not be serialized
    #[error("Failed to encode callback payload: {0}")]
    Encoding(String),
}

// Conversion from std::io::Error
impl From<std::io::Error> for VeilError {
    fn from(err: std::io::Error) -> Self {
        VeilError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for VeilError {
    fn from(err: serde_json::Error) -> Self {
        VeilError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for VeilError {
    fn from(err: toml::de::Error) -> Self {
        VeilError::Configuration(format!("TOML parse error: {err}"))
    }
}
