//! Domain identifier types with validation
//!
//! This module provides newtype wrappers for identifiers so that process ids
//! can't be confused with other strings flowing through the orchestrator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Process identifier newtype wrapper
///
/// Identifies one anonymization job submitted by the surrounding web layer
/// (its session key). At most one task per process id is in flight.
///
/// # Examples
///
/// ```
/// use veil::domain::ids::ProcessId;
/// use std::str::FromStr;
///
/// let process_id = ProcessId::from_str("session-42").unwrap();
/// assert_eq!(process_id.as_str(), "session-42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessId(String);

impl ProcessId {
    /// Creates a new ProcessId from a string
    ///
    /// # Arguments
    ///
    /// * `id` - The process identifier string
    ///
    /// # Returns
    ///
    /// Returns `Ok(ProcessId)` if the ID is valid, `Err` otherwise
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Process ID cannot be empty".to_string());
        }
        if id.chars().any(char::is_whitespace) {
            return Err(format!("Process ID cannot contain whitespace: '{id}'"));
        }
        Ok(Self(id))
    }

    /// Generates a random process id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the process ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProcessId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ProcessId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_id_valid() {
        let id = ProcessId::new("job-123").unwrap();
        assert_eq!(id.as_str(), "job-123");
        assert_eq!(id.to_string(), "job-123");
    }

    #[test]
    fn test_process_id_empty() {
        assert!(ProcessId::new("").is_err());
        assert!(ProcessId::new("   ").is_err());
    }

    #[test]
    fn test_process_id_whitespace() {
        let result = ProcessId::new("job 123");
        assert!(result.unwrap_err().contains("whitespace"));
    }

    #[test]
    fn test_process_id_generate_is_unique() {
        assert_ne!(ProcessId::generate(), ProcessId::generate());
    }

    #[test]
    fn test_process_id_from_str() {
        let id = ProcessId::from_str("abc").unwrap();
        assert_eq!(id.into_inner(), "abc");
    }
}
