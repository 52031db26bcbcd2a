//! Domain models and types for Veil.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Tabular data** ([`Dataset`], [`ColumnSpec`], [`DataType`])
//! - **Strongly-typed identifiers** ([`ProcessId`])
//! - **Error types** ([`VeilError`], [`AnonymizationError`], [`CallbackError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! Anonymization failures are [`AnonymizationError`] values with a stable
//! machine code; everything around them is a [`VeilError`]:
//!
//! ```rust
//! use veil::domain::{AnonymizationError, Result};
//!
//! fn example() -> Result<()> {
//!     Err(AnonymizationError::NoAttributeConfigured("empty job".to_string()))?
//! }
//! ```

pub mod dataset;
pub mod errors;
pub mod ids;
pub mod result;

// Re-export commonly used types for convenience
pub use dataset::{is_missing, ColumnSpec, DataType, Dataset, MISSING_VALUE, SUPPRESSED_VALUE};
pub use errors::{AnonymizationError, CallbackError, VeilError, UNKNOWN_ERROR_CODE};
pub use ids::ProcessId;
pub use result::Result;
