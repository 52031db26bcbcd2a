//! Audit logging module
//!
//! Appends one structured line per finished anonymization job. Cell values
//! never reach the log; inputs are identified by a SHA-256 fingerprint.

pub mod logger;

pub use logger::{fingerprint, AuditLogger, AuditRecord};
