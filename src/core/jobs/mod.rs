//! Asynchronous anonymization jobs
//!
//! - [`registry`] - Concurrent task registry keyed by process id
//! - [`orchestrator`] - Submission, polling and cancellation
//! - [`callback`] - Outbound success and failure callbacks

pub mod callback;
pub mod orchestrator;
pub mod registry;

pub use callback::{
    CallbackDispatcher, CallbackPayload, CallbackSink, FailureReport, HttpCallbackClient,
};
pub use orchestrator::{JobOrchestrator, SubmissionReceipt};
pub use registry::{TaskRegistry, TaskResult, TaskStatus};
