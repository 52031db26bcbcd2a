//! Registry of in-flight anonymization tasks
//!
//! The registry is the only state shared between worker tasks. Each entry
//! carries a generation number; a task may only publish its result while its
//! generation is still the one registered for its process id, so a replaced
//! task never reaches its callback.

use crate::anonymization::CancelFlag;
use crate::domain::{AnonymizationError, Dataset, ProcessId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use url::Url;

/// Result a finished task publishes
pub type TaskOutcome = Result<Arc<Dataset>, AnonymizationError>;

/// Coarse status of a process id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    NotFound,
    Running,
    Done,
}

/// Result lookup for a process id
#[derive(Debug, Clone, PartialEq)]
pub enum TaskResult {
    NotFound,
    StillRunning,
    Ready(Arc<Dataset>),
    Failed(AnonymizationError),
}

#[derive(Debug)]
struct TaskEntry {
    generation: u64,
    cancel: CancelFlag,
    callback_url: Url,
    outcome: Option<TaskOutcome>,
}

/// Ticket handed to the worker task of one submission
#[derive(Debug, Clone)]
pub struct TaskTicket {
    pub process_id: ProcessId,
    pub generation: u64,
    pub cancel: CancelFlag,
    pub callback_url: Url,
}

/// Concurrent map of tasks keyed by process id
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: DashMap<ProcessId, TaskEntry>,
    next_generation: AtomicU64,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new task, replacing and cancelling any previous one
    ///
    /// Returns the ticket of the new task and whether a running task was
    /// replaced.
    pub fn register(&self, process_id: ProcessId, callback_url: Url) -> (TaskTicket, bool) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = CancelFlag::new();
        let entry = TaskEntry {
            generation,
            cancel: cancel.clone(),
            callback_url: callback_url.clone(),
            outcome: None,
        };

        let replaced = match self.tasks.entry(process_id.clone()) {
            Entry::Occupied(mut occupied) => {
                let previous = occupied.insert(entry);
                previous.cancel.cancel();
                previous.outcome.is_none()
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
                false
            }
        };

        (
            TaskTicket {
                process_id,
                generation,
                cancel,
                callback_url,
            },
            replaced,
        )
    }

    /// Whether `ticket` is still the registered task for its process id
    pub fn is_current(&self, ticket: &TaskTicket) -> bool {
        self.tasks
            .get(&ticket.process_id)
            .map_or(false, |entry| entry.generation == ticket.generation)
    }

    /// Publish the outcome of a task
    ///
    /// Returns false, leaving the registry untouched, when the task was
    /// replaced or cancelled in the meantime.
    pub fn complete(&self, ticket: &TaskTicket, outcome: TaskOutcome) -> bool {
        match self.tasks.get_mut(&ticket.process_id) {
            Some(mut entry) if entry.generation == ticket.generation => {
                entry.outcome = Some(outcome);
                true
            }
            _ => false,
        }
    }

    /// Status of a process id
    pub fn status(&self, process_id: &ProcessId) -> TaskStatus {
        match self.tasks.get(process_id) {
            None => TaskStatus::NotFound,
            Some(entry) if entry.outcome.is_none() => TaskStatus::Running,
            Some(_) => TaskStatus::Done,
        }
    }

    /// Take the result of a finished task, removing its entry
    ///
    /// A running task stays registered.
    pub fn take_result(&self, process_id: &ProcessId) -> TaskResult {
        match self
            .tasks
            .remove_if(process_id, |_, entry| entry.outcome.is_some())
        {
            Some((_, entry)) => match entry.outcome {
                Some(Ok(dataset)) => TaskResult::Ready(dataset),
                Some(Err(error)) => TaskResult::Failed(error),
                None => TaskResult::StillRunning,
            },
            None if self.tasks.contains_key(process_id) => TaskResult::StillRunning,
            None => TaskResult::NotFound,
        }
    }

    /// Cancel a task and remove its entry
    ///
    /// Returns false when nothing was registered under `process_id`.
    pub fn cancel(&self, process_id: &ProcessId) -> bool {
        match self.tasks.remove(process_id) {
            Some((_, entry)) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Callback URL registered for a process id
    pub fn callback_url(&self, process_id: &ProcessId) -> Option<Url> {
        self.tasks
            .get(process_id)
            .map(|entry| entry.callback_url.clone())
    }

    /// Number of registered tasks, finished ones included
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ColumnSpec, DataType};

    fn url() -> Url {
        Url::parse("http://localhost/cb").unwrap()
    }

    fn pid(id: &str) -> ProcessId {
        ProcessId::new(id).unwrap()
    }

    fn dataset() -> Arc<Dataset> {
        Arc::new(Dataset::new(vec![ColumnSpec::new("a", DataType::String)], vec![]).unwrap())
    }

    #[test]
    fn test_register_and_complete() {
        let registry = TaskRegistry::new();
        let (ticket, replaced) = registry.register(pid("p1"), url());
        assert!(!replaced);
        assert_eq!(registry.status(&pid("p1")), TaskStatus::Running);
        assert_eq!(registry.take_result(&pid("p1")), TaskResult::StillRunning);

        assert!(registry.complete(&ticket, Ok(dataset())));
        assert_eq!(registry.status(&pid("p1")), TaskStatus::Done);
        assert!(matches!(registry.take_result(&pid("p1")), TaskResult::Ready(_)));
        assert_eq!(registry.take_result(&pid("p1")), TaskResult::NotFound);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_replacement_cancels_and_discards() {
        let registry = TaskRegistry::new();
        let (first, _) = registry.register(pid("p1"), url());
        let (second, replaced) = registry.register(pid("p1"), url());

        assert!(replaced);
        assert!(first.cancel.is_cancelled());
        assert!(!second.cancel.is_cancelled());
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_current(&first));
        assert!(!registry.complete(&first, Ok(dataset())));
        assert_eq!(registry.status(&pid("p1")), TaskStatus::Running);
        assert!(registry.complete(&second, Err(AnonymizationError::Cancelled)));
        assert_eq!(
            registry.take_result(&pid("p1")),
            TaskResult::Failed(AnonymizationError::Cancelled)
        );
    }

    #[test]
    fn test_replacing_finished_task_is_not_a_replacement() {
        let registry = TaskRegistry::new();
        let (first, _) = registry.register(pid("p1"), url());
        registry.complete(&first, Ok(dataset()));
        let (_, replaced) = registry.register(pid("p1"), url());
        assert!(!replaced);
    }

    #[test]
    fn test_cancel_removes_entry() {
        let registry = TaskRegistry::new();
        let (ticket, _) = registry.register(pid("p1"), url());
        assert!(registry.cancel(&pid("p1")));
        assert!(ticket.cancel.is_cancelled());
        assert_eq!(registry.status(&pid("p1")), TaskStatus::NotFound);
        assert!(!registry.cancel(&pid("p1")));
        assert!(!registry.complete(&ticket, Ok(dataset())));
    }
}
