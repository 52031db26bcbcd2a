//! Asynchronous job orchestrator
//!
//! Accepts anonymization jobs keyed by process id, runs them on a bounded
//! pool of blocking workers and reports every outcome exactly once through a
//! callback.

use crate::anonymization::audit::{AuditLogger, AuditRecord};
use crate::anonymization::metrics::MetricsReport;
use crate::anonymization::{AnonymizationDriver, AnonymizationOutcome, JobConfig};
use crate::config::VeilConfig;
use crate::core::jobs::callback::{
    parse_callback_url, CallbackDispatcher, CallbackPayload, CallbackSink, FailureReport,
    HttpCallbackClient,
};
use crate::core::jobs::registry::{TaskRegistry, TaskResult, TaskStatus, TaskTicket};
use crate::domain::{AnonymizationError, Dataset, ProcessId};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

/// Answer to an accepted submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub process_id: ProcessId,
    /// Whether a running task with the same id was cancelled and replaced
    pub replaced: bool,
    pub message: String,
}

/// Runs anonymization jobs off the caller's task
///
/// # Example
///
/// ```no_run
/// use veil::config::VeilConfig;
/// use veil::core::jobs::JobOrchestrator;
///
/// # async fn example(job: veil::anonymization::JobConfig, dataset: veil::domain::Dataset)
/// #     -> veil::domain::Result<()> {
/// let orchestrator = JobOrchestrator::from_config(&VeilConfig::default())?;
/// let process_id = veil::domain::ProcessId::generate();
/// let receipt = orchestrator
///     .submit(process_id, job, dataset, "https://example.com/callback")
///     .await?;
/// println!("{}", receipt.message);
/// # Ok(())
/// # }
/// ```
pub struct JobOrchestrator {
    registry: Arc<TaskRegistry>,
    driver: AnonymizationDriver,
    callbacks: CallbackDispatcher,
    audit: Arc<AuditLogger>,
    workers: Arc<Semaphore>,
}

impl JobOrchestrator {
    /// Create an orchestrator from its collaborators
    pub fn new(
        registry: Arc<TaskRegistry>,
        driver: AnonymizationDriver,
        callbacks: CallbackDispatcher,
        audit: Arc<AuditLogger>,
        max_concurrent_jobs: usize,
    ) -> Self {
        Self {
            registry,
            driver,
            callbacks,
            audit,
            workers: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
        }
    }

    /// Create an orchestrator posting callbacks over HTTP
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or the audit log can't be set up
    pub fn from_config(config: &VeilConfig) -> crate::domain::Result<Self> {
        let sink: Arc<dyn CallbackSink> = Arc::new(HttpCallbackClient::new(&config.callback)?);
        Self::with_sink(config, sink)
    }

    /// Create an orchestrator delivering callbacks to `sink`
    pub fn with_sink(
        config: &VeilConfig,
        sink: Arc<dyn CallbackSink>,
    ) -> crate::domain::Result<Self> {
        let audit = AuditLogger::new(
            config.audit.log_path.clone(),
            config.audit.json_format,
            config.audit.enabled,
        )
        .map_err(|e| crate::domain::VeilError::Configuration(format!("{e:#}")))?;

        Ok(Self::new(
            Arc::new(TaskRegistry::new()),
            AnonymizationDriver::default(),
            CallbackDispatcher::from_config(sink, &config.callback),
            Arc::new(audit),
            config.workers.max_concurrent_jobs,
        ))
    }

    /// Shared task registry
    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Validate and dispatch a job
    ///
    /// Validation, hierarchy construction included, runs before anything is
    /// registered; a rejected job leaves any running task with the same id
    /// untouched.
    ///
    /// # Errors
    ///
    /// Any validation or hierarchy error of the job against the dataset, or
    /// an invalid callback URL.
    pub async fn submit(
        &self,
        process_id: ProcessId,
        job: JobConfig,
        dataset: Dataset,
        callback_url: &str,
    ) -> Result<SubmissionReceipt, AnonymizationError> {
        let url = parse_callback_url(callback_url)?;
        job.validate_against(&dataset)?;
        // Hierarchy and level bound errors must surface here, not in a callback
        self.driver.build_request(&job, &dataset)?;

        let (ticket, replaced) = self.registry.register(process_id.clone(), url);
        if replaced {
            tracing::warn!(
                process_id = %process_id,
                "Replacing running task for process id"
            );
        }

        self.spawn_worker(ticket, job, Arc::new(dataset));

        let message = if replaced {
            format!("Anonymization for process {process_id} restarted; the previous run was cancelled")
        } else {
            format!("Anonymization for process {process_id} accepted")
        };
        Ok(SubmissionReceipt {
            process_id,
            replaced,
            message,
        })
    }

    /// Status of a process id
    pub fn status(&self, process_id: &ProcessId) -> TaskStatus {
        self.registry.status(process_id)
    }

    /// Result of a process id, removed once it is returned
    pub fn result(&self, process_id: &ProcessId) -> TaskResult {
        self.registry.take_result(process_id)
    }

    /// Cancel a process id
    ///
    /// Returns false when nothing was registered under it.
    pub fn cancel(&self, process_id: &ProcessId) -> bool {
        let cancelled = self.registry.cancel(process_id);
        if cancelled {
            tracing::info!(process_id = %process_id, "Task cancelled");
        }
        cancelled
    }

    fn spawn_worker(&self, ticket: TaskTicket, job: JobConfig, dataset: Arc<Dataset>) {
        let registry = Arc::clone(&self.registry);
        let driver = self.driver.clone();
        let callbacks = self.callbacks.clone();
        let audit = Arc::clone(&self.audit);
        let workers = Arc::clone(&self.workers);

        tokio::spawn(async move {
            let _permit = match workers.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::error!(process_id = %ticket.process_id, error = %e, "Worker pool closed");
                    return;
                }
            };

            if !registry.is_current(&ticket) {
                tracing::debug!(process_id = %ticket.process_id, "Task replaced before it started");
                return;
            }

            crate::log_job_start!(ticket.process_id, job.name, dataset.row_count());
            let started = Instant::now();

            let cancel = ticket.cancel.clone();
            let input = Arc::clone(&dataset);
            let job_for_run = job.clone();
            let joined =
                tokio::task::spawn_blocking(move || driver.run(&job_for_run, input, &cancel)).await;

            let outcome: Result<AnonymizationOutcome, AnonymizationError> = match joined {
                Ok(result) => result,
                Err(e) => Err(AnonymizationError::unexpected(
                    "anonymization worker aborted",
                    e,
                )),
            };
            let elapsed = started.elapsed();

            let (published, payload, summary) = match outcome {
                Ok(outcome) => {
                    crate::log_job_complete!(ticket.process_id, outcome.suppressed_records, elapsed);
                    let AnonymizationOutcome {
                        dataset: anonymized,
                        metrics,
                        generalization_levels,
                        suppressed_records,
                        ..
                    } = outcome;
                    let anonymized = Arc::new(anonymized);
                    (
                        Ok(Arc::clone(&anonymized)),
                        CallbackPayload::Success(anonymized),
                        RunSummary {
                            suppressed_records,
                            generalization_levels,
                            metrics: Some(metrics),
                            error: None,
                        },
                    )
                }
                Err(error) => {
                    tracing::warn!(
                        process_id = %ticket.process_id,
                        error_code = error.code(),
                        error = %error,
                        "Anonymization job failed"
                    );
                    let report = FailureReport::from(&error);
                    (
                        Err(error.clone()),
                        CallbackPayload::Failure(report),
                        RunSummary {
                            suppressed_records: 0,
                            generalization_levels: BTreeMap::new(),
                            metrics: None,
                            error: Some(error),
                        },
                    )
                }
            };

            let current = registry.complete(&ticket, published);
            audit_outcome(
                &audit,
                &ticket,
                &job,
                &dataset,
                &summary,
                elapsed.as_millis() as u64,
                !current,
            );
            if !current {
                tracing::info!(
                    process_id = %ticket.process_id,
                    generation = ticket.generation,
                    "Discarding result of replaced or cancelled task"
                );
                return;
            }

            callbacks.dispatch(ticket.process_id.clone(), ticket.callback_url.clone(), payload);
        });
    }
}

/// Parts of a finished run kept for the audit log
struct RunSummary {
    suppressed_records: usize,
    generalization_levels: BTreeMap<String, usize>,
    metrics: Option<MetricsReport>,
    error: Option<AnonymizationError>,
}

fn audit_outcome(
    audit: &AuditLogger,
    ticket: &TaskTicket,
    job: &JobConfig,
    input: &Dataset,
    summary: &RunSummary,
    processing_time_ms: u64,
    discarded: bool,
) {
    if !audit.is_enabled() {
        return;
    }
    let record = AuditRecord {
        process_id: &ticket.process_id,
        job: &job.name,
        input,
        suppressed_records: summary.suppressed_records,
        generalization_levels: &summary.generalization_levels,
        dataset_metrics: summary.metrics.as_ref().map(|m| &m.dataset_metrics),
        processing_time_ms,
        error: summary.error.as_ref(),
        discarded,
    };
    if let Err(e) = audit.log_job(&record) {
        let error = format!("{e:#}");
        crate::log_error_with_context!(error, "Failed to write audit entry");
    }
}
