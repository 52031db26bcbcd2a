//! Integration tests for the asynchronous job orchestrator

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;
use veil::anonymization::audit::AuditLogger;
use veil::anonymization::config::IntervalSize;
use veil::anonymization::solver::{EngineRequest, Solution, SolverError};
use veil::anonymization::{
    AnonymizationDriver, AnonymizationSolver, AttributeConfig, CancelFlag, HierarchyKind,
    JobConfig, LatticeSolver, PrivacyModel,
};
use veil::config::VeilConfig;
use veil::core::jobs::{
    CallbackDispatcher, CallbackSink, FailureReport, JobOrchestrator, TaskRegistry, TaskResult,
    TaskStatus,
};
use veil::domain::{AnonymizationError, CallbackError, ColumnSpec, DataType, Dataset, ProcessId};

const CALLBACK_URL: &str = "http://localhost:9999/callback";

#[derive(Debug, Clone, PartialEq)]
enum Delivery {
    Success(usize),
    Failure(String),
}

#[derive(Default)]
struct RecordingSink {
    deliveries: Mutex<Vec<Delivery>>,
}

impl RecordingSink {
    fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }
}

#[async_trait]
impl CallbackSink for RecordingSink {
    async fn send_success(&self, _url: &Url, dataset: &Dataset) -> Result<(), CallbackError> {
        self.deliveries
            .lock()
            .unwrap()
            .push(Delivery::Success(dataset.row_count()));
        Ok(())
    }

    async fn send_failure(&self, _url: &Url, report: &FailureReport) -> Result<(), CallbackError> {
        self.deliveries
            .lock()
            .unwrap()
            .push(Delivery::Failure(report.error_code.clone()));
        Ok(())
    }
}

/// Holds every run until the gate opens or the run is cancelled
#[derive(Default)]
struct GatedSolver {
    open: AtomicBool,
    entered: AtomicBool,
    inner: LatticeSolver,
}

impl GatedSolver {
    async fn wait_entered(&self) {
        for _ in 0..500 {
            if self.entered.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("no run reached the solver");
    }
}

impl AnonymizationSolver for GatedSolver {
    fn name(&self) -> &str {
        "gated"
    }

    fn solve(
        &self,
        dataset: &Dataset,
        request: &EngineRequest,
        cancel: &CancelFlag,
    ) -> Result<Solution, SolverError> {
        self.entered.store(true, Ordering::SeqCst);
        while !self.open.load(Ordering::SeqCst) {
            cancel.check()?;
            std::thread::sleep(Duration::from_millis(5));
        }
        self.inner.solve(dataset, request, cancel)
    }
}

/// Panics inside the blocking worker
struct PanickingSolver;

impl AnonymizationSolver for PanickingSolver {
    fn name(&self) -> &str {
        "panicking"
    }

    fn solve(
        &self,
        _dataset: &Dataset,
        _request: &EngineRequest,
        _cancel: &CancelFlag,
    ) -> Result<Solution, SolverError> {
        panic!("solver state corrupted");
    }
}

fn ages_dataset(ages: &[i64]) -> Dataset {
    Dataset::new(
        vec![
            ColumnSpec::new("age", DataType::Integer),
            ColumnSpec::new("diagnosis", DataType::String),
        ],
        ages.iter()
            .map(|age| vec![age.to_string(), "flu".to_string()])
            .collect(),
    )
    .unwrap()
}

fn ages_job(k: usize) -> JobConfig {
    let mut job = JobConfig::new("ages");
    job.privacy_models = vec![PrivacyModel::KAnonymity { k }];
    job.attribute_configs = vec![
        AttributeConfig::new(0, "age", DataType::Integer).generalized(HierarchyKind::Intervals {
            interval_size: IntervalSize::Integer(5),
        }),
        AttributeConfig::new(1, "diagnosis", DataType::String),
    ];
    job
}

fn build_orchestrator(
    solver: Arc<dyn AnonymizationSolver>,
    sink: Arc<RecordingSink>,
) -> JobOrchestrator {
    build_audited_orchestrator(solver, sink, AuditLogger::disabled())
}

fn build_audited_orchestrator(
    solver: Arc<dyn AnonymizationSolver>,
    sink: Arc<RecordingSink>,
    audit: AuditLogger,
) -> JobOrchestrator {
    JobOrchestrator::new(
        Arc::new(TaskRegistry::new()),
        AnonymizationDriver::new(solver),
        CallbackDispatcher::new(sink, 3, Duration::from_millis(1)),
        Arc::new(audit),
        2,
    )
}

async fn wait_for_audit_lines(path: &std::path::Path, count: usize) -> Vec<serde_json::Value> {
    for _ in 0..500 {
        if let Ok(content) = std::fs::read_to_string(path) {
            let lines: Vec<serde_json::Value> = content
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect();
            if lines.len() >= count {
                return lines;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {count} audit lines in {}", path.display());
}

async fn wait_until_done(orchestrator: &JobOrchestrator, process_id: &ProcessId) {
    for _ in 0..500 {
        if orchestrator.status(process_id) == TaskStatus::Done {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {process_id} did not finish");
}

async fn wait_for_deliveries(sink: &RecordingSink, count: usize) {
    for _ in 0..500 {
        if sink.deliveries().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {count} callbacks, got {:?}", sink.deliveries());
}

fn pid(id: &str) -> ProcessId {
    ProcessId::new(id).unwrap()
}

#[tokio::test]
async fn test_successful_job_is_delivered_once() {
    let sink = Arc::new(RecordingSink::default());
    let orchestrator =
        build_orchestrator(Arc::new(LatticeSolver::default()), Arc::clone(&sink));

    let receipt = orchestrator
        .submit(
            pid("p1"),
            ages_job(3),
            ages_dataset(&[21, 22, 23, 26, 27, 28]),
            CALLBACK_URL,
        )
        .await
        .unwrap();
    assert!(!receipt.replaced);

    wait_until_done(&orchestrator, &pid("p1")).await;
    wait_for_deliveries(&sink, 1).await;
    assert_eq!(sink.deliveries(), vec![Delivery::Success(6)]);

    match orchestrator.result(&pid("p1")) {
        TaskResult::Ready(dataset) => assert_eq!(dataset.rows[0][0], "[21, 26["),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(orchestrator.result(&pid("p1")), TaskResult::NotFound);
    assert_eq!(orchestrator.status(&pid("p1")), TaskStatus::NotFound);
}

#[tokio::test]
async fn test_infeasible_job_reports_failure() {
    let sink = Arc::new(RecordingSink::default());
    let orchestrator =
        build_orchestrator(Arc::new(LatticeSolver::default()), Arc::clone(&sink));

    orchestrator
        .submit(pid("p1"), ages_job(5), ages_dataset(&[21, 22]), CALLBACK_URL)
        .await
        .unwrap();

    wait_until_done(&orchestrator, &pid("p1")).await;
    wait_for_deliveries(&sink, 1).await;
    assert_eq!(
        sink.deliveries(),
        vec![Delivery::Failure("ANON_NO_OPTIMUM_FOUND".to_string())]
    );
    assert!(matches!(
        orchestrator.result(&pid("p1")),
        TaskResult::Failed(AnonymizationError::NoOptimumFound(_))
    ));
}

#[tokio::test]
async fn test_resubmission_replaces_running_task() {
    let sink = Arc::new(RecordingSink::default());
    let solver = Arc::new(GatedSolver::default());
    let orchestrator = build_orchestrator(solver.clone(), Arc::clone(&sink));

    let first = orchestrator
        .submit(
            pid("p1"),
            ages_job(3),
            ages_dataset(&[21, 22, 23, 26, 27, 28]),
            CALLBACK_URL,
        )
        .await
        .unwrap();
    assert!(!first.replaced);
    assert_eq!(orchestrator.status(&pid("p1")), TaskStatus::Running);

    let second = orchestrator
        .submit(
            pid("p1"),
            ages_job(2),
            ages_dataset(&[30, 31, 32, 33]),
            CALLBACK_URL,
        )
        .await
        .unwrap();
    assert!(second.replaced);
    assert_eq!(orchestrator.registry().len(), 1);

    solver.open.store(true, Ordering::SeqCst);
    wait_until_done(&orchestrator, &pid("p1")).await;
    wait_for_deliveries(&sink, 1).await;

    // Give a late callback of the replaced run a chance to show up
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sink.deliveries(), vec![Delivery::Success(4)]);

    match orchestrator.result(&pid("p1")) {
        TaskResult::Ready(dataset) => assert_eq!(dataset.row_count(), 4),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_cancelled_task_never_calls_back() {
    let sink = Arc::new(RecordingSink::default());
    let solver = Arc::new(GatedSolver::default());
    let orchestrator = build_orchestrator(solver.clone(), Arc::clone(&sink));

    orchestrator
        .submit(
            pid("p1"),
            ages_job(3),
            ages_dataset(&[21, 22, 23, 26, 27, 28]),
            CALLBACK_URL,
        )
        .await
        .unwrap();

    assert!(orchestrator.cancel(&pid("p1")));
    assert!(!orchestrator.cancel(&pid("p1")));
    assert_eq!(orchestrator.status(&pid("p1")), TaskStatus::NotFound);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(sink.deliveries().is_empty());
    assert!(orchestrator.registry().is_empty());
}

#[tokio::test]
async fn test_invalid_submission_creates_no_task() {
    let sink = Arc::new(RecordingSink::default());
    let orchestrator =
        build_orchestrator(Arc::new(LatticeSolver::default()), Arc::clone(&sink));

    let mut job = ages_job(2);
    job.attribute_configs.clear();
    let err = orchestrator
        .submit(pid("p1"), job, ages_dataset(&[21, 22]), CALLBACK_URL)
        .await
        .unwrap_err();
    assert!(matches!(err, AnonymizationError::NoAttributeConfigured(_)));

    let err = orchestrator
        .submit(pid("p2"), ages_job(2), ages_dataset(&[21, 22]), "ftp://example.com/cb")
        .await
        .unwrap_err();
    assert!(matches!(err, AnonymizationError::InvalidCallbackUrl { .. }));

    assert!(orchestrator.registry().is_empty());
    assert!(sink.deliveries().is_empty());
}

#[tokio::test]
async fn test_rejected_resubmission_keeps_running_task() {
    let sink = Arc::new(RecordingSink::default());
    let solver = Arc::new(GatedSolver::default());
    let orchestrator = build_orchestrator(solver.clone(), Arc::clone(&sink));

    orchestrator
        .submit(
            pid("p1"),
            ages_job(3),
            ages_dataset(&[21, 22, 23, 26, 27, 28]),
            CALLBACK_URL,
        )
        .await
        .unwrap();
    assert!(orchestrator
        .submit(pid("p1"), ages_job(0), ages_dataset(&[21]), CALLBACK_URL)
        .await
        .is_err());

    solver.open.store(true, Ordering::SeqCst);
    wait_until_done(&orchestrator, &pid("p1")).await;
    wait_for_deliveries(&sink, 1).await;
    assert_eq!(sink.deliveries(), vec![Delivery::Success(6)]);
}

#[tokio::test]
async fn test_orchestrator_from_config_with_disabled_audit() {
    let mut config = VeilConfig::default();
    config.audit.enabled = false;
    let sink: Arc<dyn CallbackSink> = Arc::new(RecordingSink::default());
    let orchestrator = JobOrchestrator::with_sink(&config, sink).unwrap();
    assert_eq!(orchestrator.status(&pid("unknown")), TaskStatus::NotFound);
    assert_eq!(orchestrator.result(&pid("unknown")), TaskResult::NotFound);
}

#[tokio::test]
async fn test_hierarchy_errors_rejected_at_submission() {
    let sink = Arc::new(RecordingSink::default());
    let orchestrator =
        build_orchestrator(Arc::new(LatticeSolver::default()), Arc::clone(&sink));

    let mut job = ages_job(2);
    job.attribute_configs[0] =
        AttributeConfig::new(0, "age", DataType::Integer).generalized(HierarchyKind::Intervals {
            interval_size: IntervalSize::Text("abc".to_string()),
        });
    let err = orchestrator
        .submit(pid("p1"), job, ages_dataset(&[21, 22, 23]), CALLBACK_URL)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ANON_MALFORMED_INTERVAL_SIZE");

    let mut job = ages_job(2);
    job.attribute_configs[0].max_generalization_level = Some(40);
    let err = orchestrator
        .submit(pid("p2"), job, ages_dataset(&[21, 22, 23]), CALLBACK_URL)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AnonymizationError::InvalidGeneralizationSetting { .. }
    ));

    assert!(orchestrator.registry().is_empty());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(sink.deliveries().is_empty());
}

#[tokio::test]
async fn test_audit_marks_discarded_runs() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("audit.log");
    let sink = Arc::new(RecordingSink::default());
    let solver = Arc::new(GatedSolver::default());
    let orchestrator = build_audited_orchestrator(
        solver.clone(),
        Arc::clone(&sink),
        AuditLogger::new(log_path.clone(), true, true).unwrap(),
    );

    orchestrator
        .submit(
            pid("p1"),
            ages_job(3),
            ages_dataset(&[21, 22, 23, 26, 27, 28]),
            CALLBACK_URL,
        )
        .await
        .unwrap();
    solver.wait_entered().await;
    assert!(orchestrator.cancel(&pid("p1")));

    let lines = wait_for_audit_lines(&log_path, 1).await;
    assert_eq!(lines[0]["process_id"], "p1");
    assert_eq!(lines[0]["discarded"], true);

    solver.open.store(true, Ordering::SeqCst);
    orchestrator
        .submit(
            pid("p2"),
            ages_job(3),
            ages_dataset(&[21, 22, 23, 26, 27, 28]),
            CALLBACK_URL,
        )
        .await
        .unwrap();
    wait_for_deliveries(&sink, 1).await;

    let lines = wait_for_audit_lines(&log_path, 2).await;
    assert_eq!(lines[1]["process_id"], "p2");
    assert_eq!(lines[1]["outcome"], "succeeded");
    assert_eq!(lines[1]["discarded"], false);
    assert_eq!(lines[1]["metrics"]["min_class_size_anonymized"], 3.0);
}

#[tokio::test]
async fn test_panicking_run_reports_unknown_failure() {
    let sink = Arc::new(RecordingSink::default());
    let orchestrator = build_orchestrator(Arc::new(PanickingSolver), Arc::clone(&sink));

    orchestrator
        .submit(
            pid("p1"),
            ages_job(3),
            ages_dataset(&[21, 22, 23, 26, 27, 28]),
            CALLBACK_URL,
        )
        .await
        .unwrap();

    wait_until_done(&orchestrator, &pid("p1")).await;
    wait_for_deliveries(&sink, 1).await;
    assert_eq!(
        sink.deliveries(),
        vec![Delivery::Failure("ANON_UNKNOWN".to_string())]
    );
    assert!(matches!(
        orchestrator.result(&pid("p1")),
        TaskResult::Failed(AnonymizationError::UnexpectedAnonymizationFailure { .. })
    ));
}
