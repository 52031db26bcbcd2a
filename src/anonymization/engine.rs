//! Anonymization driver
//!
//! This module provides the [`AnonymizationDriver`] that turns a validated
//! [`JobConfig`] and a dataset into an anonymized dataset plus metrics.
//!
//! # Architecture
//!
//! A run goes through these steps:
//! - **Configuration**: hierarchies are built and every attribute is mapped
//!   to a role, level bounds and microaggregation settings, giving an
//!   immutable [`EngineRequest`]
//! - **Search**: the injected [`AnonymizationSolver`] picks a transformation
//! - **Refinement**: optional local generalization releases suppressed records
//! - **Measurement**: metrics of the original and anonymized data
//!
//! # Examples
//!
//! ```no_run
//! use veil::anonymization::{AnonymizationDriver, CancelFlag, JobConfig};
//! use veil::domain::Dataset;
//! use std::sync::Arc;
//!
//! # fn example(job: JobConfig, dataset: Dataset) -> anyhow::Result<()> {
//! let driver = AnonymizationDriver::default();
//! let outcome = driver.run(&job, Arc::new(dataset), &CancelFlag::new())?;
//! println!("{} records suppressed", outcome.suppressed_records);
//! # Ok(())
//! # }
//! ```

use crate::anonymization::config::{AttributeConfig, JobConfig, ProtectionStrategy};
use crate::anonymization::hierarchy::{build_hierarchy, Hierarchy};
use crate::anonymization::metrics::{self, DataHandle, MetricsReport};
use crate::anonymization::solver::{
    AnonymizationSolver, AttributeRole, AttributeSpec, CancelFlag, EngineRequest, LatticeSolver,
    MicroAggregation, SolverError,
};
use crate::anonymization::transform;
use crate::domain::{AnonymizationError, Dataset};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Lifecycle of one anonymization run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Configured,
    Running,
    Succeeded,
    FailedInfeasible,
    FailedOther,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::FailedInfeasible | Self::FailedOther
        )
    }

    fn can_become(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (Self::Configured, Self::Running)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::FailedInfeasible)
                | (Self::Running, Self::FailedOther)
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configured => "configured",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::FailedInfeasible => "failed_infeasible",
            Self::FailedOther => "failed_other",
        };
        f.write_str(name)
    }
}

/// State of one invocation of the driver
#[derive(Debug)]
pub struct AnonymizationRun {
    job: JobConfig,
    original: DataHandle,
    anonymized: Option<DataHandle>,
    status: RunStatus,
    metrics: Option<MetricsReport>,
}

impl AnonymizationRun {
    fn new(job: JobConfig, original: DataHandle) -> Self {
        Self {
            job,
            original,
            anonymized: None,
            status: RunStatus::Configured,
            metrics: None,
        }
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    fn transition(&mut self, next: RunStatus) -> Result<(), AnonymizationError> {
        if !self.status.can_become(next) {
            return Err(AnonymizationError::unexpected(
                format!("run of job '{}' cannot move to {next}", self.job.name),
                format!("current status is {}", self.status),
            ));
        }
        debug!(job = %self.job.name, from = %self.status, to = %next, "Run status changed");
        self.status = next;
        Ok(())
    }
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct AnonymizationOutcome {
    pub dataset: Dataset,
    /// Metrics of the original and anonymized data, suffixed keys
    pub metrics: MetricsReport,
    /// Chosen level per lattice attribute
    pub generalization_levels: BTreeMap<String, usize>,
    pub suppressed_records: usize,
    pub elapsed: Duration,
}

/// Drives one anonymization job through the solver
///
/// # Thread Safety
///
/// The driver holds no per-run state and can be shared across worker tasks
/// using `Arc`.
#[derive(Clone)]
pub struct AnonymizationDriver {
    solver: Arc<dyn AnonymizationSolver>,
}

impl Default for AnonymizationDriver {
    fn default() -> Self {
        Self::new(Arc::new(LatticeSolver::default()))
    }
}

impl fmt::Debug for AnonymizationDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnonymizationDriver")
            .field("solver", &self.solver.name())
            .finish()
    }
}

impl AnonymizationDriver {
    /// Create a driver around a solver
    pub fn new(solver: Arc<dyn AnonymizationSolver>) -> Self {
        Self { solver }
    }

    /// Build the solver request for a job
    ///
    /// # Errors
    ///
    /// Returns hierarchy construction errors and `InvalidGeneralizationSetting`
    /// when level bounds exceed the built hierarchy.
    pub fn build_request(
        &self,
        job: &JobConfig,
        dataset: &Dataset,
    ) -> Result<EngineRequest, AnonymizationError> {
        let mut attributes = Vec::with_capacity(job.attribute_configs.len());
        for attribute in job.attributes_in_order() {
            let role = match attribute.protection_strategy {
                ProtectionStrategy::NoProtection => AttributeRole::Insensitive,
                ProtectionStrategy::Removal => AttributeRole::Identifying,
                ProtectionStrategy::Generalization | ProtectionStrategy::Microaggregation => {
                    AttributeRole::QuasiIdentifying
                }
            };

            let hierarchy = match (&attribute.hierarchy_config, role) {
                (Some(config), AttributeRole::QuasiIdentifying) => {
                    let values: Vec<&str> = dataset.column_values(attribute.index).collect();
                    Some(Arc::new(build_hierarchy(
                        &values,
                        attribute.data_type,
                        config,
                        job.retain_data_type,
                    )?))
                }
                _ => None,
            };

            let (min_level, max_level) = match &hierarchy {
                Some(hierarchy) => level_bounds(attribute, hierarchy)?,
                None => (0, 0),
            };

            let microaggregation = match attribute.protection_strategy {
                ProtectionStrategy::Microaggregation => {
                    attribute
                        .micro_aggregation_function
                        .map(|function| MicroAggregation {
                            function,
                            ignore_missing_data: attribute.ignore_missing_data,
                            perform_clustering: attribute.perform_clustering,
                        })
                }
                _ => None,
            };

            attributes.push(AttributeSpec {
                name: attribute.name.clone(),
                column: attribute.index,
                data_type: attribute.data_type,
                role,
                hierarchy,
                min_level,
                max_level,
                microaggregation,
            });
        }

        Ok(EngineRequest {
            attributes,
            criteria: job.privacy_models.clone(),
            algorithm: job.algorithm,
            suppression_limit: job.suppression_limit.fraction()?,
            time_limit: job.heuristic_search_time_limit.map(Duration::from_millis),
            step_limit: job.heuristic_search_step_limit,
            dp_search_budget: job.differential_privacy_search_budget,
            quality: job.effective_quality_model(),
        })
    }

    /// Run a job to completion
    ///
    /// # Errors
    ///
    /// `NoOptimumFound` when no transformation meets the privacy models
    /// within the suppression limit, `Cancelled` when `cancel` fired, and
    /// validation or unexpected errors otherwise.
    pub fn run(
        &self,
        job: &JobConfig,
        dataset: Arc<Dataset>,
        cancel: &CancelFlag,
    ) -> Result<AnonymizationOutcome, AnonymizationError> {
        let started = Instant::now();
        job.validate_against(&dataset)?;
        let request = self.build_request(job, &dataset)?;

        let quasi_identifiers: Vec<usize> = request
            .attributes
            .iter()
            .filter(|a| a.role == AttributeRole::QuasiIdentifying)
            .map(|a| a.column)
            .collect();
        let mut run = AnonymizationRun::new(
            job.clone(),
            DataHandle::original(Arc::clone(&dataset), quasi_identifiers.clone()),
        );
        run.transition(RunStatus::Running)?;

        info!(
            job = %job.name,
            solver = self.solver.name(),
            rows = dataset.row_count(),
            quasi_identifiers = quasi_identifiers.len(),
            algorithm = ?job.algorithm,
            "Anonymization run started"
        );

        let (output, suppressed, levels) = match self.execute(job, &dataset, &request, cancel) {
            Ok(result) => result,
            Err(e) => {
                let status = if e.is_infeasible() {
                    RunStatus::FailedInfeasible
                } else {
                    RunStatus::FailedOther
                };
                run.transition(status)?;
                warn!(job = %job.name, status = %status, error = %e, "Anonymization run failed");
                return Err(e);
            }
        };

        let lattice = request.lattice_attributes();
        let generalization_levels = lattice
            .iter()
            .zip(&levels)
            .map(|(&position, &level)| (request.attributes[position].name.clone(), level))
            .collect();
        let suppressed_records = suppressed.iter().filter(|s| **s).count();

        let anonymized = DataHandle::anonymized(
            Arc::new(output),
            quasi_identifiers,
            suppressed,
            Arc::clone(&dataset),
        );
        let metrics = metrics::extract_pair(&run.original, &anonymized);
        run.anonymized = Some(anonymized);
        run.metrics = Some(metrics);
        run.transition(RunStatus::Succeeded)?;

        let elapsed = started.elapsed();
        info!(
            job = %job.name,
            suppressed_records,
            duration_ms = elapsed.as_millis() as u64,
            "Anonymization run succeeded"
        );

        let AnonymizationRun {
            anonymized,
            metrics,
            ..
        } = run;
        let dataset = anonymized
            .map(|handle| Arc::unwrap_or_clone(handle.data))
            .unwrap_or_else(|| Dataset {
                columns: Vec::new(),
                rows: Vec::new(),
            });

        Ok(AnonymizationOutcome {
            dataset,
            metrics: metrics.unwrap_or_default(),
            generalization_levels,
            suppressed_records,
            elapsed,
        })
    }

    fn execute(
        &self,
        job: &JobConfig,
        dataset: &Dataset,
        request: &EngineRequest,
        cancel: &CancelFlag,
    ) -> Result<(Dataset, Vec<bool>, Vec<usize>), AnonymizationError> {
        let solution = self
            .solver
            .solve(dataset, request, cancel)
            .map_err(classify_solver_error)?;
        let mut output = transform::apply(dataset, request, &solution, job.retain_data_type)?;
        let mut suppressed = solution.suppressed.clone();

        if job.local_generalization {
            self.refine_locally(job, dataset, request, &mut output, &mut suppressed, cancel)?;
        }

        Ok((output, suppressed, solution.levels))
    }

    /// Release suppressed records by re-solving them as a sub-problem
    fn refine_locally(
        &self,
        job: &JobConfig,
        dataset: &Dataset,
        request: &EngineRequest,
        output: &mut Dataset,
        suppressed: &mut [bool],
        cancel: &CancelFlag,
    ) -> Result<(), AnonymizationError> {
        let iterations = job.local_generalization_iterations.max(1);
        let sub_request = request.with_suppression_limit(1.0 - 1.0 / f64::from(iterations));

        for iteration in 1..=iterations {
            cancel.check().map_err(classify_solver_error)?;

            let pending: Vec<usize> = (0..suppressed.len()).filter(|&r| suppressed[r]).collect();
            if pending.is_empty() {
                break;
            }

            let subset = dataset.subset(&pending);
            let solution = match self.solver.solve(&subset, &sub_request, cancel) {
                Ok(solution) => solution,
                Err(SolverError::NoSolution(reason)) => {
                    debug!(iteration, reason = %reason, "Local generalization found no further release");
                    break;
                }
                Err(e) => return Err(classify_solver_error(e)),
            };

            let refined = transform::apply(&subset, &sub_request, &solution, job.retain_data_type)?;
            let mut released = 0;
            for (sub_row, &row) in pending.iter().enumerate() {
                if !solution.suppressed[sub_row] {
                    output.rows[row] = refined.rows[sub_row].clone();
                    suppressed[row] = false;
                    released += 1;
                }
            }

            debug!(
                iteration,
                pending = pending.len(),
                released,
                "Local generalization iteration"
            );
            if released == 0 {
                break;
            }
        }
        Ok(())
    }
}

fn level_bounds(
    attribute: &AttributeConfig,
    hierarchy: &Hierarchy,
) -> Result<(usize, usize), AnonymizationError> {
    let top = hierarchy.max_level();
    let min = attribute.min_generalization_level.unwrap_or(0);
    let max = attribute.max_generalization_level.unwrap_or(top);
    if max > top || min > top {
        return Err(AnonymizationError::InvalidGeneralizationSetting {
            attribute: attribute.name.clone(),
            reason: format!(
                "levels {min}..={max} exceed the hierarchy, whose highest level is {top}"
            ),
        });
    }
    if min > max {
        return Err(AnonymizationError::InvalidGeneralizationSetting {
            attribute: attribute.name.clone(),
            reason: format!("minimum level {min} is greater than maximum level {max}"),
        });
    }
    Ok((min, max))
}

fn classify_solver_error(error: SolverError) -> AnonymizationError {
    match error {
        SolverError::NoSolution(reason) => AnonymizationError::NoOptimumFound(reason),
        SolverError::Cancelled => AnonymizationError::Cancelled,
        SolverError::Internal(cause) => {
            AnonymizationError::unexpected("anonymization engine failed", cause)
        }
    }
}
