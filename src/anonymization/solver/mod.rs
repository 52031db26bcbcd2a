//! Anonymization solver seam
//!
//! The driver describes a run as an immutable [`EngineRequest`] and hands it
//! to an [`AnonymizationSolver`]. The solver decides how far each lattice
//! attribute is generalized and which records are suppressed; applying that
//! decision to the data is left to the driver.
//!
//! [`LatticeSolver`] is the built-in implementation.

pub mod lattice;
pub mod quality;

pub use lattice::LatticeSolver;
pub use quality::{AttributeLoss, QualityScorer};

use crate::anonymization::config::{
    MicroAggregationFunction, PrivacyModel, QualityModel, SearchAlgorithm,
};
use crate::anonymization::hierarchy::Hierarchy;
use crate::domain::{DataType, Dataset};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Cooperative cancellation signal shared between a task and its owner
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop at its next check
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fail with `Cancelled` once cancellation was requested
    pub fn check(&self) -> Result<(), SolverError> {
        if self.is_cancelled() {
            Err(SolverError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Role of an attribute in the release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeRole {
    /// Copied through
    Insensitive,
    /// Removed entirely
    Identifying,
    /// Generalized or aggregated to meet the privacy criteria
    QuasiIdentifying,
}

/// Microaggregation settings of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MicroAggregation {
    pub function: MicroAggregationFunction,
    pub ignore_missing_data: bool,
    pub perform_clustering: bool,
}

/// Everything the solver needs to know about one attribute
#[derive(Debug, Clone)]
pub struct AttributeSpec {
    pub name: String,
    pub column: usize,
    pub data_type: DataType,
    pub role: AttributeRole,
    pub hierarchy: Option<Arc<Hierarchy>>,
    /// Lowest generalization level the search may choose
    pub min_level: usize,
    /// Highest generalization level the search may choose
    pub max_level: usize,
    pub microaggregation: Option<MicroAggregation>,
}

impl AttributeSpec {
    /// Whether the attribute is a dimension of the generalization lattice
    pub fn in_lattice(&self) -> bool {
        self.role == AttributeRole::QuasiIdentifying
            && self.hierarchy.is_some()
            && self
                .microaggregation
                .map_or(true, |micro| micro.perform_clustering)
    }
}

/// Immutable description of one solver invocation
#[derive(Debug, Clone)]
pub struct EngineRequest {
    /// One spec per dataset column, in column order
    pub attributes: Vec<AttributeSpec>,
    pub criteria: Vec<PrivacyModel>,
    pub algorithm: SearchAlgorithm,
    /// Fraction of records that may be suppressed
    pub suppression_limit: f64,
    pub time_limit: Option<Duration>,
    pub step_limit: Option<u64>,
    pub dp_search_budget: Option<f64>,
    pub quality: QualityModel,
}

impl EngineRequest {
    /// Positions in `attributes` of the lattice dimensions
    pub fn lattice_attributes(&self) -> Vec<usize> {
        self.attributes
            .iter()
            .enumerate()
            .filter(|(_, a)| a.in_lattice())
            .map(|(i, _)| i)
            .collect()
    }

    /// Largest `k` among the k-anonymity criteria, 1 when there is none
    pub fn max_k(&self) -> usize {
        self.criteria
            .iter()
            .filter_map(|c| match c {
                PrivacyModel::KAnonymity { k } => Some(*k),
                _ => None,
            })
            .max()
            .unwrap_or(1)
    }

    /// Same request with another suppression limit
    pub fn with_suppression_limit(&self, suppression_limit: f64) -> Self {
        Self {
            suppression_limit,
            ..self.clone()
        }
    }
}

/// Transformation chosen by a solver
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Level per lattice attribute, in [`EngineRequest::lattice_attributes`] order
    pub levels: Vec<usize>,
    /// Suppression flag per record
    pub suppressed: Vec<bool>,
    /// Quality score of the node, lower is better
    pub score: f64,
    pub nodes_evaluated: usize,
}

impl Solution {
    pub fn suppressed_count(&self) -> usize {
        self.suppressed.iter().filter(|s| **s).count()
    }
}

/// Solver failures
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SolverError {
    /// No transformation satisfies the criteria within the suppression limit
    #[error("no solution: {0}")]
    NoSolution(String),

    #[error("solver run was cancelled")]
    Cancelled,

    #[error("solver failure: {0}")]
    Internal(String),
}

/// External anonymization engine
///
/// Implementations are synchronous and may block; callers run them on a
/// blocking thread and poll `cancel` cooperatively.
pub trait AnonymizationSolver: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Choose a transformation of `dataset` satisfying `request`
    fn solve(
        &self,
        dataset: &Dataset,
        request: &EngineRequest,
        cancel: &CancelFlag,
    ) -> Result<Solution, SolverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(flag.check().is_ok());
        clone.cancel();
        assert!(flag.is_cancelled());
        assert_eq!(flag.check(), Err(SolverError::Cancelled));
    }

    #[test]
    fn test_lattice_membership() {
        let hierarchy = Arc::new(Hierarchy::from_rows("a", vec![vec!["x".into(), "*".into()]]));
        let mut spec = AttributeSpec {
            name: "a".to_string(),
            column: 0,
            data_type: DataType::String,
            role: AttributeRole::QuasiIdentifying,
            hierarchy: Some(hierarchy),
            min_level: 0,
            max_level: 1,
            microaggregation: None,
        };
        assert!(spec.in_lattice());

        spec.microaggregation = Some(MicroAggregation {
            function: MicroAggregationFunction::Mode,
            ignore_missing_data: false,
            perform_clustering: false,
        });
        assert!(!spec.in_lattice());

        spec.role = AttributeRole::Insensitive;
        spec.microaggregation = None;
        assert!(!spec.in_lattice());
    }
}
