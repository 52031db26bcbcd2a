//! Full-domain generalization lattice search with record suppression
//!
//! A lattice node assigns one generalization level to every lattice
//! attribute. Evaluating a node groups the records by their generalized
//! quasi-identifiers and suppresses whole classes until the privacy criteria
//! hold; the node is feasible when they do within the suppression limit.

use super::quality::{AttributeLoss, QualityScorer};
use super::{AnonymizationSolver, CancelFlag, EngineRequest, Solution, SolverError};
use crate::anonymization::config::{PrivacyModel, SearchAlgorithm};
use crate::domain::Dataset;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Time limit of heuristic searches when the job sets none
pub const DEFAULT_HEURISTIC_TIME_LIMIT: Duration = Duration::from_secs(30);

/// Lattices larger than this are searched bottom-up instead of exhaustively
pub const DEFAULT_MAX_EXHAUSTIVE_NODES: usize = 100_000;

/// Built-in solver searching the generalization lattice
#[derive(Debug, Clone)]
pub struct LatticeSolver {
    max_exhaustive_nodes: usize,
    default_time_limit: Duration,
}

impl Default for LatticeSolver {
    fn default() -> Self {
        Self {
            max_exhaustive_nodes: DEFAULT_MAX_EXHAUSTIVE_NODES,
            default_time_limit: DEFAULT_HEURISTIC_TIME_LIMIT,
        }
    }
}

impl LatticeSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap on the lattice size searched exhaustively
    pub fn with_max_exhaustive_nodes(mut self, nodes: usize) -> Self {
        self.max_exhaustive_nodes = nodes.max(1);
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct Evaluation {
    feasible: bool,
    suppressed: usize,
    score: f64,
}

struct Classified {
    suppressed: Vec<bool>,
    suppressed_count: usize,
    class_sizes: Vec<usize>,
    criteria_hold: bool,
}

struct Search<'a> {
    request: &'a EngineRequest,
    cancel: &'a CancelFlag,
    /// Generalized value codes indexed by lattice attribute, level and row
    codes: Vec<Vec<Vec<u32>>>,
    min: Vec<usize>,
    max: Vec<usize>,
    rows: usize,
    max_suppressed: usize,
    scorer: QualityScorer,
    cache: HashMap<Vec<usize>, Evaluation>,
    deadline: Option<Instant>,
    step_limit: Option<u64>,
}

impl<'a> Search<'a> {
    fn new(
        dataset: &Dataset,
        request: &'a EngineRequest,
        cancel: &'a CancelFlag,
    ) -> Result<Self, SolverError> {
        let lattice = request.lattice_attributes();
        let mut codes = Vec::with_capacity(lattice.len());
        let mut losses = Vec::with_capacity(lattice.len());
        let mut min = Vec::with_capacity(lattice.len());
        let mut max = Vec::with_capacity(lattice.len());

        for &position in &lattice {
            let spec = &request.attributes[position];
            let hierarchy = spec.hierarchy.as_ref().ok_or_else(|| {
                SolverError::Internal(format!("lattice attribute '{}' has no hierarchy", spec.name))
            })?;
            if spec.column >= dataset.column_count() {
                return Err(SolverError::Internal(format!(
                    "attribute '{}' refers to missing column {}",
                    spec.name, spec.column
                )));
            }

            let column: Vec<&str> = dataset.column_values(spec.column).collect();
            let per_level: Vec<Vec<u32>> = (0..hierarchy.depth())
                .map(|level| {
                    let mut dictionary: HashMap<&str, u32> = HashMap::new();
                    column
                        .iter()
                        .map(|value| {
                            let next = dictionary.len() as u32;
                            *dictionary
                                .entry(hierarchy.generalize(value, level))
                                .or_insert(next)
                        })
                        .collect::<Vec<u32>>()
                })
                .collect();

            codes.push(per_level);
            losses.push(AttributeLoss::compute(&column, hierarchy));
            let top = hierarchy.max_level();
            let upper = spec.max_level.min(top);
            min.push(spec.min_level.min(upper));
            max.push(upper);
        }

        let rows = dataset.row_count();
        let max_suppressed = (request.suppression_limit * rows as f64 + 1e-9).floor() as usize;
        let heuristic = request.algorithm.is_heuristic();

        Ok(Self {
            request,
            cancel,
            codes,
            min,
            max,
            rows,
            max_suppressed,
            scorer: QualityScorer::new(request.quality.clone(), losses),
            cache: HashMap::new(),
            deadline: None,
            step_limit: if heuristic { request.step_limit } else { None },
        })
    }

    fn node_count(&self) -> usize {
        self.min
            .iter()
            .zip(&self.max)
            .fold(1usize, |acc, (lo, hi)| acc.saturating_mul(hi - lo + 1))
    }

    fn limits_reached(&self) -> bool {
        let steps_exhausted = self
            .step_limit
            .is_some_and(|limit| self.cache.len() as u64 >= limit);
        let out_of_time = self.deadline.is_some_and(|deadline| Instant::now() >= deadline);
        steps_exhausted || out_of_time
    }

    fn classify(&self, node: &[usize]) -> Classified {
        let mut classes: HashMap<Vec<u32>, Vec<usize>> = HashMap::new();
        for row in 0..self.rows {
            let key: Vec<u32> = node
                .iter()
                .enumerate()
                .map(|(attribute, &level)| self.codes[attribute][level][row])
                .collect();
            classes.entry(key).or_default().push(row);
        }

        let mut groups: Vec<Vec<usize>> = classes.into_values().collect();
        groups.sort_by_key(|group| (group.len(), group[0]));

        let mut suppressed = vec![false; self.rows];
        let mut suppress = |group: &[usize]| {
            for &row in group {
                suppressed[row] = true;
            }
        };

        let k = self.request.max_k();
        let (small, mut released): (Vec<Vec<usize>>, Vec<Vec<usize>>) =
            groups.into_iter().partition(|group| group.len() < k);
        small.iter().for_each(|group| suppress(group));

        let mut criteria_hold = true;
        for criterion in &self.request.criteria {
            match criterion {
                PrivacyModel::KAnonymity { .. } => {}
                PrivacyModel::PopulationUniqueness { threshold } => {
                    let records: usize = released.iter().map(Vec::len).sum();
                    let uniques = released.iter().filter(|g| g.len() == 1).count();
                    if records > 0 && uniques as f64 / records as f64 > *threshold {
                        let (singletons, rest): (Vec<_>, Vec<_>) =
                            released.into_iter().partition(|g| g.len() == 1);
                        singletons.iter().for_each(|group| suppress(group));
                        released = rest;
                    }
                }
                PrivacyModel::AverageReidentificationRisk { threshold } => loop {
                    let records: usize = released.iter().map(Vec::len).sum();
                    if records == 0 {
                        break;
                    }
                    let classes = released.len();
                    let risk = classes as f64 / records as f64;
                    if risk <= *threshold {
                        break;
                    }
                    let smallest = released[0].len();
                    let remaining = records - smallest;
                    let lowered = if remaining == 0 {
                        0.0
                    } else {
                        (classes - 1) as f64 / remaining as f64
                    };
                    if lowered < risk {
                        let group = released.remove(0);
                        suppress(&group);
                    } else {
                        criteria_hold = false;
                        break;
                    }
                },
            }
        }

        let suppressed_count = suppressed.iter().filter(|s| **s).count();
        Classified {
            suppressed,
            suppressed_count,
            class_sizes: released.iter().map(Vec::len).collect(),
            criteria_hold,
        }
    }

    fn evaluate(&mut self, node: &[usize]) -> Result<Evaluation, SolverError> {
        if let Some(evaluation) = self.cache.get(node) {
            return Ok(*evaluation);
        }
        self.cancel.check()?;

        let classified = self.classify(node);
        let evaluation = Evaluation {
            feasible: classified.criteria_hold && classified.suppressed_count <= self.max_suppressed,
            suppressed: classified.suppressed_count,
            score: self.scorer.score(
                node,
                &classified.class_sizes,
                classified.suppressed_count,
                self.rows,
            ),
        };
        self.cache.insert(node.to_vec(), evaluation);
        Ok(evaluation)
    }

    fn neighbours(&self, node: &[usize], upward: bool) -> Vec<Vec<usize>> {
        (0..node.len())
            .filter_map(|i| {
                let mut next = node.to_vec();
                if upward && node[i] < self.max[i] {
                    next[i] += 1;
                    Some(next)
                } else if !upward && node[i] > self.min[i] {
                    next[i] -= 1;
                    Some(next)
                } else {
                    None
                }
            })
            .collect()
    }

    fn exhaustive(&mut self) -> Result<Option<(Vec<usize>, Evaluation)>, SolverError> {
        let mut best = None;
        let mut node = self.min.clone();
        loop {
            let evaluation = self.evaluate(&node)?;
            consider(&mut best, &node, evaluation);

            // odometer increment over [min, max]
            let mut position = 0;
            loop {
                if position == node.len() {
                    return Ok(best);
                }
                if node[position] < self.max[position] {
                    node[position] += 1;
                    break;
                }
                node[position] = self.min[position];
                position += 1;
            }
        }
    }

    fn bottom_up(&mut self) -> Result<Option<(Vec<usize>, Evaluation)>, SolverError> {
        let mut best = None;
        let mut current = self.min.clone();
        let mut evaluation = self.evaluate(&current)?;
        consider(&mut best, &current, evaluation);

        while !evaluation.feasible && !self.limits_reached() {
            let successors = self.neighbours(&current, true);
            if successors.is_empty() {
                break;
            }

            let mut next: Option<(Vec<usize>, Evaluation)> = None;
            for successor in successors {
                if self.limits_reached() {
                    break;
                }
                let candidate = self.evaluate(&successor)?;
                consider(&mut best, &successor, candidate);
                let better = match &next {
                    None => true,
                    Some((node, current_best)) => climb_order(&successor, &candidate, node, current_best)
                        == Ordering::Less,
                };
                if better {
                    next = Some((successor, candidate));
                }
            }

            match next {
                Some((node, candidate)) => {
                    current = node;
                    evaluation = candidate;
                }
                None => break,
            }
        }
        Ok(best)
    }

    fn top_down(&mut self) -> Result<Option<(Vec<usize>, Evaluation)>, SolverError> {
        let mut best = None;
        let mut current = self.max.clone();
        let evaluation = self.evaluate(&current)?;
        if !evaluation.feasible {
            return Ok(None);
        }
        consider(&mut best, &current, evaluation);

        while !self.limits_reached() {
            let mut next: Option<(Vec<usize>, Evaluation)> = None;
            for predecessor in self.neighbours(&current, false) {
                if self.limits_reached() {
                    break;
                }
                let candidate = self.evaluate(&predecessor)?;
                if candidate.feasible
                    && next
                        .as_ref()
                        .map_or(true, |(node, e)| rank(&predecessor, &candidate, node, e) == Ordering::Less)
                {
                    next = Some((predecessor, candidate));
                }
            }

            match next {
                Some((node, candidate)) => {
                    consider(&mut best, &node, candidate);
                    current = node;
                }
                None => break,
            }
        }
        Ok(best)
    }
}

fn level_sum(node: &[usize]) -> usize {
    node.iter().sum()
}

/// Lower score first, then less generalization
fn rank(a: &[usize], ea: &Evaluation, b: &[usize], eb: &Evaluation) -> Ordering {
    ea.score
        .partial_cmp(&eb.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| level_sum(a).cmp(&level_sum(b)))
}

/// Feasible first, then fewer suppressed records, then [`rank`]
fn climb_order(a: &[usize], ea: &Evaluation, b: &[usize], eb: &Evaluation) -> Ordering {
    eb.feasible
        .cmp(&ea.feasible)
        .then_with(|| ea.suppressed.cmp(&eb.suppressed))
        .then_with(|| rank(a, ea, b, eb))
}

fn consider(best: &mut Option<(Vec<usize>, Evaluation)>, node: &[usize], evaluation: Evaluation) {
    if !evaluation.feasible {
        return;
    }
    let replace = match best {
        None => true,
        Some((current, current_eval)) => {
            rank(node, &evaluation, current, current_eval) == Ordering::Less
        }
    };
    if replace {
        *best = Some((node.to_vec(), evaluation));
    }
}

impl AnonymizationSolver for LatticeSolver {
    fn name(&self) -> &str {
        "lattice"
    }

    fn solve(
        &self,
        dataset: &Dataset,
        request: &EngineRequest,
        cancel: &CancelFlag,
    ) -> Result<Solution, SolverError> {
        let started = Instant::now();
        let mut search = Search::new(dataset, request, cancel)?;

        if let Some(budget) = request.dp_search_budget {
            debug!(budget, "Differential privacy search budget is not used by the lattice solver");
        }

        let nodes = search.node_count();
        debug!(
            nodes,
            rows = search.rows,
            max_suppressed = search.max_suppressed,
            algorithm = ?request.algorithm,
            "Searching generalization lattice"
        );

        let best = match request.algorithm {
            SearchAlgorithm::Optimal if nodes <= self.max_exhaustive_nodes => search.exhaustive()?,
            SearchAlgorithm::Optimal => {
                warn!(
                    nodes,
                    cap = self.max_exhaustive_nodes,
                    "Lattice too large for exhaustive search, falling back to bottom-up"
                );
                search.deadline = Some(started + request.time_limit.unwrap_or(self.default_time_limit));
                search.bottom_up()?
            }
            SearchAlgorithm::BestEffortBottomUp => {
                search.deadline = Some(started + request.time_limit.unwrap_or(self.default_time_limit));
                search.bottom_up()?
            }
            SearchAlgorithm::BestEffortTopDown => {
                search.deadline = Some(started + request.time_limit.unwrap_or(self.default_time_limit));
                search.top_down()?
            }
        };

        let nodes_evaluated = search.cache.len();
        let Some((levels, evaluation)) = best else {
            return Err(SolverError::NoSolution(format!(
                "no transformation satisfies {} within a suppression limit of {} records ({} nodes evaluated)",
                request
                    .criteria
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
                search.max_suppressed,
                nodes_evaluated
            )));
        };

        let classified = search.classify(&levels);
        info!(
            levels = ?levels,
            suppressed = classified.suppressed_count,
            score = evaluation.score,
            nodes_evaluated,
            duration_ms = started.elapsed().as_millis() as u64,
            "Lattice search finished"
        );

        Ok(Solution {
            levels,
            suppressed: classified.suppressed,
            score: evaluation.score,
            nodes_evaluated,
        })
    }
}
