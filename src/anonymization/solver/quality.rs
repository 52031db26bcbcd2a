//! Quality models ranking candidate transformations
//!
//! Per-attribute losses are precomputed once per hierarchy level, so
//! scoring a lattice node only combines numbers.

use crate::anonymization::config::{AggregateFunction, QualityMetric, QualityModel};
use crate::anonymization::hierarchy::Hierarchy;
use crate::domain::SUPPRESSED_VALUE;
use std::collections::{HashMap, HashSet};

/// Loss of one lattice attribute at each of its levels, each in `[0, 1]`
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeLoss {
    generalization: Vec<f64>,
    precision: Vec<f64>,
    entropy: Vec<f64>,
}

impl AttributeLoss {
    /// Measure the loss of `values` generalized along `hierarchy`
    pub fn compute(values: &[&str], hierarchy: &Hierarchy) -> Self {
        let depth = hierarchy.depth().max(1);
        let max_level = (depth - 1).max(1) as f64;
        let n = values.len();
        let domain = values.iter().collect::<HashSet<_>>().len();

        let mut original_freq: HashMap<&str, usize> = HashMap::new();
        for value in values {
            *original_freq.entry(*value).or_default() += 1;
        }

        let mut generalization = Vec::with_capacity(depth);
        let mut precision = Vec::with_capacity(depth);
        let mut entropy = Vec::with_capacity(depth);

        for level in 0..depth {
            let labels: Vec<&str> = values.iter().map(|v| hierarchy.generalize(v, level)).collect();

            let mut leaves: HashMap<&str, HashSet<&str>> = HashMap::new();
            let mut label_freq: HashMap<&str, usize> = HashMap::new();
            for (label, value) in labels.iter().zip(values) {
                leaves.entry(*label).or_default().insert(*value);
                *label_freq.entry(*label).or_default() += 1;
            }

            let total_loss: f64 = labels
                .iter()
                .map(|label| cell_loss(label, leaves[label].len(), domain))
                .sum();
            generalization.push(if n == 0 { 0.0 } else { total_loss / n as f64 });

            precision.push(level as f64 / max_level);

            let raw_entropy: f64 = labels
                .iter()
                .zip(values)
                .map(|(label, value)| {
                    let ratio = original_freq[value] as f64 / label_freq[label] as f64;
                    -ratio.log2()
                })
                .sum();
            entropy.push(normalize_entropy(raw_entropy, n));
        }

        Self {
            generalization,
            precision,
            entropy,
        }
    }

    /// Loss at `level` under the given metric
    pub fn at(&self, metric: QualityMetric, level: usize) -> f64 {
        let table = match metric {
            QualityMetric::Precision => &self.precision,
            QualityMetric::NonUniformEntropy => &self.entropy,
            _ => &self.generalization,
        };
        table.get(level).or(table.last()).copied().unwrap_or(0.0)
    }
}

/// Loss of a single generalized cell
///
/// `(leaves - 1) / (domain - 1)`, where leaves counts the distinct original
/// values under the label. Suppressed cells lose 1.
pub fn cell_loss(label: &str, leaves: usize, domain: usize) -> f64 {
    if label == SUPPRESSED_VALUE {
        1.0
    } else if domain <= 1 {
        0.0
    } else {
        (leaves.saturating_sub(1)) as f64 / (domain - 1) as f64
    }
}

fn normalize_entropy(raw: f64, n: usize) -> f64 {
    if n < 2 {
        0.0
    } else {
        (raw / (n as f64 * (n as f64).log2())).clamp(0.0, 1.0)
    }
}

/// Scores lattice nodes; lower is better
#[derive(Debug, Clone)]
pub struct QualityScorer {
    model: QualityModel,
    losses: Vec<AttributeLoss>,
}

impl QualityScorer {
    /// One loss table per lattice attribute, in lattice order
    pub fn new(model: QualityModel, losses: Vec<AttributeLoss>) -> Self {
        Self { model, losses }
    }

    pub fn model(&self) -> &QualityModel {
        &self.model
    }

    /// Score of a node given its released classes and suppressed count
    pub fn score(
        &self,
        levels: &[usize],
        class_sizes: &[usize],
        suppressed: usize,
        total: usize,
    ) -> f64 {
        if total == 0 {
            return 0.0;
        }
        let n = total as f64;
        let suppression = suppressed as f64 / n;
        let gs = self.model.gs_factor;

        match self.model.metric {
            QualityMetric::Discernibility => {
                let released: f64 = class_sizes.iter().map(|&s| (s * s) as f64).sum();
                (released + suppressed as f64 * n) / (n * n)
            }
            QualityMetric::Aecs => {
                let classes = class_sizes.len() + usize::from(suppressed > 0);
                (n / classes.max(1) as f64) / n
            }
            metric => {
                let values: Vec<f64> = self
                    .losses
                    .iter()
                    .zip(levels)
                    .map(|(loss, &level)| gs * loss.at(metric, level) + (1.0 - gs) * suppression)
                    .collect();
                if values.is_empty() {
                    (1.0 - gs) * suppression
                } else {
                    aggregate(self.model.aggregate_function, &values)
                }
            }
        }
    }
}

fn aggregate(function: AggregateFunction, values: &[f64]) -> f64 {
    let len = values.len() as f64;
    match function {
        AggregateFunction::ArithmeticMean => values.iter().sum::<f64>() / len,
        AggregateFunction::GeometricMean => {
            // shifted by one so a zero loss doesn't zero the product
            (values.iter().map(|v| (1.0 + v).ln()).sum::<f64>() / len).exp() - 1.0
        }
        AggregateFunction::Sum => values.iter().sum(),
        AggregateFunction::Maximum => values.iter().copied().fold(0.0, f64::max),
    }
}
