//! Privacy and utility metrics of a data handle
//!
//! Risks follow the prosecutor model over released (non-suppressed)
//! records. Utility metrics compare a handle's cells with the dataset it was
//! derived from; a handle without a source is original data and has no loss.

use crate::anonymization::solver::quality::cell_loss;
use crate::domain::{is_missing, Dataset};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Dataset-level metric keys
pub const JOURNALIST_RISK: &str = "journalist_risk";
pub const MARKETER_RISK: &str = "marketer_risk";
pub const AVERAGE_RISK: &str = "average_risk";
pub const HIGHEST_RISK: &str = "highest_risk";
pub const LOWEST_RISK: &str = "lowest_risk";
pub const RECORDS_AFFECTED_BY_HIGHEST_RISK: &str = "records_affected_by_highest_risk";
pub const RECORDS_AFFECTED_BY_LOWEST_RISK: &str = "records_affected_by_lowest_risk";
pub const MAX_CLASS_SIZE: &str = "max_class_size";
pub const AVG_CLASS_SIZE: &str = "avg_class_size";
pub const MIN_CLASS_SIZE: &str = "min_class_size";
pub const SUPPRESSED_RECORDS: &str = "suppressed_records";
pub const GRANULARITY: &str = "granularity";
pub const DISCERNIBILITY: &str = "discernibility";
pub const NON_UNIFORM_ENTROPY: &str = "non_uniform_entropy";

/// Attribute-level metric keys
pub const MISSING_VALUES: &str = "missing_values";

/// A dataset plus what is needed to measure it
#[derive(Debug, Clone)]
pub struct DataHandle {
    pub data: Arc<Dataset>,
    /// Columns of the quasi-identifying attributes
    pub quasi_identifiers: Vec<usize>,
    /// Suppression flag per record
    pub suppressed: Vec<bool>,
    /// Dataset `data` was derived from, row for row
    pub source: Option<Arc<Dataset>>,
}

impl DataHandle {
    /// Handle over original data: nothing suppressed, nothing generalized
    pub fn original(data: Arc<Dataset>, quasi_identifiers: Vec<usize>) -> Self {
        let suppressed = vec![false; data.row_count()];
        Self {
            data,
            quasi_identifiers,
            suppressed,
            source: None,
        }
    }

    /// Handle over anonymized data derived from `source`
    pub fn anonymized(
        data: Arc<Dataset>,
        quasi_identifiers: Vec<usize>,
        suppressed: Vec<bool>,
        source: Arc<Dataset>,
    ) -> Self {
        Self {
            data,
            quasi_identifiers,
            suppressed,
            source: Some(source),
        }
    }
}

/// Extracted metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsReport {
    pub dataset_metrics: BTreeMap<String, f64>,
    pub attribute_metrics: BTreeMap<String, BTreeMap<String, f64>>,
}

impl MetricsReport {
    /// Dataset-level metric by key
    pub fn dataset(&self, key: &str) -> Option<f64> {
        self.dataset_metrics.get(key).copied()
    }

    /// Attribute-level metric by attribute and key
    pub fn attribute(&self, attribute: &str, key: &str) -> Option<f64> {
        self.attribute_metrics.get(attribute)?.get(key).copied()
    }

    fn with_suffix(self, suffix: &str) -> Self {
        let rename = |map: BTreeMap<String, f64>| {
            map.into_iter()
                .map(|(key, value)| (format!("{key}{suffix}"), value))
                .collect::<BTreeMap<_, _>>()
        };
        Self {
            dataset_metrics: rename(self.dataset_metrics),
            attribute_metrics: self
                .attribute_metrics
                .into_iter()
                .map(|(attribute, map)| (attribute, rename(map)))
                .collect(),
        }
    }

    fn merge(&mut self, other: MetricsReport) {
        self.dataset_metrics.extend(other.dataset_metrics);
        for (attribute, map) in other.attribute_metrics {
            self.attribute_metrics.entry(attribute).or_default().extend(map);
        }
    }
}

/// Metrics of a single handle, with unsuffixed keys
pub fn extract(handle: &DataHandle) -> MetricsReport {
    let data = handle.data.as_ref();
    let total = data.row_count();
    let released: Vec<usize> = (0..total)
        .filter(|&row| !handle.suppressed.get(row).copied().unwrap_or(false))
        .collect();
    let suppressed = total - released.len();

    let mut classes: HashMap<Vec<&str>, usize> = HashMap::new();
    for &row in &released {
        let key = handle
            .quasi_identifiers
            .iter()
            .map(|&column| data.cell(row, column))
            .collect();
        *classes.entry(key).or_default() += 1;
    }
    let sizes: Vec<usize> = classes.into_values().collect();

    let mut metrics = BTreeMap::new();
    let released_count = released.len() as f64;
    if sizes.is_empty() {
        for key in [
            JOURNALIST_RISK,
            MARKETER_RISK,
            AVERAGE_RISK,
            HIGHEST_RISK,
            LOWEST_RISK,
            RECORDS_AFFECTED_BY_HIGHEST_RISK,
            RECORDS_AFFECTED_BY_LOWEST_RISK,
            MAX_CLASS_SIZE,
            AVG_CLASS_SIZE,
            MIN_CLASS_SIZE,
        ] {
            metrics.insert(key.to_string(), 0.0);
        }
    } else {
        let min = sizes.iter().copied().min().unwrap_or(1);
        let max = sizes.iter().copied().max().unwrap_or(1);
        let average_risk = sizes.len() as f64 / released_count;
        let affected = |size: usize| {
            sizes.iter().filter(|&&s| s == size).map(|&s| s as f64).sum::<f64>() / released_count
        };

        metrics.insert(HIGHEST_RISK.to_string(), 1.0 / min as f64);
        metrics.insert(LOWEST_RISK.to_string(), 1.0 / max as f64);
        metrics.insert(JOURNALIST_RISK.to_string(), 1.0 / min as f64);
        metrics.insert(MARKETER_RISK.to_string(), average_risk);
        metrics.insert(AVERAGE_RISK.to_string(), average_risk);
        metrics.insert(RECORDS_AFFECTED_BY_HIGHEST_RISK.to_string(), affected(min));
        metrics.insert(RECORDS_AFFECTED_BY_LOWEST_RISK.to_string(), affected(max));
        metrics.insert(MAX_CLASS_SIZE.to_string(), max as f64);
        metrics.insert(MIN_CLASS_SIZE.to_string(), min as f64);
        metrics.insert(
            AVG_CLASS_SIZE.to_string(),
            released_count / sizes.len() as f64,
        );
    }
    metrics.insert(SUPPRESSED_RECORDS.to_string(), suppressed as f64);
    metrics.insert(
        DISCERNIBILITY.to_string(),
        sizes.iter().map(|&s| (s * s) as f64).sum::<f64>() + (suppressed * total) as f64,
    );

    let mut attribute_metrics = BTreeMap::new();
    let mut total_loss = 0.0;
    let mut total_entropy = 0.0;
    for &column in &handle.quasi_identifiers {
        let utility = handle
            .source
            .as_deref()
            .map(|source| column_utility(source, data, column))
            .unwrap_or_default();
        total_loss += utility.loss;
        total_entropy += utility.entropy;

        let missing = data.column_values(column).filter(|v| is_missing(v)).count();
        let mut attribute = BTreeMap::new();
        attribute.insert(MISSING_VALUES.to_string(), missing as f64);
        attribute.insert(GRANULARITY.to_string(), granularity(utility.loss, total));
        attribute.insert(NON_UNIFORM_ENTROPY.to_string(), utility.entropy);
        attribute_metrics.insert(data.columns[column].name.clone(), attribute);
    }

    let cells = total * handle.quasi_identifiers.len();
    metrics.insert(GRANULARITY.to_string(), granularity(total_loss, cells));
    metrics.insert(NON_UNIFORM_ENTROPY.to_string(), total_entropy);

    MetricsReport {
        dataset_metrics: metrics,
        attribute_metrics,
    }
}

/// Metrics of an original/anonymized pair, keys suffixed `_original` and
/// `_anonymized` and merged per attribute
pub fn extract_pair(original: &DataHandle, anonymized: &DataHandle) -> MetricsReport {
    let mut report = extract(original).with_suffix("_original");
    report.merge(extract(anonymized).with_suffix("_anonymized"));
    report
}

#[derive(Debug, Default)]
struct ColumnUtility {
    /// Sum of cell losses
    loss: f64,
    /// Non-uniform entropy in bits
    entropy: f64,
}

fn column_utility(source: &Dataset, data: &Dataset, column: usize) -> ColumnUtility {
    let pairs: Vec<(&str, &str)> = source
        .column_values(column)
        .zip(data.column_values(column))
        .collect();
    let domain = pairs.iter().map(|(o, _)| *o).collect::<HashSet<_>>().len();

    let mut leaves: HashMap<&str, HashSet<&str>> = HashMap::new();
    let mut original_freq: HashMap<&str, usize> = HashMap::new();
    let mut label_freq: HashMap<&str, usize> = HashMap::new();
    for (original, label) in &pairs {
        leaves.entry(*label).or_default().insert(*original);
        *original_freq.entry(*original).or_default() += 1;
        *label_freq.entry(*label).or_default() += 1;
    }

    pairs
        .iter()
        .fold(ColumnUtility::default(), |mut acc, (original, label)| {
            acc.loss += cell_loss(label, leaves[label].len(), domain);
            let ratio = original_freq[original] as f64 / label_freq[label] as f64;
            acc.entropy += -ratio.log2();
            acc
        })
}

fn granularity(total_loss: f64, cells: usize) -> f64 {
    if cells == 0 {
        1.0
    } else {
        1.0 - total_loss / cells as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ColumnSpec, DataType};

    fn dataset(values: &[&str]) -> Arc<Dataset> {
        Arc::new(
            Dataset::new(
                vec![ColumnSpec::new("zip", DataType::String)],
                values.iter().map(|v| vec![v.to_string()]).collect(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_original_metrics() {
        let handle = DataHandle::original(dataset(&["101", "101", "102", "NULL"]), vec![0]);
        let report = extract(&handle);
        assert_eq!(report.dataset(MIN_CLASS_SIZE), Some(1.0));
        assert_eq!(report.dataset(MAX_CLASS_SIZE), Some(2.0));
        assert_eq!(report.dataset(HIGHEST_RISK), Some(1.0));
        assert_eq!(report.dataset(LOWEST_RISK), Some(0.5));
        assert_eq!(report.dataset(AVERAGE_RISK), Some(0.75));
        assert_eq!(report.dataset(RECORDS_AFFECTED_BY_HIGHEST_RISK), Some(0.5));
        assert_eq!(report.dataset(GRANULARITY), Some(1.0));
        assert_eq!(report.dataset(NON_UNIFORM_ENTROPY), Some(0.0));
        assert_eq!(report.dataset(DISCERNIBILITY), Some(6.0));
        assert_eq!(report.attribute("zip", MISSING_VALUES), Some(1.0));
    }

    #[test]
    fn test_anonymized_metrics() {
        let source = dataset(&["101", "102", "103", "201"]);
        let data = dataset(&["10*", "10*", "10*", "*"]);
        let handle =
            DataHandle::anonymized(data, vec![0], vec![false, false, false, true], source);
        let report = extract(&handle);
        assert_eq!(report.dataset(SUPPRESSED_RECORDS), Some(1.0));
        assert_eq!(report.dataset(MIN_CLASS_SIZE), Some(3.0));
        assert_eq!(report.dataset(DISCERNIBILITY), Some(9.0 + 4.0));
        // three cells lose 2/3, the suppressed one loses 1
        let granularity = report.dataset(GRANULARITY).unwrap();
        assert!((granularity - (1.0 - 3.0 / 4.0)).abs() < 1e-9);
        assert!(report.dataset(NON_UNIFORM_ENTROPY).unwrap() > 0.0);
    }

    #[test]
    fn test_pair_suffixes_and_merges() {
        let source = dataset(&["101", "102"]);
        let original = DataHandle::original(source.clone(), vec![0]);
        let anonymized = DataHandle::anonymized(
            dataset(&["10*", "10*"]),
            vec![0],
            vec![false, false],
            source,
        );
        let report = extract_pair(&original, &anonymized);
        assert_eq!(report.dataset("min_class_size_original"), Some(1.0));
        assert_eq!(report.dataset("min_class_size_anonymized"), Some(2.0));
        assert_eq!(report.attribute("zip", "missing_values_original"), Some(0.0));
        assert_eq!(report.attribute("zip", "granularity_anonymized"), Some(0.0));
        assert!(report.dataset("min_class_size").is_none());
    }

    #[test]
    fn test_report_json_shape() {
        let report = extract(&DataHandle::original(dataset(&["a"]), vec![0]));
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["datasetMetrics"]["average_risk"].is_number());
        assert!(json["attributeMetrics"]["zip"]["granularity"].is_number());
    }
}
