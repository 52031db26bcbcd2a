//! Anonymization job configuration
//!
//! Plain data describing how each column of a dataset is protected and which
//! privacy guarantees the whole release must satisfy. The only behavior is
//! validation, which runs before a job is accepted.

use crate::anonymization::granularity::Granularity;
use crate::domain::{AnonymizationError, DataType, Dataset};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// How a single attribute is protected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtectionStrategy {
    /// Insensitive attribute, copied through
    NoProtection,
    /// Identifying attribute, every cell replaced by `*`
    Removal,
    /// Quasi-identifier generalized along its hierarchy
    Generalization,
    /// Quasi-identifier replaced by an aggregate of its equivalence class
    Microaggregation,
}

impl ProtectionStrategy {
    /// Whether the attribute takes part in the privacy criteria
    pub fn is_protected(&self) -> bool {
        matches!(self, Self::Generalization | Self::Microaggregation)
    }
}

/// Aggregate used by microaggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MicroAggregationFunction {
    GeometricMean,
    ArithmeticMean,
    Median,
    Interval,
    Set,
    Mode,
}

impl MicroAggregationFunction {
    /// Whether the function only makes sense for numbers
    pub fn requires_numeric(&self) -> bool {
        matches!(self, Self::GeometricMean | Self::ArithmeticMean)
    }

    /// Whether the aggregate is a value of the attribute's own type
    pub fn keeps_data_type(&self) -> bool {
        !matches!(self, Self::Interval | Self::Set)
    }
}

/// Width of an interval bucket as given by the client
///
/// Clients send either a JSON number or a string; the hierarchy builder
/// parses it against the attribute's numeric type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntervalSize {
    Integer(i64),
    Decimal(f64),
    Text(String),
}

impl IntervalSize {
    /// Textual form, as configured
    pub fn raw(&self) -> String {
        match self {
            Self::Integer(v) => v.to_string(),
            Self::Decimal(v) => v.to_string(),
            Self::Text(v) => v.trim().to_string(),
        }
    }
}

fn default_mask_char() -> char {
    '*'
}

/// Hierarchy construction settings, keyed by `hierarchyType`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "hierarchyType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HierarchyKind {
    /// Fixed-width numeric buckets
    #[serde(rename_all = "camelCase")]
    Intervals { interval_size: IntervalSize },

    /// Every value maps straight to `*`
    Suppression,

    /// Right-to-left character redaction
    #[serde(rename_all = "camelCase")]
    Masking {
        #[serde(default = "default_mask_char")]
        mask_char: char,
    },

    /// Right-to-left redaction over values in sort order
    #[serde(rename_all = "camelCase")]
    Ordering {
        #[serde(default = "default_mask_char")]
        mask_char: char,
    },

    /// Calendar buckets
    #[serde(rename_all = "camelCase")]
    Dates {
        date_format: String,
        granularity: Granularity,
    },
}

impl HierarchyKind {
    /// Wire name of the hierarchy type
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Intervals { .. } => "INTERVALS",
            Self::Suppression => "SUPPRESSION",
            Self::Masking { .. } => "MASKING",
            Self::Ordering { .. } => "ORDERING",
            Self::Dates { .. } => "DATES",
        }
    }
}

/// Hierarchy settings of one attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyConfig {
    /// Attribute the hierarchy belongs to
    pub attribute_name: String,

    /// Hierarchy type and its parameters
    #[serde(flatten)]
    pub kind: HierarchyKind,
}

impl HierarchyConfig {
    /// Create a hierarchy config for an attribute
    pub fn new(attribute_name: impl Into<String>, kind: HierarchyKind) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            kind,
        }
    }
}

/// Per-column protection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeConfig {
    /// Column position in the dataset
    pub index: usize,

    /// Column name
    pub name: String,

    /// Declared data type
    pub data_type: DataType,

    /// Protection applied to the column
    pub protection_strategy: ProtectionStrategy,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hierarchy_config: Option<HierarchyConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub micro_aggregation_function: Option<MicroAggregationFunction>,

    /// Microaggregation skips missing cells instead of yielding `NULL`
    #[serde(default)]
    pub ignore_missing_data: bool,

    /// Microaggregation also generalizes the attribute to form classes
    #[serde(default)]
    pub perform_clustering: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_generalization_level: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_generalization_level: Option<usize>,
}

impl AttributeConfig {
    /// Create an unprotected attribute
    pub fn new(index: usize, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            index,
            name: name.into(),
            data_type,
            protection_strategy: ProtectionStrategy::NoProtection,
            hierarchy_config: None,
            micro_aggregation_function: None,
            ignore_missing_data: false,
            perform_clustering: false,
            min_generalization_level: None,
            max_generalization_level: None,
        }
    }

    /// Generalize along the given hierarchy
    pub fn generalized(mut self, kind: HierarchyKind) -> Self {
        self.protection_strategy = ProtectionStrategy::Generalization;
        self.hierarchy_config = Some(HierarchyConfig::new(self.name.clone(), kind));
        self
    }

    /// Microaggregate with the given function
    pub fn microaggregated(mut self, function: MicroAggregationFunction) -> Self {
        self.protection_strategy = ProtectionStrategy::Microaggregation;
        self.micro_aggregation_function = Some(function);
        self
    }

    /// Remove the attribute entirely
    pub fn removed(mut self) -> Self {
        self.protection_strategy = ProtectionStrategy::Removal;
        self
    }

    /// Whether the attribute is generalized in the search lattice
    pub fn is_lattice_attribute(&self) -> bool {
        match self.protection_strategy {
            ProtectionStrategy::Generalization => true,
            ProtectionStrategy::Microaggregation => self.perform_clustering,
            _ => false,
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> AnonymizationError {
        AnonymizationError::InvalidAttributeConfig {
            attribute: self.name.clone(),
            reason: reason.into(),
        }
    }

    /// Check the attribute's settings against its own strategy
    pub fn validate(&self) -> Result<(), AnonymizationError> {
        if self.name.trim().is_empty() {
            return Err(self.invalid(format!("attribute at index {} has no name", self.index)));
        }

        if let Some(hierarchy) = &self.hierarchy_config {
            if hierarchy.attribute_name != self.name {
                return Err(self.invalid(format!(
                    "hierarchy belongs to attribute '{}'",
                    hierarchy.attribute_name
                )));
            }
        }

        match self.protection_strategy {
            ProtectionStrategy::Generalization if self.hierarchy_config.is_none() => {
                return Err(self.invalid("GENERALIZATION requires a hierarchyConfig"));
            }
            ProtectionStrategy::Microaggregation => {
                let function = self.micro_aggregation_function.ok_or_else(|| {
                    self.invalid("MICROAGGREGATION requires a microAggregationFunction")
                })?;
                if function.requires_numeric() && !self.data_type.is_numeric() {
                    return Err(self.invalid(format!(
                        "{function:?} requires a numeric data type, found {}",
                        self.data_type
                    )));
                }
                if self.perform_clustering && self.hierarchy_config.is_none() {
                    return Err(self.invalid("performClustering requires a hierarchyConfig"));
                }
            }
            _ => {}
        }

        if let (Some(min), Some(max)) = (self.min_generalization_level, self.max_generalization_level)
        {
            if min > max {
                return Err(AnonymizationError::InvalidGeneralizationSetting {
                    attribute: self.name.clone(),
                    reason: format!(
                        "minGeneralizationLevel {min} is greater than maxGeneralizationLevel {max}"
                    ),
                });
            }
        }

        Ok(())
    }
}

/// Dataset-wide privacy guarantee
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrivacyModel {
    /// Every released record shares its quasi-identifiers with at least k-1 others
    KAnonymity { k: usize },
    /// Mean re-identification risk over released records stays below the threshold
    AverageReidentificationRisk { threshold: f64 },
    /// Share of unique records stays below the threshold
    PopulationUniqueness { threshold: f64 },
}

impl PrivacyModel {
    /// Wire name of the model
    pub fn name(&self) -> &'static str {
        match self {
            Self::KAnonymity { .. } => "K_ANONYMITY",
            Self::AverageReidentificationRisk { .. } => "AVERAGE_REIDENTIFICATION_RISK",
            Self::PopulationUniqueness { .. } => "POPULATION_UNIQUENESS",
        }
    }

    /// Check the model's parameters
    pub fn validate(&self) -> Result<(), AnonymizationError> {
        match self {
            Self::KAnonymity { k } if *k == 0 => Err(AnonymizationError::InvalidPrivacyModel {
                model: self.name().to_string(),
                reason: "k must be at least 1".to_string(),
            }),
            Self::AverageReidentificationRisk { threshold }
            | Self::PopulationUniqueness { threshold }
                if !(threshold.is_finite() && *threshold > 0.0 && *threshold <= 1.0) =>
            {
                Err(AnonymizationError::InvalidRiskThreshold {
                    model: self.name().to_string(),
                    value: *threshold,
                })
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for PrivacyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KAnonymity { k } => write!(f, "{}(k={k})", self.name()),
            Self::AverageReidentificationRisk { threshold }
            | Self::PopulationUniqueness { threshold } => {
                write!(f, "{}(threshold={threshold})", self.name())
            }
        }
    }
}

/// Share of records that may be suppressed
///
/// Either a fraction in `[0, 1]` or a percentage string such as `"10"` or
/// `"10%"` in `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SuppressionLimit {
    Fraction(f64),
    Percentage(String),
}

impl Default for SuppressionLimit {
    fn default() -> Self {
        Self::Fraction(0.0)
    }
}

impl SuppressionLimit {
    /// Limit as a fraction in `[0, 1]`
    pub fn fraction(&self) -> Result<f64, AnonymizationError> {
        match self {
            Self::Fraction(value) => {
                if value.is_finite() && (0.0..=1.0).contains(value) {
                    Ok(*value)
                } else {
                    Err(AnonymizationError::InvalidSuppressionLimit {
                        value: value.to_string(),
                        reason: "expected a fraction in [0, 1]".to_string(),
                    })
                }
            }
            Self::Percentage(text) => {
                let trimmed = text.trim();
                let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
                let percentage: f64 =
                    number
                        .parse()
                        .map_err(|_| AnonymizationError::InvalidSuppressionLimit {
                            value: text.clone(),
                            reason: "not a number".to_string(),
                        })?;
                if percentage.is_finite() && (0.0..=100.0).contains(&percentage) {
                    Ok(percentage / 100.0)
                } else {
                    Err(AnonymizationError::InvalidSuppressionLimit {
                        value: text.clone(),
                        reason: "expected a percentage in [0, 100]".to_string(),
                    })
                }
            }
        }
    }
}

/// Search strategy over the generalization lattice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchAlgorithm {
    /// Evaluate every node
    #[default]
    Optimal,
    /// Climb greedily from the bottom node
    BestEffortBottomUp,
    /// Descend greedily from the top node
    BestEffortTopDown,
}

impl SearchAlgorithm {
    pub fn is_heuristic(&self) -> bool {
        !matches!(self, Self::Optimal)
    }
}

/// Utility measure minimized by the search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityMetric {
    #[default]
    Loss,
    Precision,
    Discernibility,
    NonUniformEntropy,
    Aecs,
}

/// How per-attribute losses are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregateFunction {
    ArithmeticMean,
    #[default]
    GeometricMean,
    Sum,
    Maximum,
}

fn default_gs_factor() -> f64 {
    0.5
}

/// Quality model used to rank candidate transformations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityModel {
    #[serde(default)]
    pub metric: QualityMetric,

    #[serde(default)]
    pub aggregate_function: AggregateFunction,

    /// Balance between generalization (1.0) and suppression (0.0)
    #[serde(default = "default_gs_factor")]
    pub gs_factor: f64,
}

impl Default for QualityModel {
    fn default() -> Self {
        Self {
            metric: QualityMetric::default(),
            aggregate_function: AggregateFunction::default(),
            gs_factor: default_gs_factor(),
        }
    }
}

fn default_job_name() -> String {
    "anonymization".to_string()
}

fn default_local_generalization_iterations() -> u32 {
    100
}

/// Complete anonymization job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfig {
    #[serde(default = "default_job_name")]
    pub name: String,

    /// Privacy guarantees, all of which must hold
    #[serde(default)]
    pub privacy_models: Vec<PrivacyModel>,

    #[serde(default)]
    pub suppression_limit: SuppressionLimit,

    #[serde(default)]
    pub algorithm: SearchAlgorithm,

    /// Time limit of heuristic searches in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heuristic_search_time_limit: Option<u64>,

    /// Maximum number of nodes a heuristic search evaluates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heuristic_search_step_limit: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub differential_privacy_search_budget: Option<f64>,

    /// Falls back to [`QualityModel::default`] when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_model: Option<QualityModel>,

    #[serde(default)]
    pub local_generalization: bool,

    #[serde(default = "default_local_generalization_iterations")]
    pub local_generalization_iterations: u32,

    /// Label generalized cells with values of the column's own type
    #[serde(default)]
    pub retain_data_type: bool,

    #[serde(default)]
    pub attribute_configs: Vec<AttributeConfig>,
}

impl JobConfig {
    /// Create an empty job with default search settings
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            privacy_models: Vec::new(),
            suppression_limit: SuppressionLimit::default(),
            algorithm: SearchAlgorithm::default(),
            heuristic_search_time_limit: None,
            heuristic_search_step_limit: None,
            differential_privacy_search_budget: None,
            quality_model: None,
            local_generalization: false,
            local_generalization_iterations: default_local_generalization_iterations(),
            retain_data_type: false,
            attribute_configs: Vec::new(),
        }
    }

    /// Quality model in effect
    pub fn effective_quality_model(&self) -> QualityModel {
        self.quality_model.clone().unwrap_or_default()
    }

    /// Attribute configurations sorted by column index
    pub fn attributes_in_order(&self) -> Vec<&AttributeConfig> {
        let mut attributes: Vec<&AttributeConfig> = self.attribute_configs.iter().collect();
        attributes.sort_by_key(|a| a.index);
        attributes
    }

    /// Validate the job on its own
    pub fn validate(&self) -> Result<(), AnonymizationError> {
        if self.attribute_configs.is_empty() {
            return Err(AnonymizationError::NoAttributeConfigured(format!(
                "job '{}' has no attribute configuration",
                self.name
            )));
        }

        if self.privacy_models.is_empty() {
            return Err(AnonymizationError::InvalidPrivacyModel {
                model: "none".to_string(),
                reason: "at least one privacy model is required".to_string(),
            });
        }
        for model in &self.privacy_models {
            model.validate()?;
        }

        self.suppression_limit.fraction()?;
        self.validate_indices()?;

        for attribute in &self.attribute_configs {
            attribute.validate()?;
        }

        if !self
            .attribute_configs
            .iter()
            .any(|a| a.protection_strategy.is_protected())
        {
            return Err(AnonymizationError::NoAttributeConfigured(format!(
                "none of the {} attributes of job '{}' is protected by GENERALIZATION or MICROAGGREGATION",
                self.attribute_configs.len(),
                self.name
            )));
        }

        self.validate_search_settings()
    }

    /// Validate the job against the dataset it will run on
    pub fn validate_against(&self, dataset: &Dataset) -> Result<(), AnonymizationError> {
        self.validate()?;
        dataset.validate_shape()?;

        if dataset.column_count() != self.attribute_configs.len() {
            return Err(AnonymizationError::DatasetConfigMismatch(format!(
                "dataset has {} columns but {} attributes are configured",
                dataset.column_count(),
                self.attribute_configs.len()
            )));
        }

        for attribute in &self.attribute_configs {
            let column = &dataset.columns[attribute.index];
            if column.name != attribute.name {
                return Err(AnonymizationError::DatasetConfigMismatch(format!(
                    "column {} is named '{}' but attribute '{}' is configured at that index",
                    attribute.index, column.name, attribute.name
                )));
            }
            if column.data_type != attribute.data_type {
                return Err(AnonymizationError::DatasetConfigMismatch(format!(
                    "column '{}' has type {} but is configured as {}",
                    column.name, column.data_type, attribute.data_type
                )));
            }
        }

        Ok(())
    }

    fn validate_indices(&self) -> Result<(), AnonymizationError> {
        let count = self.attribute_configs.len();
        let mut seen = vec![false; count];
        for attribute in &self.attribute_configs {
            if attribute.index >= count {
                return Err(AnonymizationError::InvalidAttributeConfig {
                    attribute: attribute.name.clone(),
                    reason: format!(
                        "index {} is out of range for {count} attributes",
                        attribute.index
                    ),
                });
            }
            if std::mem::replace(&mut seen[attribute.index], true) {
                return Err(AnonymizationError::InvalidAttributeConfig {
                    attribute: attribute.name.clone(),
                    reason: format!("index {} is used by more than one attribute", attribute.index),
                });
            }
        }
        Ok(())
    }

    fn validate_search_settings(&self) -> Result<(), AnonymizationError> {
        let positive = |setting: &str, value: Option<u64>| match value {
            Some(0) => Err(AnonymizationError::InvalidSearchSetting {
                setting: setting.to_string(),
                reason: "must be greater than 0".to_string(),
            }),
            _ => Ok(()),
        };
        positive("heuristicSearchTimeLimit", self.heuristic_search_time_limit)?;
        positive("heuristicSearchStepLimit", self.heuristic_search_step_limit)?;

        if let Some(budget) = self.differential_privacy_search_budget {
            if !(budget.is_finite() && budget > 0.0) {
                return Err(AnonymizationError::InvalidSearchSetting {
                    setting: "differentialPrivacySearchBudget".to_string(),
                    reason: format!("must be a positive number, got {budget}"),
                });
            }
        }

        if self.local_generalization && self.local_generalization_iterations == 0 {
            return Err(AnonymizationError::InvalidSearchSetting {
                setting: "localGeneralizationIterations".to_string(),
                reason: "must be at least 1 when localGeneralization is enabled".to_string(),
            });
        }

        if let Some(quality) = &self.quality_model {
            if !(0.0..=1.0).contains(&quality.gs_factor) {
                return Err(AnonymizationError::InvalidSearchSetting {
                    setting: "qualityModel.gsFactor".to_string(),
                    reason: format!("expected a value in [0, 1], got {}", quality.gs_factor),
                });
            }
        }

        Ok(())
    }
}

/// Audit logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Enable audit logging
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,

    /// Audit log file path
    #[serde(default = "default_audit_log_path")]
    pub log_path: PathBuf,

    /// Use JSON format for audit logs
    #[serde(default = "default_audit_json_format")]
    pub json_format: bool,
}

fn default_audit_enabled() -> bool {
    true
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("./audit/anonymization.log")
}

fn default_audit_json_format() -> bool {
    true
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            log_path: default_audit_log_path(),
            json_format: default_audit_json_format(),
        }
    }
}

impl AuditConfig {
    /// Validate audit configuration
    pub fn validate(&self) -> Result<()> {
        if self.enabled {
            if let Some(parent) = self.log_path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create audit log directory: {}", parent.display())
                    })?;
                }
            }
        }
        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("VEIL_AUDIT_ENABLED") {
            self.enabled = val.parse().context("Invalid VEIL_AUDIT_ENABLED value")?;
        }

        if let Ok(val) = std::env::var("VEIL_AUDIT_LOG_PATH") {
            self.log_path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("VEIL_AUDIT_JSON_FORMAT") {
            self.json_format = val
                .parse()
                .context("Invalid VEIL_AUDIT_JSON_FORMAT value")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ColumnSpec;

    fn age_job() -> JobConfig {
        let mut job = JobConfig::new("ages");
        job.privacy_models.push(PrivacyModel::KAnonymity { k: 2 });
        job.attribute_configs.push(
            AttributeConfig::new(0, "age", DataType::Integer).generalized(HierarchyKind::Intervals {
                interval_size: IntervalSize::Integer(5),
            }),
        );
        job.attribute_configs
            .push(AttributeConfig::new(1, "name", DataType::String).removed());
        job
    }

    fn age_dataset() -> Dataset {
        Dataset::new(
            vec![
                ColumnSpec::new("age", DataType::Integer),
                ColumnSpec::new("name", DataType::String),
            ],
            vec![vec!["30".to_string(), "Ada".to_string()]],
        )
        .unwrap()
    }

    #[test]
    fn test_valid_job() {
        let job = age_job();
        assert!(job.validate_against(&age_dataset()).is_ok());
    }

    #[test]
    fn test_empty_attributes_rejected() {
        let mut job = age_job();
        job.attribute_configs.clear();
        assert!(matches!(
            job.validate(),
            Err(AnonymizationError::NoAttributeConfigured(_))
        ));
    }

    #[test]
    fn test_no_protected_attribute_rejected() {
        let mut job = age_job();
        job.attribute_configs[0].protection_strategy = ProtectionStrategy::NoProtection;
        assert!(matches!(
            job.validate(),
            Err(AnonymizationError::NoAttributeConfigured(_))
        ));
    }

    #[test]
    fn test_duplicate_index_rejected() {
        let mut job = age_job();
        job.attribute_configs[1].index = 0;
        assert!(matches!(
            job.validate(),
            Err(AnonymizationError::InvalidAttributeConfig { .. })
        ));
    }

    #[test]
    fn test_generalization_without_hierarchy_rejected() {
        let mut job = age_job();
        job.attribute_configs[0].hierarchy_config = None;
        assert!(matches!(
            job.validate(),
            Err(AnonymizationError::InvalidAttributeConfig { .. })
        ));
    }

    #[test]
    fn test_mean_on_string_rejected() {
        let mut job = age_job();
        job.attribute_configs[1] = AttributeConfig::new(1, "name", DataType::String)
            .microaggregated(MicroAggregationFunction::ArithmeticMean);
        assert!(job.validate().is_err());
    }

    #[test]
    fn test_level_bounds_inverted() {
        let mut job = age_job();
        job.attribute_configs[0].min_generalization_level = Some(3);
        job.attribute_configs[0].max_generalization_level = Some(1);
        assert!(matches!(
            job.validate(),
            Err(AnonymizationError::InvalidGeneralizationSetting { .. })
        ));
    }

    #[test]
    fn test_risk_threshold_range() {
        let mut job = age_job();
        job.privacy_models = vec![PrivacyModel::AverageReidentificationRisk { threshold: 1.5 }];
        assert!(matches!(
            job.validate(),
            Err(AnonymizationError::InvalidRiskThreshold { .. })
        ));
    }

    #[test]
    fn test_suppression_limit_forms() {
        assert_eq!(SuppressionLimit::Fraction(0.1).fraction().unwrap(), 0.1);
        assert_eq!(
            SuppressionLimit::Percentage("10%".to_string()).fraction().unwrap(),
            0.1
        );
        assert_eq!(
            SuppressionLimit::Percentage("50".to_string()).fraction().unwrap(),
            0.5
        );
        assert!(SuppressionLimit::Fraction(1.2).fraction().is_err());
        assert!(SuppressionLimit::Percentage("120".to_string()).fraction().is_err());
        assert!(SuppressionLimit::Percentage("lots".to_string()).fraction().is_err());
    }

    #[test]
    fn test_column_name_mismatch() {
        let mut job = age_job();
        job.attribute_configs[1].name = "surname".to_string();
        assert!(matches!(
            job.validate_against(&age_dataset()),
            Err(AnonymizationError::DatasetConfigMismatch(_))
        ));
    }

    #[test]
    fn test_job_json_shape() {
        let json = r#"{
            "name": "zip",
            "privacyModels": [{"type": "K_ANONYMITY", "k": 5}],
            "suppressionLimit": "5%",
            "algorithm": "BEST_EFFORT_TOP_DOWN",
            "attributeConfigs": [{
                "index": 0,
                "name": "zip",
                "dataType": "STRING",
                "protectionStrategy": "GENERALIZATION",
                "hierarchyConfig": {"attributeName": "zip", "hierarchyType": "MASKING"}
            }, {
                "index": 1,
                "name": "birth",
                "dataType": "DATE",
                "protectionStrategy": "GENERALIZATION",
                "hierarchyConfig": {
                    "attributeName": "birth",
                    "hierarchyType": "DATES",
                    "dateFormat": "dd.MM.yyyy",
                    "granularity": "MONTH_YEAR"
                }
            }]
        }"#;
        let job: JobConfig = serde_json::from_str(json).unwrap();
        assert_eq!(job.algorithm, SearchAlgorithm::BestEffortTopDown);
        assert_eq!(job.suppression_limit.fraction().unwrap(), 0.05);
        assert_eq!(
            job.attribute_configs[0].hierarchy_config.as_ref().unwrap().kind,
            HierarchyKind::Masking { mask_char: '*' }
        );
        assert!(matches!(
            job.attribute_configs[1].hierarchy_config.as_ref().unwrap().kind,
            HierarchyKind::Dates {
                granularity: Granularity::MonthYear,
                ..
            }
        ));
        assert_eq!(job.effective_quality_model(), QualityModel::default());
        assert!(job.validate().is_ok());
    }

    #[test]
    fn test_default_audit_config() {
        let config = AuditConfig::default();
        assert!(config.enabled);
        assert!(config.json_format);
    }
}
