//! Generalization hierarchies
//!
//! A hierarchy maps every distinct value of an attribute to increasingly
//! general labels. Level 0 holds the original value and the last level is
//! always `*`. Each level is a function of the level below it, so moving up
//! a level can only merge groups of values, never split them.
//!
//! Missing cells (see [`is_missing`]) map to `NULL` on every intermediate
//! level and to `*` on the top level, whatever the hierarchy type.

mod dates;
mod intervals;
mod masking;

pub use dates::translate_date_format;

use crate::anonymization::config::{HierarchyConfig, HierarchyKind};
use crate::domain::{is_missing, AnonymizationError, DataType, MISSING_VALUE, SUPPRESSED_VALUE};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Generalization hierarchy of one attribute
#[derive(Debug, Clone, PartialEq)]
pub struct Hierarchy {
    attribute: String,
    rows: Vec<Vec<String>>,
    index: HashMap<String, usize>,
    typed_labels: bool,
}

impl Hierarchy {
    /// Build a hierarchy from explicit rows
    ///
    /// Every row starts with the original value and has the same length.
    pub fn from_rows(attribute: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        let index = rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| row.first().map(|value| (value.clone(), i)))
            .collect();
        Self {
            attribute: attribute.into(),
            rows,
            index,
            typed_labels: false,
        }
    }

    /// Mark the generalized labels as values of the attribute's data type
    pub fn with_typed_labels(mut self) -> Self {
        self.typed_labels = true;
        self
    }

    /// Whether generalized labels keep the attribute's data type
    ///
    /// True for interval and date hierarchies built with
    /// `retain_data_type`, whose labels are bucket means and dates.
    pub fn has_typed_labels(&self) -> bool {
        self.typed_labels
    }

    /// Attribute the hierarchy belongs to
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Number of levels, original values included
    pub fn depth(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// Highest level, the fully suppressed one
    pub fn max_level(&self) -> usize {
        self.depth().saturating_sub(1)
    }

    /// Label of `value` at `level`
    ///
    /// Values the hierarchy has never seen are suppressed.
    pub fn generalize(&self, value: &str, level: usize) -> &str {
        self.index
            .get(value)
            .and_then(|&row| self.rows[row].get(level))
            .map_or(SUPPRESSED_VALUE, String::as_str)
    }

    /// Whether the hierarchy knows the value
    pub fn contains(&self, value: &str) -> bool {
        self.index.contains_key(value)
    }

    /// All rows, one per distinct value
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }
}

/// Build the hierarchy of an attribute from its column values
///
/// # Errors
///
/// Fails with `UnsupportedHierarchyType` when the hierarchy type doesn't fit
/// the data type, and with `MalformedIntervalSize`, `NonNumericValue` or
/// `MalformedDateValue` when the configuration or a cell can't be read.
pub fn build_hierarchy<S: AsRef<str>>(
    values: &[S],
    data_type: DataType,
    config: &HierarchyConfig,
    retain_data_type: bool,
) -> Result<Hierarchy, AnonymizationError> {
    let attribute = config.attribute_name.as_str();
    let distinct: BTreeSet<&str> = values.iter().map(|v| v.as_ref()).collect();
    let (missing, present): (Vec<&str>, Vec<&str>) =
        distinct.into_iter().partition(|v| is_missing(v));

    let unsupported = || AnonymizationError::UnsupportedHierarchyType {
        attribute: attribute.to_string(),
        hierarchy_type: config.kind.type_name().to_string(),
        data_type: data_type.to_string(),
    };

    let mut rows = match &config.kind {
        HierarchyKind::Suppression => present
            .iter()
            .map(|v| vec![v.to_string(), SUPPRESSED_VALUE.to_string()])
            .collect(),
        HierarchyKind::Intervals { interval_size } => match data_type {
            DataType::Integer => intervals::build::<i64>(
                attribute,
                &present,
                &interval_size.raw(),
                data_type,
                retain_data_type,
            )?,
            DataType::Decimal => intervals::build::<f64>(
                attribute,
                &present,
                &interval_size.raw(),
                data_type,
                retain_data_type,
            )?,
            DataType::String | DataType::Date => return Err(unsupported()),
        },
        HierarchyKind::Masking { mask_char } => match data_type {
            DataType::String | DataType::Integer => masking::build(&present, *mask_char),
            DataType::Decimal | DataType::Date => return Err(unsupported()),
        },
        HierarchyKind::Ordering { mask_char } => match data_type {
            DataType::String | DataType::Integer => {
                let ordered = masking::natural_order(&present, data_type);
                masking::build(&ordered, *mask_char)
            }
            DataType::Decimal | DataType::Date => return Err(unsupported()),
        },
        HierarchyKind::Dates {
            date_format,
            granularity,
        } => match data_type {
            DataType::Date => {
                dates::build(attribute, &present, date_format, *granularity, retain_data_type)?
            }
            _ => return Err(unsupported()),
        },
    };

    let depth = rows.first().map_or(2, Vec::len).max(2);
    rows.extend(missing.iter().map(|v| missing_row(v, depth)));

    debug!(
        attribute = %attribute,
        hierarchy_type = config.kind.type_name(),
        values = rows.len(),
        depth,
        "Built generalization hierarchy"
    );

    let hierarchy = Hierarchy::from_rows(attribute, rows);
    let typed = retain_data_type
        && matches!(
            config.kind,
            HierarchyKind::Intervals { .. } | HierarchyKind::Dates { .. }
        );
    Ok(if typed {
        hierarchy.with_typed_labels()
    } else {
        hierarchy
    })
}

fn missing_row(value: &str, depth: usize) -> Vec<String> {
    let mut row = Vec::with_capacity(depth);
    row.push(value.to_string());
    row.extend((1..depth - 1).map(|_| MISSING_VALUE.to_string()));
    row.push(SUPPRESSED_VALUE.to_string());
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymization::config::IntervalSize;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_suppression_hierarchy() {
        let config = HierarchyConfig::new("city", HierarchyKind::Suppression);
        let hierarchy =
            build_hierarchy(&strings(&["Oslo", "Rome", "Oslo"]), DataType::String, &config, false)
                .unwrap();
        assert_eq!(hierarchy.depth(), 2);
        assert_eq!(hierarchy.rows().len(), 2);
        assert_eq!(hierarchy.generalize("Oslo", 0), "Oslo");
        assert_eq!(hierarchy.generalize("Rome", 1), "*");
    }

    #[test]
    fn test_missing_values_map_to_null() {
        let config = HierarchyConfig::new(
            "age",
            HierarchyKind::Intervals {
                interval_size: IntervalSize::Integer(10),
            },
        );
        let hierarchy =
            build_hierarchy(&strings(&["12", "", "NULL", "47"]), DataType::Integer, &config, false)
                .unwrap();
        let top = hierarchy.max_level();
        assert_eq!(hierarchy.generalize("NULL", 1), "NULL");
        assert_eq!(hierarchy.generalize("", 1), "NULL");
        assert_eq!(hierarchy.generalize("NULL", top), "*");
    }

    #[test]
    fn test_unsupported_combinations() {
        let dates = HierarchyConfig::new(
            "age",
            HierarchyKind::Dates {
                date_format: "yyyy-MM-dd".to_string(),
                granularity: crate::anonymization::granularity::Granularity::Year,
            },
        );
        assert!(matches!(
            build_hierarchy(&strings(&["1"]), DataType::Integer, &dates, false),
            Err(AnonymizationError::UnsupportedHierarchyType { .. })
        ));

        let masking = HierarchyConfig::new("weight", HierarchyKind::Masking { mask_char: '*' });
        assert!(matches!(
            build_hierarchy(&strings(&["1.5"]), DataType::Decimal, &masking, false),
            Err(AnonymizationError::UnsupportedHierarchyType { .. })
        ));

        let intervals = HierarchyConfig::new(
            "name",
            HierarchyKind::Intervals {
                interval_size: IntervalSize::Integer(5),
            },
        );
        assert!(matches!(
            build_hierarchy(&strings(&["Ada"]), DataType::String, &intervals, false),
            Err(AnonymizationError::UnsupportedHierarchyType { .. })
        ));
    }

    #[test]
    fn test_only_intervals_and_dates_keep_types() {
        let intervals = HierarchyConfig::new(
            "age",
            HierarchyKind::Intervals {
                interval_size: IntervalSize::Integer(10),
            },
        );
        let masking = HierarchyConfig::new("zip", HierarchyKind::Masking { mask_char: '*' });
        let values = strings(&["12", "47"]);

        assert!(build_hierarchy(&values, DataType::Integer, &intervals, true)
            .unwrap()
            .has_typed_labels());
        assert!(!build_hierarchy(&values, DataType::Integer, &intervals, false)
            .unwrap()
            .has_typed_labels());
        assert!(!build_hierarchy(&values, DataType::Integer, &masking, true)
            .unwrap()
            .has_typed_labels());
    }

    #[test]
    fn test_unknown_value_is_suppressed() {
        let hierarchy = Hierarchy::from_rows(
            "x",
            vec![strings(&["a", "*"])],
        );
        assert_eq!(hierarchy.generalize("b", 0), "*");
        assert!(hierarchy.contains("a"));
    }
}
