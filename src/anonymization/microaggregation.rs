//! Aggregates replacing the values of an equivalence class

use crate::anonymization::config::MicroAggregationFunction;
use crate::domain::{is_missing, AnonymizationError, DataType, MISSING_VALUE};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Aggregate the values of one equivalence class
///
/// Unless `ignore_missing_data` is set, a single missing value makes the
/// aggregate `NULL`. Means are rounded for integer attributes.
pub fn aggregate(
    attribute: &str,
    function: MicroAggregationFunction,
    data_type: DataType,
    values: &[&str],
    ignore_missing_data: bool,
) -> Result<String, AnonymizationError> {
    if !ignore_missing_data && values.iter().any(|v| is_missing(v)) {
        return Ok(MISSING_VALUE.to_string());
    }
    let present: Vec<&str> = values
        .iter()
        .copied()
        .filter(|v| !is_missing(v))
        .map(str::trim)
        .collect();
    if present.is_empty() {
        return Ok(MISSING_VALUE.to_string());
    }

    match function {
        MicroAggregationFunction::ArithmeticMean => {
            let numbers = parse_numbers(attribute, &present)?;
            let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
            Ok(format_number(mean, data_type))
        }
        MicroAggregationFunction::GeometricMean => {
            let numbers = parse_numbers(attribute, &present)?;
            if let Some(bad) = numbers.iter().find(|n| **n <= 0.0) {
                return Err(AnonymizationError::InvalidAttributeConfig {
                    attribute: attribute.to_string(),
                    reason: format!("geometric mean requires positive values, found {bad}"),
                });
            }
            let log_mean = numbers.iter().map(|n| n.ln()).sum::<f64>() / numbers.len() as f64;
            Ok(format_number(log_mean.exp(), data_type))
        }
        MicroAggregationFunction::Median => {
            let sorted = sorted_values(&present, data_type);
            Ok(sorted[(sorted.len() - 1) / 2].to_string())
        }
        MicroAggregationFunction::Interval => {
            let sorted = sorted_values(&present, data_type);
            Ok(format!("[{}, {}]", sorted[0], sorted[sorted.len() - 1]))
        }
        MicroAggregationFunction::Set => {
            let mut distinct = sorted_values(&present, data_type);
            distinct.dedup();
            Ok(format!("{{{}}}", distinct.join(", ")))
        }
        MicroAggregationFunction::Mode => {
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for value in &present {
                *counts.entry(*value).or_default() += 1;
            }
            let sorted = sorted_values(&present, data_type);
            let best = sorted
                .iter()
                .copied()
                .max_by(|a, b| counts[a].cmp(&counts[b]).then_with(|| natural_cmp(b, a, data_type)))
                .unwrap_or(MISSING_VALUE);
            Ok(best.to_string())
        }
    }
}

fn parse_numbers(attribute: &str, values: &[&str]) -> Result<Vec<f64>, AnonymizationError> {
    values
        .iter()
        .map(|v| {
            v.parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(|| AnonymizationError::NonNumericValue {
                    attribute: attribute.to_string(),
                    value: v.to_string(),
                })
        })
        .collect()
}

fn format_number(value: f64, data_type: DataType) -> String {
    match data_type {
        DataType::Integer => (value.round() as i64).to_string(),
        _ => value.to_string(),
    }
}

fn natural_cmp(a: &str, b: &str, data_type: DataType) -> Ordering {
    if data_type.is_numeric() {
        if let (Ok(x), Ok(y)) = (a.parse::<f64>(), b.parse::<f64>()) {
            return x.partial_cmp(&y).unwrap_or(Ordering::Equal).then_with(|| a.cmp(b));
        }
    }
    a.cmp(b)
}

fn sorted_values<'a>(values: &[&'a str], data_type: DataType) -> Vec<&'a str> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| natural_cmp(a, b, data_type));
    sorted
}
