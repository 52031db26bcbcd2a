//! Fixed-width numeric buckets
//!
//! Level 1 splits `[floor(min), ceil(max) + eps[` into buckets of the
//! configured width starting at the lower bound. Every further level doubles
//! the width, still aligned at the lower bound, until one bucket covers the
//! whole range. Labels are `[lo, hi[` ranges, or the bucket mean when the
//! column keeps its data type.

use crate::domain::{AnonymizationError, DataType, SUPPRESSED_VALUE};
use std::fmt::Display;

/// Upper bound on the number of interval levels
const MAX_INTERVAL_LEVELS: usize = 32;

/// Added to `ceil(max)` for decimal columns
const DECIMAL_EPSILON: f64 = 1e-6;

/// Slack for values sitting on a bucket boundary after float division
const BOUNDARY_TOLERANCE: f64 = 1e-9;

/// Most decimal places a label is printed with
const MAX_LABEL_DECIMALS: usize = 10;

/// Number type a bucket hierarchy is built over
pub(super) trait Numeric: Copy + PartialOrd + Display {
    fn parse_value(text: &str) -> Option<Self>;

    /// Positive bucket width, or `None`
    fn parse_width(text: &str) -> Option<Self>;

    fn lower_bound(min: Self) -> Self;

    fn upper_bound(max: Self) -> Self;

    /// `start + width * steps`
    fn offset(start: Self, width: Self, steps: u64) -> Self;

    /// Index of the bucket containing `value`
    fn bucket(value: Self, start: Self, width: Self) -> u64;

    fn double(width: Self) -> Self;

    /// Bucket bound printed with at most `decimals` decimal places
    fn bound_label(value: Self, decimals: usize) -> String;

    /// Label of `[lo, hi[` when the column keeps its type
    fn mean_label(lo: Self, hi: Self, decimals: usize) -> String;
}

impl Numeric for i64 {
    fn parse_value(text: &str) -> Option<Self> {
        text.trim().parse().ok()
    }

    fn parse_width(text: &str) -> Option<Self> {
        text.trim().parse::<i64>().ok().filter(|w| *w > 0)
    }

    fn lower_bound(min: Self) -> Self {
        min
    }

    fn upper_bound(max: Self) -> Self {
        max.saturating_add(1)
    }

    fn offset(start: Self, width: Self, steps: u64) -> Self {
        let steps = i64::try_from(steps).unwrap_or(i64::MAX);
        start.saturating_add(width.saturating_mul(steps))
    }

    fn bucket(value: Self, start: Self, width: Self) -> u64 {
        u64::try_from(value.saturating_sub(start).div_euclid(width)).unwrap_or(0)
    }

    fn double(width: Self) -> Self {
        width.saturating_mul(2)
    }

    fn bound_label(value: Self, _decimals: usize) -> String {
        value.to_string()
    }

    fn mean_label(lo: Self, hi: Self, _decimals: usize) -> String {
        (lo + (hi - 1 - lo).div_euclid(2)).to_string()
    }
}

impl Numeric for f64 {
    fn parse_value(text: &str) -> Option<Self> {
        text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
    }

    fn parse_width(text: &str) -> Option<Self> {
        Self::parse_value(text).filter(|w| *w > 0.0)
    }

    fn lower_bound(min: Self) -> Self {
        min.floor()
    }

    fn upper_bound(max: Self) -> Self {
        max.ceil() + DECIMAL_EPSILON
    }

    fn offset(start: Self, width: Self, steps: u64) -> Self {
        start + width * steps as f64
    }

    fn bucket(value: Self, start: Self, width: Self) -> u64 {
        ((value - start) / width + BOUNDARY_TOLERANCE).floor().max(0.0) as u64
    }

    fn double(width: Self) -> Self {
        width * 2.0
    }

    fn bound_label(value: Self, decimals: usize) -> String {
        format_decimal(value, decimals)
    }

    fn mean_label(lo: Self, hi: Self, decimals: usize) -> String {
        // halving a bound can add one decimal place
        format_decimal((lo + hi) / 2.0, decimals + 1)
    }
}

fn format_decimal(value: f64, decimals: usize) -> String {
    let text = format!("{value:.decimals$}");
    let text = if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text.as_str()
    };
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

/// Decimal places of a configured width, `"2.5"` has one
fn decimal_places(width: &str) -> usize {
    let width = width.trim();
    if width.contains(['e', 'E']) {
        return MAX_LABEL_DECIMALS;
    }
    width
        .split_once('.')
        .map_or(0, |(_, fraction)| fraction.len())
        .min(MAX_LABEL_DECIMALS)
}

/// Rows of an interval hierarchy for the non-missing distinct values
pub(super) fn build<T: Numeric>(
    attribute: &str,
    values: &[&str],
    interval_size: &str,
    data_type: DataType,
    retain_data_type: bool,
) -> Result<Vec<Vec<String>>, AnonymizationError> {
    let width = T::parse_width(interval_size).ok_or_else(|| {
        AnonymizationError::MalformedIntervalSize {
            attribute: attribute.to_string(),
            value: interval_size.to_string(),
            data_type: data_type.to_string(),
        }
    })?;
    let decimals = decimal_places(interval_size);

    let parsed = values
        .iter()
        .map(|text| {
            T::parse_value(text)
                .map(|number| (*text, number))
                .ok_or_else(|| AnonymizationError::NonNumericValue {
                    attribute: attribute.to_string(),
                    value: text.to_string(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let Some(min) = parsed.iter().map(|(_, n)| *n).reduce(|a, b| if b < a { b } else { a }) else {
        return Ok(Vec::new());
    };
    let max = parsed
        .iter()
        .map(|(_, n)| *n)
        .fold(min, |a, b| if b > a { b } else { a });
    let start = T::lower_bound(min);
    let end = T::upper_bound(max);

    let mut rows: Vec<Vec<String>> = parsed.iter().map(|(text, _)| vec![text.to_string()]).collect();

    let mut level_width = width;
    for _ in 0..MAX_INTERVAL_LEVELS {
        for (row, (_, number)) in rows.iter_mut().zip(&parsed) {
            let bucket = T::bucket(*number, start, level_width);
            let lo = T::offset(start, level_width, bucket);
            let hi = T::offset(start, level_width, bucket + 1);
            row.push(if retain_data_type {
                T::mean_label(lo, hi, decimals)
            } else {
                format!(
                    "[{}, {}[",
                    T::bound_label(lo, decimals),
                    T::bound_label(hi, decimals)
                )
            });
        }
        if T::offset(start, level_width, 1) >= end {
            break;
        }
        level_width = T::double(level_width);
    }

    for row in &mut rows {
        row.push(SUPPRESSED_VALUE.to_string());
    }
    Ok(rows)
}
