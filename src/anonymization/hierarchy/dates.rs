//! Calendar hierarchies

use crate::anonymization::granularity::{iso_week_anchor, Granularity};
use crate::domain::{AnonymizationError, SUPPRESSED_VALUE};
use chrono::{NaiveDate, NaiveDateTime};

/// Translate Java-style date patterns (`dd.MM.yyyy`) to chrono's `strftime`
///
/// Patterns that already contain `%` are returned unchanged. Text in single
/// quotes is copied literally.
pub fn translate_date_format(pattern: &str) -> String {
    if pattern.contains('%') {
        return pattern.to_string();
    }

    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            i += 1;
            while i < chars.len() && chars[i] != '\'' {
                out.push(chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }

        let run = chars[i..].iter().take_while(|&&x| x == c).count();
        let token = match (c, run) {
            ('y', 2) => Some("%y"),
            ('y', _) => Some("%Y"),
            ('M', 3) => Some("%b"),
            ('M', n) if n >= 4 => Some("%B"),
            ('M', _) => Some("%m"),
            ('d', _) => Some("%d"),
            ('H', _) => Some("%H"),
            ('m', _) => Some("%M"),
            ('s', _) => Some("%S"),
            _ => None,
        };
        match token {
            Some(token) => out.push_str(token),
            None => out.extend(std::iter::repeat(c).take(run)),
        }
        i += run;
    }
    out
}

fn parse_date(value: &str, format: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, format)
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, format)
                .ok()
                .map(|dt| dt.date())
        })
}

/// Rows of a calendar hierarchy for the non-missing distinct values
pub(super) fn build(
    attribute: &str,
    values: &[&str],
    date_format: &str,
    granularity: Granularity,
    retain_data_type: bool,
) -> Result<Vec<Vec<String>>, AnonymizationError> {
    let format = translate_date_format(date_format);
    let chain = granularity.chain();

    values
        .iter()
        .map(|value| {
            let date = parse_date(value, &format).ok_or_else(|| {
                AnonymizationError::MalformedDateValue {
                    attribute: attribute.to_string(),
                    value: value.to_string(),
                    format: date_format.to_string(),
                }
            })?;

            let mut row = Vec::with_capacity(chain.len() + 2);
            row.push(value.to_string());
            for level in &chain {
                let source = if granularity == Granularity::WeekYear && *level != Granularity::WeekYear {
                    iso_week_anchor(date)
                } else {
                    date
                };
                let label = level.encode(source);
                row.push(if retain_data_type {
                    level.decode_to_string(&label)?
                } else {
                    label
                });
            }
            row.push(SUPPRESSED_VALUE.to_string());
            Ok(row)
        })
        .collect()
}
