//! Right-to-left character redaction

use crate::domain::{DataType, SUPPRESSED_VALUE};
use std::collections::BTreeSet;
use tracing::debug;

/// Rows of a redaction hierarchy
///
/// Values are right-padded with spaces to the longest value, then level `j`
/// replaces the last `j` characters with the mask. The level where every
/// character is masked is followed by `*`.
pub(super) fn build(values: &[&str], mask_char: char) -> Vec<Vec<String>> {
    let max_len = values.iter().map(|v| v.chars().count()).max().unwrap_or(0);
    let alphabet: BTreeSet<char> = values.iter().flat_map(|v| v.chars()).collect();
    debug!(
        alphabet_size = alphabet.len(),
        max_length = max_len,
        "Building redaction hierarchy"
    );

    values
        .iter()
        .map(|value| {
            let padded: Vec<char> = value
                .chars()
                .chain(std::iter::repeat(' '))
                .take(max_len)
                .collect();
            let mut row = Vec::with_capacity(max_len + 2);
            row.push(value.to_string());
            for masked in 1..=max_len {
                let keep = max_len - masked;
                let label: String = padded[..keep]
                    .iter()
                    .copied()
                    .chain(std::iter::repeat(mask_char).take(masked))
                    .collect();
                row.push(label);
            }
            row.push(SUPPRESSED_VALUE.to_string());
            row
        })
        .collect()
}

/// Values in their natural order: numeric for integers, lexical otherwise
pub(super) fn natural_order<'a>(values: &[&'a str], data_type: DataType) -> Vec<&'a str> {
    let mut ordered = values.to_vec();
    if data_type == DataType::Integer {
        ordered.sort_by_key(|v| (v.trim().parse::<i64>().ok(), v.to_string()));
    } else {
        ordered.sort_unstable();
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masking_levels() {
        let rows = build(&["1234", "129"], '*');
        assert_eq!(rows[0], vec!["1234", "123*", "12**", "1***", "****", "*"]);
        assert_eq!(rows[1], vec!["129", "129*", "12**", "1***", "****", "*"]);
    }

    #[test]
    fn test_custom_mask_char() {
        let rows = build(&["ab"], '#');
        assert_eq!(rows[0], vec!["ab", "a#", "##", "*"]);
    }

    #[test]
    fn test_natural_order_for_integers() {
        let ordered = natural_order(&["10", "9", "100"], DataType::Integer);
        assert_eq!(ordered, vec!["9", "10", "100"]);
    }
}
