//! Integration tests for hierarchy construction

use veil::anonymization::config::IntervalSize;
use veil::anonymization::{build_hierarchy, Granularity, HierarchyConfig, HierarchyKind};
use veil::domain::{AnonymizationError, DataType};

fn intervals(width: IntervalSize) -> HierarchyConfig {
    HierarchyConfig::new("age", HierarchyKind::Intervals { interval_size: width })
}

#[test]
fn test_interval_levels_nest() {
    let values = ["3", "17", "18", "42", "64", "65", "90"];
    let hierarchy =
        build_hierarchy(&values, DataType::Integer, &intervals(IntervalSize::Integer(10)), false)
            .unwrap();

    assert_eq!(hierarchy.generalize("3", 0), "3");
    assert_eq!(hierarchy.generalize("3", 1), "[3, 13[");
    assert_eq!(hierarchy.generalize("17", 1), "[13, 23[");
    assert_eq!(hierarchy.generalize("18", 1), "[13, 23[");
    assert_eq!(hierarchy.generalize("90", hierarchy.max_level()), "*");

    // Values sharing a label at one level share it at every coarser level
    for level in 1..=hierarchy.max_level() {
        for a in values {
            for b in values {
                if hierarchy.generalize(a, level) == hierarchy.generalize(b, level) {
                    for coarser in level..=hierarchy.max_level() {
                        assert_eq!(
                            hierarchy.generalize(a, coarser),
                            hierarchy.generalize(b, coarser),
                            "{a} and {b} split at level {coarser}"
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn test_interval_size_from_text() {
    let hierarchy = build_hierarchy(
        &["1.5", "4.0"],
        DataType::Decimal,
        &intervals(IntervalSize::Text("2.5".to_string())),
        false,
    )
    .unwrap();
    assert_eq!(hierarchy.generalize("1.5", 1), "[1, 3.5[");
    assert_eq!(hierarchy.generalize("4.0", 1), "[3.5, 6[");
}

#[test]
fn test_malformed_interval_size() {
    let err = build_hierarchy(
        &["1", "2"],
        DataType::Integer,
        &intervals(IntervalSize::Text("five".to_string())),
        false,
    )
    .unwrap_err();
    assert!(matches!(err, AnonymizationError::MalformedIntervalSize { .. }));
}

#[test]
fn test_non_numeric_cell_is_rejected() {
    let err = build_hierarchy(
        &["12", "unknown"],
        DataType::Integer,
        &intervals(IntervalSize::Integer(5)),
        false,
    )
    .unwrap_err();
    assert_eq!(
        err,
        AnonymizationError::NonNumericValue {
            attribute: "age".to_string(),
            value: "unknown".to_string(),
        }
    );
}

#[test]
fn test_masking_merges_prefixes() {
    let config = HierarchyConfig::new("zip", HierarchyKind::Masking { mask_char: '*' });
    let hierarchy =
        build_hierarchy(&["81667", "81675", "82001"], DataType::String, &config, false).unwrap();

    assert_eq!(hierarchy.generalize("81667", 2), "816**");
    assert_eq!(hierarchy.generalize("81675", 2), "816**");
    assert_ne!(hierarchy.generalize("82001", 3), hierarchy.generalize("81667", 3));
    assert_eq!(hierarchy.generalize("82001", 4), "8****");
    assert_eq!(hierarchy.generalize("81667", 4), "8****");
    assert_eq!(hierarchy.generalize("82001", hierarchy.max_level()), "*");
}

#[test]
fn test_dates_generalize_to_decodable_labels() {
    let config = HierarchyConfig::new(
        "birth",
        HierarchyKind::Dates {
            date_format: "yyyy-MM-dd".to_string(),
            granularity: Granularity::QuarterYear,
        },
    );
    let values = ["1915-03-17", "1915-02-01", "1923-11-30"];
    let hierarchy = build_hierarchy(&values, DataType::Date, &config, false).unwrap();

    assert_eq!(hierarchy.generalize("1915-03-17", 1), "Q1 1915");
    assert_eq!(hierarchy.generalize("1915-02-01", 1), "Q1 1915");
    assert_eq!(hierarchy.generalize("1923-11-30", 2), "1923");
    assert_eq!(hierarchy.generalize("1923-11-30", 3), "[1920, 1930[");

    let chain = Granularity::QuarterYear.chain();
    for (offset, granularity) in chain.iter().enumerate() {
        let label = hierarchy.generalize("1923-11-30", offset + 1);
        assert!(granularity.decode(label).is_ok(), "{label} for {granularity}");
    }
}

#[test]
fn test_missing_cells_everywhere() {
    let config = HierarchyConfig::new("zip", HierarchyKind::Suppression);
    let hierarchy = build_hierarchy(&["81667", "NULL"], DataType::String, &config, false).unwrap();
    assert_eq!(hierarchy.generalize("NULL", 0), "NULL");
    assert_eq!(hierarchy.generalize("NULL", 1), "*");
}
