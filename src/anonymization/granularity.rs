//! Calendar granularity codec
//!
//! Encodes dates into the bucket labels used by date hierarchies and decodes
//! those labels back into a representative literal date:
//!
//! | Granularity    | Label          | Representative date        |
//! |----------------|----------------|----------------------------|
//! | `WEEK_YEAR`    | `11/1915`      | Monday of ISO week 11      |
//! | `MONTH_YEAR`   | `01/1915`      | `1915-01-01`               |
//! | `QUARTER_YEAR` | `Q1 1915`      | `1915-02-01`               |
//! | `YEAR`         | `1915`         | `1915-07-01`               |
//! | `DECADE`       | `[1910, 1920[` | `1915-01-01`               |
//!
//! Suppressed labels (`*` or anything containing `NULL`) decode to the
//! sentinel date `0001-01-01`.

use crate::domain::{AnonymizationError, SUPPRESSED_VALUE};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output format of decoded dates
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Calendar bucket size of a date hierarchy level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Granularity {
    /// ISO week of the ISO week-based year
    WeekYear,
    /// Month of the year
    MonthYear,
    /// Quarter of the year
    QuarterYear,
    /// Calendar year
    Year,
    /// Ten-year span starting at a multiple of ten
    Decade,
}

impl Granularity {
    /// Wire name of the granularity
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WeekYear => "WEEK_YEAR",
            Self::MonthYear => "MONTH_YEAR",
            Self::QuarterYear => "QUARTER_YEAR",
            Self::Year => "YEAR",
            Self::Decade => "DECADE",
        }
    }

    /// This granularity followed by every coarser one it nests into
    ///
    /// Weeks don't nest into months or quarters, so the week chain jumps
    /// straight to years.
    pub fn chain(self) -> Vec<Granularity> {
        match self {
            Self::WeekYear => vec![Self::WeekYear, Self::Year, Self::Decade],
            Self::MonthYear => vec![Self::MonthYear, Self::QuarterYear, Self::Year, Self::Decade],
            Self::QuarterYear => vec![Self::QuarterYear, Self::Year, Self::Decade],
            Self::Year => vec![Self::Year, Self::Decade],
            Self::Decade => vec![Self::Decade],
        }
    }

    /// Bucket label of a date
    pub fn encode(self, date: NaiveDate) -> String {
        match self {
            Self::WeekYear => {
                let week = date.iso_week();
                format!("{:02}/{}", week.week(), week.year())
            }
            Self::MonthYear => format!("{:02}/{}", date.month(), date.year()),
            Self::QuarterYear => format!("Q{} {}", (date.month() - 1) / 3 + 1, date.year()),
            Self::Year => date.year().to_string(),
            Self::Decade => {
                let lower = date.year().div_euclid(10) * 10;
                format!("[{}, {}[", lower, lower + 10)
            }
        }
    }

    /// Representative date of a bucket label
    ///
    /// # Errors
    ///
    /// Returns `MalformedGeneralizedDateLabel` when the label doesn't have
    /// the shape of this granularity or names an impossible date.
    pub fn decode(self, label: &str) -> Result<NaiveDate, AnonymizationError> {
        let trimmed = label.trim();
        if trimmed == SUPPRESSED_VALUE || trimmed.contains("NULL") {
            return Ok(sentinel_date());
        }

        let decoded = match self {
            Self::Year => trimmed
                .parse::<i32>()
                .ok()
                .and_then(|year| NaiveDate::from_ymd_opt(year, 7, 1)),
            Self::Decade => parse_decade_lower_bound(trimmed)
                .and_then(|lower| lower.checked_add(5))
                .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1)),
            Self::QuarterYear => parse_quarter(trimmed).and_then(|(quarter, year)| {
                NaiveDate::from_ymd_opt(year, (quarter - 1) * 3 + 2, 1)
            }),
            Self::MonthYear => parse_slash_pair(trimmed)
                .and_then(|(month, year)| NaiveDate::from_ymd_opt(year, month, 1)),
            Self::WeekYear => parse_slash_pair(trimmed)
                .and_then(|(week, year)| NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)),
        };

        decoded.ok_or_else(|| AnonymizationError::MalformedGeneralizedDateLabel {
            label: label.to_string(),
            granularity: self.as_str().to_string(),
        })
    }

    /// Representative date of a bucket label, formatted `yyyy-MM-dd`
    pub fn decode_to_string(self, label: &str) -> Result<String, AnonymizationError> {
        self.decode(label)
            .map(|date| date.format(ISO_DATE_FORMAT).to_string())
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Date that suppressed labels decode to
pub fn sentinel_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or_default()
}

/// Thursday of the ISO week containing `date`
///
/// The Thursday always falls in the week's ISO year, so encoding it with a
/// calendar granularity keeps week buckets from straddling two years.
pub fn iso_week_anchor(date: NaiveDate) -> NaiveDate {
    let week = date.iso_week();
    NaiveDate::from_isoywd_opt(week.year(), week.week(), Weekday::Thu).unwrap_or(date)
}

fn parse_decade_lower_bound(label: &str) -> Option<i32> {
    let inner = label.strip_prefix('[')?.strip_suffix('[')?;
    let (lower, upper) = inner.split_once(',')?;
    let lower: i32 = lower.trim().parse().ok()?;
    let upper: i32 = upper.trim().parse().ok()?;
    (upper > lower).then_some(lower)
}

fn parse_quarter(label: &str) -> Option<(u32, i32)> {
    let rest = label.strip_prefix('Q')?;
    let (quarter, year) = rest.split_once(' ')?;
    let quarter: u32 = quarter.trim().parse().ok()?;
    let year: i32 = year.trim().parse().ok()?;
    (1..=4).contains(&quarter).then_some((quarter, year))
}

fn parse_slash_pair(label: &str) -> Option<(u32, i32)> {
    let (first, year) = label.split_once('/')?;
    Some((first.trim().parse().ok()?, year.trim().parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_decode_year_midpoint() {
        assert_eq!(
            Granularity::Year.decode_to_string("1915").unwrap(),
            "1915-07-01"
        );
    }

    #[test]
    fn test_decode_decade_with_and_without_space() {
        assert_eq!(
            Granularity::Decade.decode_to_string("[1910, 1920[").unwrap(),
            "1915-01-01"
        );
        assert_eq!(
            Granularity::Decade.decode_to_string("[1910,1920[").unwrap(),
            "1915-01-01"
        );
    }

    #[test]
    fn test_decode_quarter() {
        assert_eq!(
            Granularity::QuarterYear.decode_to_string("Q1 1915").unwrap(),
            "1915-02-01"
        );
        assert_eq!(
            Granularity::QuarterYear.decode_to_string("Q4 1915").unwrap(),
            "1915-11-01"
        );
    }

    #[test]
    fn test_decode_week_is_monday() {
        let decoded = Granularity::WeekYear.decode("11/1915").unwrap();
        assert_eq!(decoded.weekday(), Weekday::Mon);
        assert_eq!(decoded.iso_week().week(), 11);
        assert_eq!(decoded.iso_week().year(), 1915);
    }

    #[test]
    fn test_decode_suppressed_is_sentinel() {
        assert_eq!(
            Granularity::Year.decode_to_string("*").unwrap(),
            "0001-01-01"
        );
        assert_eq!(
            Granularity::MonthYear.decode_to_string("NULL").unwrap(),
            "0001-01-01"
        );
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(
            Granularity::QuarterYear.decode("Q5 1915"),
            Err(AnonymizationError::MalformedGeneralizedDateLabel { .. })
        ));
        assert!(Granularity::MonthYear.decode("13/1915").is_err());
        assert!(Granularity::Decade.decode("1910-1920").is_err());
        assert!(Granularity::Year.decode("nineteen").is_err());
    }

    #[test]
    fn test_encode_labels() {
        let d = date(1915, 3, 17);
        assert_eq!(Granularity::MonthYear.encode(d), "03/1915");
        assert_eq!(Granularity::QuarterYear.encode(d), "Q1 1915");
        assert_eq!(Granularity::Year.encode(d), "1915");
        assert_eq!(Granularity::Decade.encode(d), "[1910, 1920[");
        assert_eq!(Granularity::WeekYear.encode(d), "11/1915");
    }

    #[test]
    fn test_encode_then_decode_lands_in_same_bucket() {
        let d = date(1987, 10, 5);
        for granularity in Granularity::MonthYear.chain() {
            let label = granularity.encode(d);
            let representative = granularity.decode(&label).unwrap();
            assert_eq!(granularity.encode(representative), label);
        }
    }

    #[test]
    fn test_iso_week_anchor_stays_in_iso_year() {
        // 2014-12-29 belongs to ISO week 1 of 2015
        let anchor = iso_week_anchor(date(2014, 12, 29));
        assert_eq!(anchor.year(), 2015);
        assert_eq!(anchor.weekday(), Weekday::Thu);
    }
}
