//! Time buckets
//!
//! A `TimeRange` is a UTC timestamp truncated to one of five precisions.
//! Its canonical text form has a fixed length per precision, so the text
//! alone is enough to recover both the date and the precision:
//!
//! | Precision | Text                | Length |
//! |-----------|---------------------|--------|
//! | Year      | `2015`              | 4      |
//! | Month     | `2015-08`           | 7      |
//! | Day       | `2015-08-02`        | 10     |
//! | Hour      | `2015-08-02 00`     | 13     |
//! | Minute    | `2015-08-02 00:03`  | 16     |

use crate::indexer::error::{IndexerError, IndexerResult};
use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Years whose buckets keep the four-digit text form
pub const SUPPORTED_YEARS: RangeInclusive<i32> = 0..=9999;

/// Granularity of a bucket, ordered from coarsest to finest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Year,
    Month,
    Day,
    Hour,
    Minute,
}

impl Precision {
    /// All precisions, coarsest first
    pub const ALL: [Precision; 5] = [
        Precision::Year,
        Precision::Month,
        Precision::Day,
        Precision::Hour,
        Precision::Minute,
    ];

    /// Shape of the canonical text: `d` is an ASCII digit, anything else is literal
    fn template(&self) -> &'static str {
        match self {
            Precision::Year => "dddd",
            Precision::Month => "dddd-dd",
            Precision::Day => "dddd-dd-dd",
            Precision::Hour => "dddd-dd-dd dd",
            Precision::Minute => "dddd-dd-dd dd:dd",
        }
    }

    fn chrono_format(&self) -> &'static str {
        match self {
            Precision::Year => "%Y",
            Precision::Month => "%Y-%m",
            Precision::Day => "%Y-%m-%d",
            Precision::Hour => "%Y-%m-%d %H",
            Precision::Minute => "%Y-%m-%d %H:%M",
        }
    }

    /// Length of the canonical text form for this precision
    pub fn text_len(&self) -> usize {
        self.template().len()
    }

    /// Find the precision whose canonical text has exactly `len` characters
    pub fn from_text_len(len: usize) -> Option<Precision> {
        Self::ALL.into_iter().find(|p| p.text_len() == len)
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::Year => write!(f, "year"),
            Precision::Month => write!(f, "month"),
            Precision::Day => write!(f, "day"),
            Precision::Hour => write!(f, "hour"),
            Precision::Minute => write!(f, "minute"),
        }
    }
}

/// A bucket identity: a date truncated to a precision (UTC)
///
/// Cheap `Copy` value; two ranges are the same bucket iff they compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRange {
    date: DateTime<Utc>,
    precision: Precision,
}

impl TimeRange {
    /// Truncate a timestamp to `precision`, zeroing every finer field
    pub fn truncate(timestamp: DateTime<Utc>, precision: Precision) -> Self {
        let date = timestamp.date_naive();
        let midnight = |d: NaiveDate| d.and_time(NaiveTime::MIN);

        let naive = match precision {
            Precision::Year => midnight(date - Days::new(u64::from(date.ordinal0()))),
            Precision::Month => midnight(date - Days::new(u64::from(date.day0()))),
            Precision::Day => midnight(date),
            Precision::Hour => midnight(date) + Duration::hours(i64::from(timestamp.hour())),
            Precision::Minute => {
                midnight(date)
                    + Duration::hours(i64::from(timestamp.hour()))
                    + Duration::minutes(i64::from(timestamp.minute()))
            }
        };

        Self {
            date: naive.and_utc(),
            precision,
        }
    }

    /// Whether a timestamp's buckets can be written and parsed back
    pub fn supports(timestamp: DateTime<Utc>) -> bool {
        SUPPORTED_YEARS.contains(&timestamp.year())
    }

    /// The five buckets a timestamp belongs to, coarsest first
    pub fn all_for(timestamp: DateTime<Utc>) -> [TimeRange; 5] {
        Precision::ALL.map(|precision| Self::truncate(timestamp, precision))
    }

    /// Parse the canonical text form, picking the pattern by length
    pub fn parse(text: &str) -> IndexerResult<Self> {
        let precision =
            Precision::from_text_len(text.len()).ok_or_else(|| IndexerError::format(text))?;

        let shape_ok = text
            .bytes()
            .zip(precision.template().bytes())
            .all(|(c, t)| if t == b'd' { c.is_ascii_digit() } else { c == t });
        if !shape_ok {
            return Err(IndexerError::format(text));
        }

        // Shape is verified, so every slice below is ASCII digits.
        let field = |range: std::ops::Range<usize>| -> u32 {
            text.get(range)
                .and_then(|s| s.parse().ok())
                .unwrap_or(0)
        };
        let at_least = |p: Precision| precision >= p;

        let year = field(0..4) as i32;
        let month = if at_least(Precision::Month) { field(5..7) } else { 1 };
        let day = if at_least(Precision::Day) { field(8..10) } else { 1 };
        let hour = if at_least(Precision::Hour) { field(11..13) } else { 0 };
        let minute = if at_least(Precision::Minute) { field(14..16) } else { 0 };

        let naive = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .ok_or_else(|| IndexerError::format(text))?;

        Ok(Self {
            date: naive.and_utc(),
            precision,
        })
    }

    /// Start of the bucket
    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Canonical text form, also used as the bucket key
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Check if a timestamp falls within this bucket
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        Self::truncate(timestamp, self.precision) == *self
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date.format(self.precision.chrono_format()))
    }
}

impl FromStr for TimeRange {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap()
    }

    #[test]
    fn test_format_each_precision() {
        let ts = reference();
        let expected = [
            (Precision::Year, "2006"),
            (Precision::Month, "2006-01"),
            (Precision::Day, "2006-01-02"),
            (Precision::Hour, "2006-01-02 15"),
            (Precision::Minute, "2006-01-02 15:04"),
        ];

        for (precision, text) in expected {
            let range = TimeRange::truncate(ts, precision);
            assert_eq!(range.to_string(), text);
            assert_eq!(range.key().len(), precision.text_len());
        }
    }

    #[test]
    fn test_truncate_zeroes_finer_fields() {
        let ts = Utc.with_ymd_and_hms(2015, 8, 2, 17, 43, 59).unwrap();

        assert_eq!(
            TimeRange::truncate(ts, Precision::Year).date(),
            Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            TimeRange::truncate(ts, Precision::Month).date(),
            Utc.with_ymd_and_hms(2015, 8, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            TimeRange::truncate(ts, Precision::Hour).date(),
            Utc.with_ymd_and_hms(2015, 8, 2, 17, 0, 0).unwrap()
        );
        assert_eq!(
            TimeRange::truncate(ts, Precision::Minute).date(),
            Utc.with_ymd_and_hms(2015, 8, 2, 17, 43, 0).unwrap()
        );
    }

    #[test]
    fn test_same_bucket_after_truncation() {
        let a = Utc.with_ymd_and_hms(2015, 8, 2, 0, 3, 43).unwrap();
        let b = Utc.with_ymd_and_hms(2015, 8, 2, 0, 3, 44).unwrap();
        let c = Utc.with_ymd_and_hms(2015, 8, 2, 0, 5, 45).unwrap();

        assert_eq!(
            TimeRange::truncate(a, Precision::Minute),
            TimeRange::truncate(b, Precision::Minute)
        );
        assert_ne!(
            TimeRange::truncate(a, Precision::Minute),
            TimeRange::truncate(c, Precision::Minute)
        );
        assert_ne!(
            TimeRange::truncate(a, Precision::Day),
            TimeRange::truncate(a, Precision::Month)
        );
        assert!(TimeRange::truncate(a, Precision::Hour).contains(c));
    }

    #[test]
    fn test_round_trip() {
        let timestamps = [
            reference(),
            Utc.with_ymd_and_hms(2015, 8, 1, 0, 3, 43).unwrap(),
            Utc.with_ymd_and_hms(2016, 2, 29, 23, 59, 59).unwrap(),
            Utc.with_ymd_and_hms(1999, 12, 31, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(812, 3, 9, 7, 8, 9).unwrap(),
        ];

        for ts in timestamps {
            for range in TimeRange::all_for(ts) {
                let parsed = TimeRange::parse(&range.to_string()).unwrap();
                assert_eq!(parsed, range, "round trip of {}", range);
            }
        }
    }

    #[test]
    fn test_parse_picks_precision_by_length() {
        assert_eq!(TimeRange::parse("2015").unwrap().precision(), Precision::Year);
        assert_eq!(TimeRange::parse("2015-08").unwrap().precision(), Precision::Month);
        assert_eq!(
            "2015-08-02 00:03".parse::<TimeRange>().unwrap().precision(),
            Precision::Minute
        );
    }

    #[test]
    fn test_parse_rejects() {
        let rejected = [
            "2015-08-01T00:04",
            "2015-08-01 00:04:30",
            "",
            "15",
            "2015-13",
            "2015-02-30",
            "2015-08-01 24",
            "2015-08-01 10:60",
            "2015/08/01",
            "+201-08",
            "２０１５",
        ];

        for text in rejected {
            match TimeRange::parse(text) {
                Err(IndexerError::Format { literal }) => assert_eq!(literal, text),
                other => panic!("expected format error for {:?}, got {:?}", text, other),
            }
        }
    }

    #[test]
    fn test_precision_order() {
        assert!(Precision::Year < Precision::Month);
        assert!(Precision::Hour < Precision::Minute);
        assert_eq!(Precision::from_text_len(13), Some(Precision::Hour));
        assert_eq!(Precision::from_text_len(19), None);
    }
}
