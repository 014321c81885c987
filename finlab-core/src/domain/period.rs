//! Calendar-month periods and inclusive monthly date ranges.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::data::DataError;

/// A calendar month. The canonical key of every time-series table.
///
/// Ordering is chronological (year, then month).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    /// Returns `None` unless `month` is in 1..=12.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) && NaiveDate::from_ymd_opt(year, month, 1).is_some() {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.succ()
            .first_day()
            .pred_opt()
            .unwrap_or(NaiveDate::MAX)
    }

    /// The following month.
    pub fn succ(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// The preceding month.
    pub fn pred(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Parse a textual month.
    ///
    /// Accepted encodings: `YYYYMM`, `YYYY-MM`, `YYYY/MM`, `YYYY-MM-DD`, and
    /// ISO date-times (`YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD HH:MM:SS`).
    pub fn parse(input: &str) -> Result<Self, DataError> {
        let s = input.trim();
        let invalid = || DataError::InvalidDate(format!("'{input}' is not a recognizable month"));

        if s.len() == 6 && s.bytes().all(|b| b.is_ascii_digit()) {
            let year: i32 = s[..4].parse().map_err(|_| invalid())?;
            let month: u32 = s[4..].parse().map_err(|_| invalid())?;
            return Self::new(year, month).ok_or_else(invalid);
        }

        if s.len() == 7 && s.is_char_boundary(4) {
            let (year, rest) = s.split_at(4);
            let month = rest
                .strip_prefix('-')
                .or_else(|| rest.strip_prefix('/'))
                .ok_or_else(invalid)?;
            if !year.bytes().all(|b| b.is_ascii_digit()) || !month.bytes().all(|b| b.is_ascii_digit())
            {
                return Err(invalid());
            }
            let year: i32 = year.parse().map_err(|_| invalid())?;
            let month: u32 = month.parse().map_err(|_| invalid())?;
            return Self::new(year, month).ok_or_else(invalid);
        }

        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(Self::from_date(date));
        }

        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Ok(Self::from_date(dt.date()));
            }
        }

        if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
            return Ok(Self::from_date(dt.date_naive()));
        }

        Err(invalid())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Period::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Inclusive range of periods. Either bound may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<Period>,
    pub end: Option<Period>,
}

impl DateRange {
    /// Unbounded on both sides.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(start: Period, end: Period) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Parse optional textual bounds. Each present bound must be a valid month.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, DataError> {
        Ok(Self {
            start: start.map(Period::parse).transpose()?,
            end: end.map(Period::parse).transpose()?,
        })
    }

    pub fn contains(&self, period: Period) -> bool {
        self.start.map_or(true, |s| period >= s) && self.end.map_or(true, |e| period <= e)
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}
