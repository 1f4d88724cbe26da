//! Date handling for crawl windows
//!
//! Dates appear in three places: the configured since/end dates, the
//! target-list file, and the resume cursor written back to it. All of them
//! use either `YYYY-MM-DD` or `YYYY-MM-DD HH:MM`, in local wall-clock time.

use crate::ConfigError;
use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Deserialize;
use std::fmt;

/// Format used for minute-precision dates and the resume cursor
pub const MINUTE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Format used for day-precision dates
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Parses a date string in either supported format
///
/// A string containing `:` is read as `YYYY-MM-DD HH:MM`, anything else as
/// `YYYY-MM-DD` at midnight.
pub fn str_to_time(text: &str) -> Result<NaiveDateTime, ConfigError> {
    let text = text.trim();
    if text.contains(':') {
        NaiveDateTime::parse_from_str(text, MINUTE_FORMAT)
            .map_err(|_| ConfigError::InvalidDate(text.to_string()))
    } else {
        NaiveDate::parse_from_str(text, DAY_FORMAT)
            .map(|d| d.and_time(NaiveTime::MIN))
            .map_err(|_| ConfigError::InvalidDate(text.to_string()))
    }
}

/// Returns true if the string parses as one of the supported date formats
pub fn is_valid_date(text: &str) -> bool {
    str_to_time(text).is_ok()
}

/// Current local wall-clock time, truncated to the minute
pub fn now_minute() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now)
}

/// The configured lower bound of a crawl window
///
/// Either an explicit date, or a number of days before today.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SinceDate {
    DaysAgo(i64),
    Date(String),
}

impl SinceDate {
    /// Resolves to a concrete timestamp relative to `today`
    pub fn resolve(&self, today: NaiveDate) -> Result<NaiveDateTime, ConfigError> {
        match self {
            Self::DaysAgo(days) if *days < 0 => Err(ConfigError::Validation(format!(
                "since-date day count must be >= 0, got {}",
                days
            ))),
            Self::DaysAgo(days) => Ok((today - Duration::days(*days)).and_time(NaiveTime::MIN)),
            Self::Date(text) => str_to_time(text),
        }
    }
}

impl Default for SinceDate {
    fn default() -> Self {
        Self::DaysAgo(0)
    }
}

/// The configured upper bound of a crawl window
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndDate {
    /// The moment the account finishes crawling
    Now,
    /// A fixed timestamp, kept with its original spelling
    At { text: String, time: NaiveDateTime },
}

impl EndDate {
    /// Parses `"now"` or a date string
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        if text.trim() == "now" {
            Ok(Self::Now)
        } else {
            let time = str_to_time(text)?;
            Ok(Self::At {
                text: text.trim().to_string(),
                time,
            })
        }
    }

    /// Returns the bound as a timestamp, using `now` for [`EndDate::Now`]
    pub fn as_time(&self, now: NaiveDateTime) -> NaiveDateTime {
        match self {
            Self::Now => now,
            Self::At { time, .. } => *time,
        }
    }
}

impl Default for EndDate {
    fn default() -> Self {
        Self::Now
    }
}

impl fmt::Display for EndDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Now => f.write_str("now"),
            Self::At { text, .. } => f.write_str(text),
        }
    }
}
