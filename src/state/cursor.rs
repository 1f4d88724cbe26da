//! Resume cursor: where the next run of an account starts

use crate::dates::{str_to_time, EndDate, MINUTE_FORMAT};
use chrono::NaiveDateTime;
use std::fmt;

/// The since-date proposed for an account's next run
///
/// With an end date of "now" this is the wall-clock minute the account
/// finished; with an explicit end date it is that date, spelled exactly as
/// configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeCursor(String);

impl ResumeCursor {
    /// Derives the cursor for an account that reached `Done` at `now`
    pub fn from_end_date(end: &EndDate, now: NaiveDateTime) -> Self {
        match end {
            EndDate::Now => Self(now.format(MINUTE_FORMAT).to_string()),
            EndDate::At { text, .. } => Self(text.clone()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the cursor back into a timestamp
    pub fn as_time(&self) -> Option<NaiveDateTime> {
        str_to_time(&self.0).ok()
    }
}

impl fmt::Display for ResumeCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
