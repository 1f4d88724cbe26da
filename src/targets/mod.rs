//! Target accounts and where they come from
//!
//! A run harvests an ordered list of [`AccountTarget`]s. The list is either
//! built from the configuration in memory, or read from a target-list file
//! that also receives each account's resume cursor when it finishes.

mod file;

pub use file::{parse_target_lines, read_target_file, rewrite_line, update_target_file, TargetLine};

use crate::config::{CrawlerConfig, UserIdEntry, UserIdList};
use crate::dates::{str_to_time, EndDate};
use crate::state::ResumeCursor;
use crate::ConfigError;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// One crawl unit: an account and its date window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountTarget {
    /// Configured identifier, possibly a vanity alias of the real id
    pub account_id: String,
    pub since_date: NaiveDateTime,
    pub end_date: EndDate,
}

impl AccountTarget {
    pub fn new(account_id: impl Into<String>, since_date: NaiveDateTime, end_date: EndDate) -> Self {
        Self {
            account_id: account_id.into(),
            since_date,
            end_date,
        }
    }
}

/// Origin of a target list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSource {
    /// Built from configuration or command line; never written back
    InMemory,
    /// Read from a file that receives resume cursors
    File(PathBuf),
}

/// Ordered, de-duplicated list of accounts for one run
#[derive(Debug, Clone)]
pub struct TargetList {
    targets: Vec<AccountTarget>,
    source: TargetSource,
}

impl TargetList {
    /// Builds the list described by the crawler configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Crawler configuration holding the list and default window
    /// * `today` - Date used to resolve a day-count since-date
    ///
    /// # Returns
    ///
    /// * `Ok(TargetList)` - The accounts to harvest, in configured order
    /// * `Err(ConfigError)` - Invalid dates, or an unreadable target file
    pub fn from_config(config: &CrawlerConfig, today: NaiveDate) -> Result<Self, ConfigError> {
        let default_since = config.since(today)?;
        let end = config.end()?;

        match &config.user_id_list {
            UserIdList::File(path) => Self::load_file(Path::new(path), default_since, end),
            UserIdList::Inline(entries) => Self::from_entries(entries, default_since, end),
        }
    }

    /// Builds an in-memory list from inline configuration entries
    ///
    /// Detailed entries are kept verbatim with their own window; plain ids
    /// are de-duplicated among themselves only.
    pub fn from_entries(
        entries: &[UserIdEntry],
        default_since: NaiveDateTime,
        end: EndDate,
    ) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut targets = Vec::with_capacity(entries.len());

        for entry in entries {
            match entry {
                UserIdEntry::Detailed(detailed) => {
                    let since = match &detailed.since_date {
                        Some(text) => str_to_time(text)?,
                        None => default_since,
                    };
                    let end_date = match &detailed.end_date {
                        Some(text) => EndDate::parse(text)?,
                        None => end.clone(),
                    };
                    targets.push(AccountTarget::new(detailed.id.clone(), since, end_date));
                }
                plain => {
                    let id = plain.id();
                    if seen.insert(id.clone()) {
                        targets.push(AccountTarget::new(id, default_since, end.clone()));
                    }
                }
            }
        }

        Ok(Self {
            targets,
            source: TargetSource::InMemory,
        })
    }

    /// Builds an in-memory list from bare ids, e.g. from the command line
    pub fn from_ids(ids: &[String], default_since: NaiveDateTime, end: EndDate) -> Self {
        let mut seen = HashSet::new();
        let targets = ids
            .iter()
            .filter(|id| seen.insert(id.to_string()))
            .map(|id| AccountTarget::new(id.clone(), default_since, end.clone()))
            .collect();
        Self {
            targets,
            source: TargetSource::InMemory,
        }
    }

    /// Loads a file-backed list
    pub fn load_file(
        path: &Path,
        default_since: NaiveDateTime,
        end: EndDate,
    ) -> Result<Self, ConfigError> {
        let lines = read_target_file(path)?;
        if lines.is_empty() {
            return Err(ConfigError::TargetFile {
                path: path.display().to_string(),
                message: "no account ids found".to_string(),
            });
        }

        let targets = lines
            .into_iter()
            .map(|line| {
                AccountTarget::new(line.id, line.since.unwrap_or(default_since), end.clone())
            })
            .collect();

        Ok(Self {
            targets,
            source: TargetSource::File(path.to_path_buf()),
        })
    }

    pub fn targets(&self) -> &[AccountTarget] {
        &self.targets
    }

    pub fn source(&self) -> &TargetSource {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Persists an account's resume cursor
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The cursor was written to the target file
    /// * `Ok(false)` - In-memory list, or the id is no longer in the file
    /// * `Err(std::io::Error)` - The target file could not be rewritten
    pub async fn record_cursor(
        &self,
        target: &AccountTarget,
        nickname: &str,
        cursor: &ResumeCursor,
    ) -> std::io::Result<bool> {
        match &self.source {
            TargetSource::InMemory => Ok(false),
            TargetSource::File(path) => {
                update_target_file(path, &target.account_id, nickname, cursor.as_str()).await
            }
        }
    }
}
