//! Per-account reports and the run summary

use crate::record::AccountMetadata;
use crate::state::ResumeCursor;
use crate::HarvestError;
use chrono::{DateTime, Utc};

/// Counters for one harvested account
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountReport {
    /// The id as configured, which may be an alias
    pub account_id: String,
    pub metadata: AccountMetadata,
    /// Pages counted toward pacing, the index fetch included
    pub pages_fetched: u64,
    /// Listing pages that exhausted their retries
    pub pages_skipped: u64,
    pub records_emitted: u64,
    pub duplicates_dropped: u64,
    pub jitter_pauses: u64,
    pub cooldowns: u64,
    pub media_saved: u64,
    pub sink_failures: u64,
    /// Absent when the account was skipped because its window had not opened
    pub cursor: Option<ResumeCursor>,
}

impl AccountReport {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            ..Default::default()
        }
    }
}

/// Result of one account: a report, or the error that ended it
pub type AccountOutcome = Result<AccountReport, HarvestError>;

/// Everything a run did, account by account
#[derive(Debug)]
pub struct RunSummary {
    pub config_hash: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub accounts: Vec<(String, AccountOutcome)>,
}

impl RunSummary {
    pub fn new(config_hash: impl Into<String>) -> Self {
        Self {
            config_hash: config_hash.into(),
            started_at: Utc::now(),
            finished_at: None,
            accounts: Vec::new(),
        }
    }

    pub fn push(&mut self, account_id: impl Into<String>, outcome: AccountOutcome) {
        self.accounts.push((account_id.into(), outcome));
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Reports of accounts that completed
    pub fn reports(&self) -> impl Iterator<Item = &AccountReport> {
        self.accounts.iter().filter_map(|(_, o)| o.as_ref().ok())
    }

    pub fn failed_count(&self) -> usize {
        self.accounts.iter().filter(|(_, o)| o.is_err()).count()
    }

    pub fn total_records(&self) -> u64 {
        self.reports().map(|r| r.records_emitted).sum()
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_seconds())
    }
}

/// Prints the summary to stdout in a formatted manner
///
/// # Arguments
///
/// * `summary` - The run summary to display
pub fn print_summary(summary: &RunSummary) {
    println!("=== Harvest Summary ===\n");

    println!("Config hash: {}", summary.config_hash);
    println!("Started:     {}", summary.started_at.to_rfc3339());
    if let Some(finished) = summary.finished_at {
        println!("Finished:    {}", finished.to_rfc3339());
    }
    if let Some(duration) = summary.duration_seconds() {
        println!("Duration:    {}s", duration);
    }
    println!();

    println!(
        "{:<14} {:<20} {:>6} {:>6} {:>8} {:>6} {:>6} {:>6}  {}",
        "account", "nickname", "pages", "skip", "posts", "dups", "media", "fails", "cursor"
    );
    for (account_id, outcome) in &summary.accounts {
        match outcome {
            Ok(report) => println!(
                "{:<14} {:<20} {:>6} {:>6} {:>8} {:>6} {:>6} {:>6}  {}",
                account_id,
                report.metadata.nickname,
                report.pages_fetched,
                report.pages_skipped,
                report.records_emitted,
                report.duplicates_dropped,
                report.media_saved,
                report.sink_failures,
                report
                    .cursor
                    .as_ref()
                    .map(|c| c.as_str().to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Err(e) => println!("{:<14} FAILED: {}", account_id, e),
        }
    }
    println!();

    println!(
        "Accounts: {} ok, {} failed; {} posts",
        summary.accounts.len() - summary.failed_count(),
        summary.failed_count(),
        summary.total_records()
    );
}
