//! Per-account crawl state
//!
//! Owned by exactly one scheduler invocation and dropped when the account
//! reaches `Done`.

use crate::record::Record;
use crate::state::CrawlPhase;
use crate::HarvestError;
use std::collections::HashSet;

/// Mutable state of one account's harvest
#[derive(Debug, Clone)]
pub struct CrawlState {
    phase: CrawlPhase,

    /// Listing page about to be fetched, 1-based
    pub page_cursor: u64,

    /// Pages fetched since the last cooldown fired
    ///
    /// Starts from the value carried over from the previous account, so the
    /// cooldown budget spans accounts.
    pub pages_since_cooldown: u64,

    seen_record_ids: HashSet<String>,
}

impl CrawlState {
    /// Creates the state for a fresh account
    ///
    /// # Arguments
    ///
    /// * `carried_pages` - Pages counted since the last cooldown, from earlier accounts
    pub fn new(carried_pages: u64) -> Self {
        Self {
            phase: CrawlPhase::Idle,
            page_cursor: 1,
            pages_since_cooldown: carried_pages,
            seen_record_ids: HashSet::new(),
        }
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    /// Moves to `next`, rejecting moves the state machine does not allow
    pub fn transition(&mut self, next: CrawlPhase) -> Result<(), HarvestError> {
        if !self.phase.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        tracing::debug!("Crawl phase {} -> {}", self.phase, next);
        self.phase = next;
        Ok(())
    }

    /// Counts one fetched page (index or listing) toward the cooldown budget
    pub fn count_page(&mut self) {
        self.pages_since_cooldown += 1;
    }

    pub fn reset_cooldown_counter(&mut self) {
        self.pages_since_cooldown = 0;
    }

    /// Filters out records already emitted earlier in this run
    ///
    /// # Returns
    ///
    /// The records seen for the first time, in input order, and the number
    /// of duplicates dropped.
    pub fn admit(&mut self, records: Vec<Record>) -> (Vec<Record>, usize) {
        let total = records.len();
        let fresh: Vec<Record> = records
            .into_iter()
            .filter(|r| self.seen_record_ids.insert(r.id.clone()))
            .collect();
        let dropped = total - fresh.len();
        (fresh, dropped)
    }

    pub fn seen_count(&self) -> usize {
        self.seen_record_ids.len()
    }
}
