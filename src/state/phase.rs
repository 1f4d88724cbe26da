/// Crawl phase definitions for one account
///
/// This module defines the states an account's harvest moves through and
/// which moves between them are legal.
use std::fmt;

/// Represents where one account's harvest currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// Nothing fetched yet
    Idle,

    /// Resolving the real account id and fetching profile metadata
    FetchingIndex,

    /// Walking the listing pages in ascending order
    Paginating,

    /// Sleeping out a global cooldown between two pages
    Cooldown,

    /// Finished, skipped, or stopped by the decoder
    Done,
}

impl CrawlPhase {
    /// Returns true if no further work happens in this phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true if `next` is a legal successor of this phase
    ///
    /// `FetchingIndex -> Done` covers an account whose window starts in the
    /// future.
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::FetchingIndex)
                | (Self::Idle, Self::Done)
                | (Self::FetchingIndex, Self::Paginating)
                | (Self::FetchingIndex, Self::Done)
                | (Self::Paginating, Self::Cooldown)
                | (Self::Paginating, Self::Done)
                | (Self::Cooldown, Self::Paginating)
                | (Self::Cooldown, Self::Done)
        )
    }

    /// Short lowercase name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FetchingIndex => "fetching_index",
            Self::Paginating => "paginating",
            Self::Cooldown => "cooldown",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
