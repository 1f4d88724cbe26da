//! Decoding fetched pages into profiles and posts
//!
//! The crawler never looks at markup itself. It hands raw page content to a
//! decoder and acts on what comes back:
//! - `Err(DecodeError::Malformed)` fails the liveness check and is retried
//! - `Err(DecodeError::NotLoggedIn)` ends the run
//! - an empty batch is a valid answer, not a failure

mod time;
mod weibo_cn;

pub use time::parse_publish_time;
pub use weibo_cn::WeiboCnDecoder;

use crate::record::{AccountMetadata, Record};
use chrono::NaiveDateTime;
use thiserror::Error;

/// Errors a decoder can report
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The expected content markers are missing
    #[error("page is missing expected content: {0}")]
    Malformed(String),

    /// The site served its login wall instead of content
    #[error("login page returned instead of content")]
    NotLoggedIn,
}

/// What the index (profile) page tells us about an account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexPage {
    /// Real numeric id, which may differ from a configured alias
    pub resolved_id: String,
    pub post_count: u64,
    pub following: u64,
    pub followers: u64,
    /// Number of listing pages, at least 1
    pub page_count: u64,
    pub avatar_url: Option<String>,
}

/// Everything a page decoder needs to know besides the raw content
#[derive(Debug, Clone)]
pub struct PageContext {
    /// Resolved account id
    pub account_id: String,
    pub page: u64,
    pub since_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    /// Drop reposts
    pub original_only: bool,
    /// Reference time for relative timestamps
    pub now: NaiveDateTime,
}

/// One decoded listing page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedBatch {
    pub records: Vec<Record>,
    /// False once the since-date boundary has been crossed
    pub continue_paging: bool,
}

impl DecodedBatch {
    pub fn new(records: Vec<Record>, continue_paging: bool) -> Self {
        Self {
            records,
            continue_paging,
        }
    }
}

/// Resolves accounts and their profile metadata
pub trait ProfileDecoder: Send + Sync {
    /// Decodes the index page of `configured_id`
    fn decode_index(&self, raw: &str, configured_id: &str) -> Result<IndexPage, DecodeError>;

    /// Fills nickname and profile fields from the info page
    fn decode_info(&self, raw: &str, metadata: &mut AccountMetadata) -> Result<(), DecodeError>;
}

/// Turns a listing page into posts and a continue/stop signal
pub trait PageDecoder: Send + Sync {
    fn decode_page(&self, raw: &str, ctx: &PageContext) -> Result<DecodedBatch, DecodeError>;
}

/// A decoder for every page kind the crawler fetches
pub trait FeedDecoder: ProfileDecoder + PageDecoder {}

impl<T: ProfileDecoder + PageDecoder> FeedDecoder for T {}
