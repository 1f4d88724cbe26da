//! Weibo-Harvest: an incremental, polite feed harvester
//!
//! This crate paginates the post listing of a configured set of accounts,
//! paces itself with randomized jitter and rotating cooldowns, de-duplicates
//! posts within a run, fans each batch out to writers and media downloaders,
//! and records a per-account resume cursor so the next run picks up where
//! this one stopped.

pub mod config;
pub mod crawler;
pub mod dates;
pub mod decoder;
pub mod media;
pub mod output;
pub mod record;
pub mod state;
pub mod storage;
pub mod targets;

use thiserror::Error;

/// Main error type for Weibo-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Not logged in while fetching {url}: the cookie is missing, wrong or expired")]
    NotLoggedIn { url: String },

    #[error("Gave up on {url} after {attempts} attempts")]
    FetchExhausted { url: String, attempts: u32 },

    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Invalid crawl phase transition: {from} -> {to}")]
    InvalidTransition {
        from: state::CrawlPhase,
        to: state::CrawlPhase,
    },

    #[error("Sink error: {0}")]
    Sink(String),
}

impl HarvestError {
    /// Returns true if this error must terminate the whole run
    ///
    /// Everything else is absorbed at the account boundary.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NotLoggedIn { .. } | Self::Config(_))
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid date '{0}': expected YYYY-MM-DD or YYYY-MM-DD HH:MM")]
    InvalidDate(String),

    #[error("Target list {path}: {message}")]
    TargetFile { path: String, message: String },
}

/// Result type alias for Weibo-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

// Re-export commonly used types
pub use config::Config;
pub use record::{AccountMetadata, MediaKind, MediaRef, Record};
pub use state::{CrawlPhase, CrawlState, ResumeCursor};
pub use targets::{AccountTarget, TargetList};
