//! Sink traits and error types
//!
//! Writers persist records and account metadata; downloaders fetch the media
//! a record references. Both are named so the registry can select them from
//! configuration and so failures can be logged against a sink.

use crate::media::MediaPipeline;
use crate::record::{AccountMetadata, Record, SavedMedia};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur inside a sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} answered {status}")]
    Rejected { url: String, status: u16 },

    #[error("Unknown sink: {0}")]
    UnknownSink(String),
}

impl From<crate::storage::StorageError> for SinkError {
    fn from(e: crate::storage::StorageError) -> Self {
        Self::Storage(e.to_string())
    }
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Persists harvested data for one account
#[async_trait]
pub trait Writer: Send + Sync {
    /// Registry name, as used in `write-mode`
    fn name(&self) -> &str;

    /// Records the account profile
    ///
    /// # Arguments
    ///
    /// * `user` - Metadata resolved from the index and info pages
    async fn write_account(&self, user: &AccountMetadata) -> SinkResult<()>;

    /// Records one batch of posts
    ///
    /// # Arguments
    ///
    /// * `records` - Posts with `saved_media` already attached
    async fn write_records(&self, records: &[Record]) -> SinkResult<()>;
}

/// Fetches media referenced by records or by the account profile
#[async_trait]
pub trait Downloader: Send + Sync {
    fn name(&self) -> &str;

    /// Downloads the media this downloader selects from a batch
    ///
    /// # Returns
    ///
    /// `(record id, saved media)` for every file now on disk.
    async fn download(
        &self,
        records: &[Record],
        pipeline: &MediaPipeline,
    ) -> SinkResult<Vec<(String, SavedMedia)>>;

    /// Downloads media attached to the account itself
    async fn download_account(
        &self,
        _user: &AccountMetadata,
        _pipeline: &MediaPipeline,
    ) -> SinkResult<Vec<SavedMedia>> {
        Ok(Vec::new())
    }
}
