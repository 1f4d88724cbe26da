//! Storage traits and error types

use crate::record::{AccountMetadata, Record};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage backend for harvested accounts and posts
///
/// Writes are upserts: storing the same account or post twice keeps one row
/// holding the latest values.
pub trait Storage: Send {
    /// Inserts or replaces an account profile
    ///
    /// # Arguments
    ///
    /// * `user` - The resolved account metadata
    fn upsert_user(&mut self, user: &AccountMetadata) -> StorageResult<()>;

    /// Inserts or replaces a batch of posts in one transaction
    ///
    /// # Arguments
    ///
    /// * `records` - Posts to store
    ///
    /// # Returns
    ///
    /// The number of rows written
    fn upsert_records(&mut self, records: &[Record]) -> StorageResult<usize>;

    /// Loads a stored account profile
    fn get_user(&self, id: &str) -> StorageResult<Option<AccountMetadata>>;

    /// Counts the posts stored for an account
    fn count_records(&self, user_id: &str) -> StorageResult<u64>;
}
