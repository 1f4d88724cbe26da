//! SQLite-backed writer
//!
//! This writer records accounts and posts directly to the storage backend.
//! One storage handle is shared by every account of a run.

use crate::output::traits::{SinkResult, Writer};
use crate::record::{AccountMetadata, Record};
use crate::storage::{Storage, StorageError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// SQLite-based writer
pub struct SqliteWriter {
    storage: Arc<Mutex<dyn Storage>>,
}

impl SqliteWriter {
    /// Creates a new SQLite writer
    ///
    /// # Arguments
    ///
    /// * `storage` - The storage backend to use
    ///
    /// # Returns
    ///
    /// A new SqliteWriter instance
    pub fn new(storage: Arc<Mutex<dyn Storage>>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl Writer for SqliteWriter {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn write_account(&self, user: &AccountMetadata) -> SinkResult<()> {
        let mut storage = self
            .storage
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?;
        storage.upsert_user(user)?;
        Ok(())
    }

    async fn write_records(&self, records: &[Record]) -> SinkResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut storage = self
            .storage
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?;
        let written = storage.upsert_records(records)?;
        tracing::debug!("{} posts written to sqlite", written);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::traits::SinkError;
    use crate::storage::SqliteStorage;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_sqlite_writer() {
        let storage: Arc<Mutex<dyn Storage>> =
            Arc::new(Mutex::new(SqliteStorage::new_in_memory().unwrap()));
        let writer = SqliteWriter::new(storage.clone());

        let user = AccountMetadata {
            id: "8".to_string(),
            nickname: "db".to_string(),
            ..Default::default()
        };
        let time = NaiveDate::from_ymd_opt(2024, 2, 2)
            .unwrap()
            .and_hms_opt(2, 2, 0)
            .unwrap();

        writer.write_account(&user).await.unwrap();
        writer
            .write_records(&[
                Record::new("x", "8", "one", time),
                Record::new("y", "8", "two", time),
            ])
            .await
            .unwrap();
        writer
            .write_records(&[Record::new("x", "8", "one again", time)])
            .await
            .unwrap();

        let storage = storage.lock().unwrap();
        assert_eq!(storage.count_records("8").unwrap(), 2);
        assert_eq!(storage.get_user("8").unwrap().unwrap().nickname, "db");
    }

    #[tokio::test]
    async fn test_poisoned_storage_lock_reported() {
        let storage: Arc<Mutex<dyn Storage>> =
            Arc::new(Mutex::new(SqliteStorage::new_in_memory().unwrap()));
        let held = storage.clone();
        let _ = std::thread::spawn(move || {
            let _guard = held.lock().unwrap();
            panic!("writer thread died holding the lock");
        })
        .join();

        let writer = SqliteWriter::new(storage);
        let err = writer
            .write_account(&AccountMetadata::default())
            .await
            .unwrap_err();
        match err {
            SinkError::Storage(msg) => assert_eq!(msg, "Storage lock poisoned"),
            other => panic!("unexpected error: {}", other),
        }
    }
}
