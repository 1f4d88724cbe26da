//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::record::{AccountMetadata, MediaKind, Record};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

/// Comma-joined URLs of one media kind, split by whether they belong to a repost
fn joined_media(record: &Record, kind: MediaKind, retweet: bool) -> String {
    record
        .media_refs
        .iter()
        .filter(|m| m.kind == kind && m.retweet == retweet && !m.is_placeholder())
        .map(|m| m.url.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

impl Storage for SqliteStorage {
    fn upsert_user(&mut self, user: &AccountMetadata) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO user (id, nickname, gender, location, birthday, description,
                               verified_reason, talent, education, work, weibo_num,
                               following, followers, avatar_url, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
             ON CONFLICT(id) DO UPDATE SET
                nickname = excluded.nickname,
                gender = excluded.gender,
                location = excluded.location,
                birthday = excluded.birthday,
                description = excluded.description,
                verified_reason = excluded.verified_reason,
                talent = excluded.talent,
                education = excluded.education,
                work = excluded.work,
                weibo_num = excluded.weibo_num,
                following = excluded.following,
                followers = excluded.followers,
                avatar_url = excluded.avatar_url,
                updated_at = excluded.updated_at",
            params![
                user.id,
                user.nickname,
                user.gender,
                user.location,
                user.birthday,
                user.description,
                user.verified_reason,
                user.talent,
                user.education,
                user.work,
                user.post_count as i64,
                user.following as i64,
                user.followers as i64,
                user.avatar_url,
                now
            ],
        )?;
        Ok(())
    }

    fn upsert_records(&mut self, records: &[Record]) -> StorageResult<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO weibo (id, user_id, content, original, original_pictures,
                                               retweet_pictures, video_url, publish_place,
                                               publish_time, publish_tool, up_num, retweet_num,
                                               comment_num, saved_media, harvested_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            )?;

            for record in records {
                let saved_media = serde_json::to_string(&record.saved_media)
                    .unwrap_or_else(|_| "[]".to_string());
                stmt.execute(params![
                    record.id,
                    record.user_id,
                    record.content,
                    record.original,
                    joined_media(record, MediaKind::Image, false),
                    joined_media(record, MediaKind::Image, true),
                    joined_media(record, MediaKind::Video, false),
                    record.publish_place,
                    record.publish_time.format("%Y-%m-%d %H:%M").to_string(),
                    record.publish_tool,
                    record.up_num as i64,
                    record.retweet_num as i64,
                    record.comment_num as i64,
                    saved_media,
                    now
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    fn get_user(&self, id: &str) -> StorageResult<Option<AccountMetadata>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, nickname, gender, location, birthday, description, verified_reason,
                        talent, education, work, weibo_num, following, followers, avatar_url
                 FROM user WHERE id = ?1",
                params![id],
                |row| {
                    Ok(AccountMetadata {
                        id: row.get(0)?,
                        nickname: row.get(1)?,
                        gender: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                        location: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                        birthday: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                        description: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                        verified_reason: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                        talent: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
                        education: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
                        work: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
                        post_count: row.get::<_, i64>(10)? as u64,
                        following: row.get::<_, i64>(11)? as u64,
                        followers: row.get::<_, i64>(12)? as u64,
                        avatar_url: row.get(13)?,
                    })
                },
            )
            .optional()?;

        Ok(user)
    }

    fn count_records(&self, user_id: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM weibo WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
