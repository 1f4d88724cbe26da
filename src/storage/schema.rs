//! Database schema definitions

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per harvested account
CREATE TABLE IF NOT EXISTS user (
    id TEXT PRIMARY KEY,
    nickname TEXT NOT NULL,
    gender TEXT,
    location TEXT,
    birthday TEXT,
    description TEXT,
    verified_reason TEXT,
    talent TEXT,
    education TEXT,
    work TEXT,
    weibo_num INTEGER NOT NULL DEFAULT 0,
    following INTEGER NOT NULL DEFAULT 0,
    followers INTEGER NOT NULL DEFAULT 0,
    avatar_url TEXT,
    updated_at TEXT NOT NULL
);

-- One row per post
CREATE TABLE IF NOT EXISTS weibo (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    content TEXT NOT NULL,
    original INTEGER NOT NULL,
    original_pictures TEXT,
    retweet_pictures TEXT,
    video_url TEXT,
    publish_place TEXT,
    publish_time TEXT NOT NULL,
    publish_tool TEXT,
    up_num INTEGER NOT NULL DEFAULT 0,
    retweet_num INTEGER NOT NULL DEFAULT 0,
    comment_num INTEGER NOT NULL DEFAULT 0,
    saved_media TEXT,
    harvested_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_weibo_user ON weibo(user_id);
CREATE INDEX IF NOT EXISTS idx_weibo_publish_time ON weibo(publish_time);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)
}
