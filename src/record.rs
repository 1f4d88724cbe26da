//! Harvested data: posts, their media references, and account metadata

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Sentinel a decoder stores in place of a media URL list when a post has none
pub const NO_MEDIA: &str = "无";

/// Kind of media a reference points to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Avatar,
}

/// A reference from a post to remote media
///
/// `url` may hold several comma-joined URLs forming one group, or the
/// [`NO_MEDIA`] sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    pub kind: MediaKind,
    /// Media belongs to the reposted post rather than the post itself
    #[serde(default)]
    pub retweet: bool,
}

impl MediaRef {
    pub fn new(url: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            url: url.into(),
            kind,
            retweet: false,
        }
    }

    /// Marks the reference as belonging to a reposted post
    pub fn from_retweet(mut self) -> Self {
        self.retweet = true;
        self
    }

    /// True when the reference carries the "no media" sentinel or nothing at all
    pub fn is_placeholder(&self) -> bool {
        let url = self.url.trim();
        url.is_empty() || url == NO_MEDIA
    }

    /// Splits a comma-joined group into its individual URLs
    pub fn urls(&self) -> Vec<&str> {
        if self.is_placeholder() {
            return Vec::new();
        }
        self.url
            .split(',')
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .collect()
    }
}

/// A media file that reached local disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedMedia {
    pub url: String,
    pub path: PathBuf,
    pub kind: MediaKind,
}

/// One harvested post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub publish_time: NaiveDateTime,
    /// True for original posts, false for reposts
    pub original: bool,
    #[serde(default)]
    pub publish_place: String,
    #[serde(default)]
    pub publish_tool: String,
    #[serde(default)]
    pub up_num: u64,
    #[serde(default)]
    pub retweet_num: u64,
    #[serde(default)]
    pub comment_num: u64,
    #[serde(default)]
    pub media_refs: Vec<MediaRef>,
    /// Filled in by downloaders before writers see the record
    #[serde(default)]
    pub saved_media: Vec<SavedMedia>,
}

impl Record {
    /// Creates a record with no counters, place, tool or media
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        content: impl Into<String>,
        publish_time: NaiveDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            content: content.into(),
            publish_time,
            original: true,
            publish_place: String::new(),
            publish_tool: String::new(),
            up_num: 0,
            retweet_num: 0,
            comment_num: 0,
            media_refs: Vec::new(),
            saved_media: Vec::new(),
        }
    }

    /// `yyyymmdd_<id>`, the stem shared by every media file of this post
    pub fn file_prefix(&self) -> String {
        format!("{}_{}", self.publish_time.format("%Y%m%d"), self.id)
    }
}

/// Account profile as resolved from the index and info pages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMetadata {
    /// The real numeric id; the configured id may be a vanity alias
    pub id: String,
    pub nickname: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub birthday: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub verified_reason: String,
    #[serde(default)]
    pub talent: String,
    #[serde(default)]
    pub education: String,
    #[serde(default)]
    pub work: String,
    pub post_count: u64,
    pub following: u64,
    pub followers: u64,
    #[serde(default)]
    pub avatar_url: Option<String>,
}
