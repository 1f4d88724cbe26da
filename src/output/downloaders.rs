//! Media downloaders selected by the `pic-download` and `video-download` flags

use crate::media::{avatar_file_name, MediaPipeline};
use crate::output::traits::{Downloader, SinkResult};
use crate::record::{AccountMetadata, MediaKind, MediaRef, Record, SavedMedia};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Pictures of the post itself, or of the post it reposts
pub struct PictureDownloader {
    name: &'static str,
    dir: PathBuf,
    retweet: bool,
}

impl PictureDownloader {
    /// Saves pictures of original posts under `<account-dir>/img/original`
    pub fn original(account_dir: &Path) -> Self {
        Self {
            name: "original_pictures",
            dir: account_dir.join("img").join("original"),
            retweet: false,
        }
    }

    /// Saves pictures of reposted posts under `<account-dir>/img/retweet`
    pub fn retweet(account_dir: &Path) -> Self {
        Self {
            name: "retweet_pictures",
            dir: account_dir.join("img").join("retweet"),
            retweet: true,
        }
    }

    fn wants(&self, media: &MediaRef) -> bool {
        media.kind == MediaKind::Image && media.retweet == self.retweet
    }
}

#[async_trait]
impl Downloader for PictureDownloader {
    fn name(&self) -> &str {
        self.name
    }

    async fn download(
        &self,
        records: &[Record],
        pipeline: &MediaPipeline,
    ) -> SinkResult<Vec<(String, SavedMedia)>> {
        Ok(pipeline
            .download_batch(records, &self.dir, |m| self.wants(m))
            .await)
    }
}

/// Post videos, saved as `.mp4` under `<account-dir>/video`
pub struct VideoDownloader {
    dir: PathBuf,
}

impl VideoDownloader {
    pub fn new(account_dir: &Path) -> Self {
        Self {
            dir: account_dir.join("video"),
        }
    }
}

#[async_trait]
impl Downloader for VideoDownloader {
    fn name(&self) -> &str {
        "video"
    }

    async fn download(
        &self,
        records: &[Record],
        pipeline: &MediaPipeline,
    ) -> SinkResult<Vec<(String, SavedMedia)>> {
        Ok(pipeline
            .download_batch(records, &self.dir, |m| m.kind == MediaKind::Video)
            .await)
    }
}

/// The account's profile picture; ignores post batches
pub struct AvatarDownloader {
    dir: PathBuf,
}

impl AvatarDownloader {
    pub fn new(account_dir: &Path) -> Self {
        Self {
            dir: account_dir.join("img").join("avatar"),
        }
    }
}

#[async_trait]
impl Downloader for AvatarDownloader {
    fn name(&self) -> &str {
        "avatar"
    }

    async fn download(
        &self,
        _records: &[Record],
        _pipeline: &MediaPipeline,
    ) -> SinkResult<Vec<(String, SavedMedia)>> {
        Ok(Vec::new())
    }

    async fn download_account(
        &self,
        user: &AccountMetadata,
        pipeline: &MediaPipeline,
    ) -> SinkResult<Vec<SavedMedia>> {
        let Some(url) = user.avatar_url.as_deref().filter(|u| !u.trim().is_empty()) else {
            return Ok(Vec::new());
        };

        let destination = self.dir.join(avatar_file_name(url));
        let outcome = pipeline.download_one(&user.id, url, &destination).await;
        if !outcome.succeeded {
            return Ok(Vec::new());
        }

        Ok(vec![SavedMedia {
            url: url.to_string(),
            path: outcome.local_path,
            kind: MediaKind::Avatar,
        }])
    }
}
