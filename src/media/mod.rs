//! Media download pipeline
//!
//! Downloads are at-most-once per destination path: a file already on disk
//! is never fetched again, a finished transfer is written to a temp file and
//! renamed into place, and a transfer that keeps failing is written to the
//! failure ledger instead of raising.

mod ledger;
mod naming;

pub use ledger::{FailureLedger, LEDGER_FILE};
pub use naming::{
    avatar_file_name, group_file_names, infer_suffix, trailing_segment, DEFAULT_IMAGE_SUFFIX,
    MAX_GROUP_SUFFIX_LEN, MAX_SINGLE_SUFFIX_LEN, VIDEO_SUFFIX,
};

use crate::record::{MediaKind, MediaRef, Record, SavedMedia};
use rand::Rng;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bounds of the randomized pause before each transfer (milliseconds)
pub const PRE_DOWNLOAD_DELAY_MS: (u64, u64) = (500, 1500);

/// Retry and timeout settings for media transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadSettings {
    /// Extra attempts after the first one
    pub retries: u32,
    pub connect_timeout: Duration,
    pub total_timeout: Duration,
}

impl DownloadSettings {
    /// Reads `[retries, connect-seconds, total-seconds]`
    pub fn from_config(values: [u64; 3]) -> Self {
        let [retries, connect, total] = values;
        Self {
            retries: retries.min(u32::MAX as u64) as u32,
            connect_timeout: Duration::from_secs(connect),
            total_timeout: Duration::from_secs(total),
        }
    }
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self::from_config([5, 5, 10])
    }
}

/// Result of one download; failures are described, never raised
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub succeeded: bool,
    pub local_path: PathBuf,
}

/// Downloads media files for one account directory
#[derive(Debug, Clone)]
pub struct MediaPipeline {
    client: Client,
    settings: DownloadSettings,
    ledger: FailureLedger,
    pre_delay_ms: Option<(u64, u64)>,
}

impl MediaPipeline {
    /// Creates a pipeline whose failure ledger lives in `ledger_root`
    ///
    /// # Arguments
    ///
    /// * `settings` - Retry count and timeouts
    /// * `ledger_root` - Directory holding `not_downloaded.txt`
    ///
    /// # Returns
    ///
    /// * `Ok(MediaPipeline)` - Ready to download
    /// * `Err(reqwest::Error)` - Failed to build the HTTP client
    pub fn new(settings: DownloadSettings, ledger_root: &Path) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .gzip(true)
            .build()?;
        Ok(Self {
            client,
            settings,
            ledger: FailureLedger::in_dir(ledger_root),
            pre_delay_ms: Some(PRE_DOWNLOAD_DELAY_MS),
        })
    }

    /// Skips the randomized pre-download pause
    pub fn without_pre_delay(mut self) -> Self {
        self.pre_delay_ms = None;
        self
    }

    pub fn ledger(&self) -> &FailureLedger {
        &self.ledger
    }

    /// Downloads one URL to `destination`
    ///
    /// An existing file counts as already downloaded and costs no request.
    pub async fn download_one(&self, record_id: &str, url: &str, destination: &Path) -> DownloadOutcome {
        let outcome = |succeeded| DownloadOutcome {
            succeeded,
            local_path: destination.to_path_buf(),
        };

        if is_file(destination).await {
            tracing::debug!("Already downloaded: {}", destination.display());
            return outcome(true);
        }

        if let Some((min, max)) = self.pre_delay_ms {
            let delay = rand::thread_rng().gen_range(min..=max);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        match self.transfer(url, destination).await {
            Ok(true) => outcome(true),
            Ok(false) => {
                self.record_failure(record_id, url, destination).await;
                outcome(false)
            }
            Err(e) => {
                tracing::warn!("Download of {} failed: {}", url, e);
                self.record_failure(record_id, url, destination).await;
                outcome(false)
            }
        }
    }

    /// Tries the transfer `1 + retries` times, writing the first success
    async fn transfer(&self, url: &str, destination: &Path) -> std::io::Result<bool> {
        for attempt in 0..=self.settings.retries {
            let response = match self
                .client
                .get(url)
                .timeout(self.settings.total_timeout)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    tracing::debug!("Attempt {} for {}: {}", attempt + 1, url, e);
                    continue;
                }
            };

            if !response.status().is_success() {
                tracing::debug!("Attempt {} for {}: HTTP {}", attempt + 1, url, response.status());
                continue;
            }

            match response.bytes().await {
                Ok(body) => {
                    write_atomic(destination, &body).await?;
                    return Ok(true);
                }
                Err(e) => tracing::debug!("Attempt {} for {}: {}", attempt + 1, url, e),
            }
        }
        Ok(false)
    }

    async fn record_failure(&self, record_id: &str, url: &str, destination: &Path) {
        tracing::warn!(
            "Giving up on {} for post {}, noted in {}",
            url,
            record_id,
            self.ledger.path().display()
        );
        if let Err(e) = self.ledger.append(record_id, destination, url).await {
            tracing::error!("Failed to write download ledger: {}", e);
        }
    }

    /// Downloads every selected media group of a batch into `dir`
    ///
    /// Groups carrying the "no media" sentinel are skipped. Images take their
    /// suffix from the URL; videos are always saved as `.mp4`.
    ///
    /// # Returns
    ///
    /// `(record id, saved media)` for every file now on disk.
    pub async fn download_batch<F>(&self, records: &[Record], dir: &Path, wants: F) -> Vec<(String, SavedMedia)>
    where
        F: Fn(&MediaRef) -> bool,
    {
        let mut saved = Vec::new();

        for record in records {
            for media in record.media_refs.iter().filter(|m| wants(m)) {
                if media.is_placeholder() {
                    continue;
                }
                let urls = media.urls();
                let fixed_suffix = match media.kind {
                    MediaKind::Video => Some(VIDEO_SUFFIX),
                    MediaKind::Image | MediaKind::Avatar => None,
                };
                let names = group_file_names(&record.file_prefix(), &urls, fixed_suffix);

                for (url, name) in urls.iter().zip(names) {
                    let outcome = self.download_one(&record.id, url, &dir.join(name)).await;
                    if outcome.succeeded {
                        saved.push((
                            record.id.clone(),
                            SavedMedia {
                                url: url.to_string(),
                                path: outcome.local_path,
                                kind: media.kind,
                            },
                        ));
                    }
                }
            }
        }

        saved
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Writes to a sibling temp file, then renames it into place
///
/// On failure the temp file is removed and the destination is untouched.
pub(crate) async fn write_atomic(destination: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = destination.as_os_str().to_owned();
    tmp.push(".part");
    let tmp = PathBuf::from(tmp);

    let result = match tokio::fs::write(&tmp, bytes).await {
        Ok(()) => tokio::fs::rename(&tmp, destination).await,
        Err(e) => Err(e),
    };
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(&tmp).await {
            tracing::debug!("Could not remove {}: {}", tmp.display(), e);
        }
    }
    result
}
