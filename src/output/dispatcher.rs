//! Fan-out of each batch to downloaders, then writers
//!
//! Downloaders run first so that writers see local media paths on every
//! record. A failing sink is logged and counted; it never stops the others
//! or the harvest.

use crate::config::Config;
use crate::media::{DownloadSettings, MediaPipeline};
use crate::output::registry::{account_dir, select_downloaders, SinkContext, SinkRegistry};
use crate::output::traits::{Downloader, SinkResult, Writer};
use crate::record::{AccountMetadata, Record, SavedMedia};
use std::path::{Path, PathBuf};

/// What one dispatch achieved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub media_saved: usize,
    pub sink_failures: usize,
}

/// The sinks serving one account
pub struct SinkDispatcher {
    account_dir: PathBuf,
    writers: Vec<Box<dyn Writer>>,
    downloaders: Vec<Box<dyn Downloader>>,
    pipeline: MediaPipeline,
}

impl SinkDispatcher {
    pub fn new(
        account_dir: impl Into<PathBuf>,
        writers: Vec<Box<dyn Writer>>,
        downloaders: Vec<Box<dyn Downloader>>,
        pipeline: MediaPipeline,
    ) -> Self {
        Self {
            account_dir: account_dir.into(),
            writers,
            downloaders,
            pipeline,
        }
    }

    /// Resolves the configured sinks for one account
    ///
    /// # Arguments
    ///
    /// * `registry` - Writer factories
    /// * `config` - Output and download settings
    /// * `user` - The account, which decides the result directory
    /// * `media_pre_delay` - Whether to pause randomly before each media transfer
    pub fn for_account(
        registry: &SinkRegistry,
        config: &Config,
        user: &AccountMetadata,
        media_pre_delay: bool,
    ) -> SinkResult<Self> {
        let dir = account_dir(&config.output, user);
        let ctx = SinkContext {
            account_dir: &dir,
            user,
        };
        let writers = registry.resolve_writers(&config.output.write_mode, &ctx)?;
        let downloaders = select_downloaders(&config.output, config.crawler.filter, &dir);

        let settings = DownloadSettings::from_config(config.output.file_download_timeout);
        let mut pipeline = MediaPipeline::new(settings, &dir)?;
        if !media_pre_delay {
            pipeline = pipeline.without_pre_delay();
        }

        let dispatcher = Self::new(dir, writers, downloaders, pipeline);
        tracing::debug!(
            "Sinks for {}: writers [{}], downloaders [{}]",
            user.id,
            dispatcher.writer_names().join(", "),
            dispatcher.downloader_names().join(", ")
        );
        Ok(dispatcher)
    }

    pub fn account_dir(&self) -> &Path {
        &self.account_dir
    }

    pub fn writer_names(&self) -> Vec<&str> {
        self.writers.iter().map(|w| w.name()).collect()
    }

    pub fn downloader_names(&self) -> Vec<&str> {
        self.downloaders.iter().map(|d| d.name()).collect()
    }

    /// Hands the account profile to every sink
    pub async fn dispatch_account(&self, user: &AccountMetadata) -> DispatchReport {
        let mut report = DispatchReport::default();

        for downloader in &self.downloaders {
            match downloader.download_account(user, &self.pipeline).await {
                Ok(saved) => report.media_saved += saved.len(),
                Err(e) => {
                    tracing::warn!("Sink {} failed on account {}: {}", downloader.name(), user.id, e);
                    report.sink_failures += 1;
                }
            }
        }

        for writer in &self.writers {
            if let Err(e) = writer.write_account(user).await {
                tracing::warn!("Sink {} failed on account {}: {}", writer.name(), user.id, e);
                report.sink_failures += 1;
            }
        }

        report
    }

    /// Hands one batch to every downloader, then to every writer
    pub async fn dispatch(&self, mut records: Vec<Record>) -> DispatchReport {
        let mut report = DispatchReport::default();
        if records.is_empty() {
            return report;
        }

        for downloader in &self.downloaders {
            match downloader.download(&records, &self.pipeline).await {
                Ok(saved) => {
                    report.media_saved += saved.len();
                    attach_saved_media(&mut records, saved);
                }
                Err(e) => {
                    tracing::warn!("Sink {} failed on a batch of {}: {}", downloader.name(), records.len(), e);
                    report.sink_failures += 1;
                }
            }
        }

        for writer in &self.writers {
            if let Err(e) = writer.write_records(&records).await {
                tracing::warn!("Sink {} failed on a batch of {}: {}", writer.name(), records.len(), e);
                report.sink_failures += 1;
            }
        }

        report
    }
}

fn attach_saved_media(records: &mut [Record], saved: Vec<(String, SavedMedia)>) {
    for (record_id, media) in saved {
        if let Some(record) = records.iter_mut().find(|r| r.id == record_id) {
            record.saved_media.push(media);
        }
    }
}
