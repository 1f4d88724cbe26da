//! Named writer factories and downloader selection
//!
//! Writers are looked up by the names listed in `write-mode`. Downloaders are
//! not named in configuration; they follow from the download flags.

use crate::config::{Config, OutputConfig, ResultDirName};
use crate::output::csv_writer::CsvWriter;
use crate::output::downloaders::{AvatarDownloader, PictureDownloader, VideoDownloader};
use crate::output::json_writer::JsonWriter;
use crate::output::post_writer::{build_post_client, PostWriter};
use crate::output::sqlite_output::SqliteWriter;
use crate::output::traits::{Downloader, SinkError, SinkResult, Writer};
use crate::output::txt_writer::TxtWriter;
use crate::record::AccountMetadata;
use crate::storage::{open_storage, Storage};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Writer names accepted in `write-mode`
pub const KNOWN_WRITERS: &[&str] = &["txt", "csv", "json", "sqlite", "post"];

/// Database file used when `sqlite` is selected without a `[sqlite]` section
pub const DEFAULT_SQLITE_FILE: &str = "weibodata.db";

/// What a writer factory knows about the account it writes for
#[derive(Debug, Clone, Copy)]
pub struct SinkContext<'a> {
    pub account_dir: &'a Path,
    pub user: &'a AccountMetadata,
}

/// Builds one writer for one account
pub type WriterFactory =
    Box<dyn Fn(&SinkContext<'_>) -> SinkResult<Box<dyn Writer>> + Send + Sync>;

/// Registry of writer factories keyed by name
#[derive(Default)]
pub struct SinkRegistry {
    writers: BTreeMap<String, WriterFactory>,
}

impl SinkRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `txt`, `csv` and `json`, and `sqlite` when a storage handle is given
    pub fn with_defaults(storage: Option<Arc<Mutex<dyn Storage>>>) -> Self {
        let mut registry = Self::new();
        registry.register_writer("txt", |ctx| {
            Ok(Box::new(TxtWriter::new(ctx.account_dir, ctx.user)) as Box<dyn Writer>)
        });
        registry.register_writer("csv", |ctx| {
            Ok(Box::new(CsvWriter::new(ctx.account_dir, ctx.user)) as Box<dyn Writer>)
        });
        registry.register_writer("json", |ctx| {
            Ok(Box::new(JsonWriter::new(ctx.account_dir, ctx.user)) as Box<dyn Writer>)
        });
        if let Some(storage) = storage {
            registry.register_writer("sqlite", move |_| {
                Ok(Box::new(SqliteWriter::new(storage.clone())) as Box<dyn Writer>)
            });
        }
        registry
    }

    /// Builds the default registry, opening the database only if `sqlite` is selected
    ///
    /// `post` is registered whenever a `[post]` section is present.
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    ///
    /// # Returns
    ///
    /// * `Ok(SinkRegistry)` - Registry covering every selected writer
    /// * `Err(SinkError)` - The database or the POST client could not be opened
    pub fn from_config(config: &Config) -> SinkResult<Self> {
        let wants_sqlite = config.output.write_mode.iter().any(|m| m == "sqlite");
        let storage = if wants_sqlite {
            let path = sqlite_path(config);
            tracing::info!("Writing posts to database {}", path.display());
            let storage: Arc<Mutex<dyn Storage>> = Arc::new(Mutex::new(open_storage(&path)?));
            Some(storage)
        } else {
            None
        };
        let mut registry = Self::with_defaults(storage);
        if let Some(post) = config.post.clone() {
            let client = build_post_client(&post)?;
            registry.register_writer("post", move |ctx| {
                Ok(Box::new(PostWriter::new(client.clone(), &post, ctx.user)) as Box<dyn Writer>)
            });
        }
        Ok(registry)
    }

    /// Adds or replaces a writer factory
    pub fn register_writer<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&SinkContext<'_>) -> SinkResult<Box<dyn Writer>> + Send + Sync + 'static,
    {
        self.writers.insert(name.into(), Box::new(factory));
    }

    /// Registered writer names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.writers.keys().map(String::as_str).collect()
    }

    /// Builds the writers named in `names`, in the given order
    ///
    /// # Returns
    ///
    /// * `Ok(writers)` - One writer per name
    /// * `Err(SinkError::UnknownSink)` - A name has no registered factory
    pub fn resolve_writers(
        &self,
        names: &[String],
        ctx: &SinkContext<'_>,
    ) -> SinkResult<Vec<Box<dyn Writer>>> {
        names
            .iter()
            .map(|name| {
                let factory = self
                    .writers
                    .get(name)
                    .ok_or_else(|| SinkError::UnknownSink(name.clone()))?;
                factory(ctx)
            })
            .collect()
    }
}

fn sqlite_path(config: &Config) -> PathBuf {
    match &config.sqlite {
        Some(sqlite) => PathBuf::from(&sqlite.path),
        None => Path::new(&config.output.output_dir).join(DEFAULT_SQLITE_FILE),
    }
}

/// Downloaders implied by the download flags
///
/// Repost pictures are only fetched when reposts are harvested at all.
pub fn select_downloaders(
    output: &OutputConfig,
    original_only: bool,
    account_dir: &Path,
) -> Vec<Box<dyn Downloader>> {
    let mut downloaders: Vec<Box<dyn Downloader>> = Vec::new();
    if output.pic_download {
        downloaders.push(Box::new(PictureDownloader::original(account_dir)));
        if !original_only {
            downloaders.push(Box::new(PictureDownloader::retweet(account_dir)));
        }
    }
    if output.video_download {
        downloaders.push(Box::new(VideoDownloader::new(account_dir)));
    }
    if output.pic_download {
        downloaders.push(Box::new(AvatarDownloader::new(account_dir)));
    }
    downloaders
}

/// `<output-dir>/<nickname or id>` for one account
pub fn account_dir(output: &OutputConfig, user: &AccountMetadata) -> PathBuf {
    let name = match output.result_dir_name {
        ResultDirName::Nickname if !user.nickname.trim().is_empty() => {
            sanitize_dir_name(&user.nickname)
        }
        _ => user.id.clone(),
    };
    Path::new(&output.output_dir).join(name)
}

fn sanitize_dir_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}
