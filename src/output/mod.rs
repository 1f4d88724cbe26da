//! Output module: where harvested posts go
//!
//! This module handles:
//! - Writers that persist posts and profiles (txt, csv, json, sqlite, post)
//! - Downloaders that fetch referenced media
//! - The per-account dispatcher that fans batches out to both
//! - Run summaries

mod csv_writer;
mod dispatcher;
mod downloaders;
mod json_writer;
mod post_writer;
mod registry;
mod sqlite_output;
pub mod stats;
mod traits;
mod txt_writer;

pub use csv_writer::{CsvWriter, CSV_HEADER};
pub use dispatcher::{DispatchReport, SinkDispatcher};
pub use downloaders::{AvatarDownloader, PictureDownloader, VideoDownloader};
pub use json_writer::JsonWriter;
pub use post_writer::{build_post_client, PostWriter, API_TOKEN_HEADER};
pub use registry::{
    account_dir, select_downloaders, SinkContext, SinkRegistry, WriterFactory,
    DEFAULT_SQLITE_FILE, KNOWN_WRITERS,
};
pub use sqlite_output::SqliteWriter;
pub use stats::{print_summary, AccountOutcome, AccountReport, RunSummary};
pub use traits::{Downloader, SinkError, SinkResult, Writer};
pub use txt_writer::TxtWriter;
