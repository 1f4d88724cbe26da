//! Configuration module for Weibo-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every error found here is fatal at startup, before any network activity.
//!
//! # Example
//!
//! ```no_run
//! use weibo_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Cooldown ring: {:?}", config.crawler.global_wait);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AuthConfig, Config, CrawlerConfig, DetailedEntry, OutputConfig, PostConfig, ResultDirName,
    SqliteConfig, UserIdEntry, UserIdList,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
