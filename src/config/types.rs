use crate::dates::{EndDate, SinceDate};
use crate::ConfigError;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

/// Main configuration structure for Weibo-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub auth: AuthConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub sqlite: Option<SqliteConfig>,
    #[serde(default)]
    pub post: Option<PostConfig>,
}

/// Crawl window, target list and pacing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Accounts to harvest: an inline list, or a path to a target-list file
    #[serde(rename = "user-id-list")]
    pub user_id_list: UserIdList,

    /// Only keep original posts, dropping retweets
    #[serde(default)]
    pub filter: bool,

    /// Default lower bound of every account's crawl window
    #[serde(rename = "since-date", default)]
    pub since_date: SinceDate,

    /// Upper bound of every crawl window: "now" or a date
    #[serde(rename = "end-date", default = "default_end_date")]
    pub end_date: String,

    /// Range for the number of pages between two jitter pauses
    #[serde(rename = "random-wait-pages", default = "default_wait_pages")]
    pub random_wait_pages: [u64; 2],

    /// Range for the length of one jitter pause (seconds)
    #[serde(rename = "random-wait-seconds", default = "default_wait_seconds")]
    pub random_wait_seconds: [u64; 2],

    /// Cooldown ring: `[page-threshold, pause-seconds]` entries
    #[serde(rename = "global-wait", default = "default_global_wait")]
    pub global_wait: Vec<[u64; 2]>,

    /// Root of the feed site
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Total timeout for one page request (seconds)
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Overrides the default browser-like user agent
    #[serde(rename = "user-agent", default)]
    pub user_agent: Option<String>,
}

impl CrawlerConfig {
    /// Resolves the default since-date against `today`
    pub fn since(&self, today: NaiveDate) -> Result<NaiveDateTime, ConfigError> {
        self.since_date.resolve(today)
    }

    /// Parses the configured end date
    pub fn end(&self) -> Result<EndDate, ConfigError> {
        EndDate::parse(&self.end_date)
    }
}

/// Credentials attached to every page request
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub cookie: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Root directory for every account's results
    #[serde(rename = "output-dir", default = "default_output_dir")]
    pub output_dir: String,

    /// Writer sinks, by registry name, in dispatch order
    #[serde(rename = "write-mode", default = "default_write_mode")]
    pub write_mode: Vec<String>,

    /// Name each account directory after the nickname or the id
    #[serde(rename = "result-dir-name", default)]
    pub result_dir_name: ResultDirName,

    /// Download post pictures and avatars
    #[serde(rename = "pic-download", default)]
    pub pic_download: bool,

    /// Download post videos
    #[serde(rename = "video-download", default)]
    pub video_download: bool,

    /// `[retries, connect-seconds, total-seconds]` for media downloads
    #[serde(rename = "file-download-timeout", default = "default_download_timeout")]
    pub file_download_timeout: [u64; 3],
}

/// SQLite writer configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteConfig {
    /// Path to the SQLite database file
    pub path: String,
}

/// POST writer configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PostConfig {
    /// Endpoint receiving one JSON document per batch
    #[serde(rename = "api-url")]
    pub api_url: String,

    /// Sent as the `api-token` header
    #[serde(rename = "api-token", default)]
    pub api_token: Option<String>,

    /// Extra attempts after the first failed request
    #[serde(default = "default_post_retries")]
    pub retries: u32,

    /// Wait before retry `n` is `n * backoff-seconds`
    #[serde(rename = "backoff-seconds", default = "default_post_backoff")]
    pub backoff_seconds: u64,

    /// Total timeout for one request (seconds)
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout: u64,
}

/// How account result directories are named
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultDirName {
    #[default]
    Nickname,
    Id,
}

/// Where the target accounts come from
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UserIdList {
    /// Path to a line-oriented target-list file
    File(String),
    /// Inline list of ids and detailed entries
    Inline(Vec<UserIdEntry>),
}

/// One inline target entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum UserIdEntry {
    Numeric(u64),
    Id(String),
    Detailed(DetailedEntry),
}

impl UserIdEntry {
    /// The account identifier of this entry
    pub fn id(&self) -> String {
        match self {
            Self::Numeric(n) => n.to_string(),
            Self::Id(id) => id.clone(),
            Self::Detailed(entry) => entry.id.clone(),
        }
    }
}

/// An inline target with its own crawl window
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DetailedEntry {
    pub id: String,

    #[serde(rename = "since-date", default)]
    pub since_date: Option<String>,

    #[serde(rename = "end-date", default)]
    pub end_date: Option<String>,
}

fn default_end_date() -> String {
    "now".to_string()
}

fn default_wait_pages() -> [u64; 2] {
    [1, 5]
}

fn default_wait_seconds() -> [u64; 2] {
    [6, 10]
}

fn default_global_wait() -> Vec<[u64; 2]> {
    vec![[1000, 3600]]
}

fn default_base_url() -> String {
    "https://weibo.cn".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_output_dir() -> String {
    "weibo".to_string()
}

fn default_write_mode() -> Vec<String> {
    vec!["txt".to_string()]
}

fn default_post_retries() -> u32 {
    3
}

fn default_post_backoff() -> u64 {
    2
}

fn default_download_timeout() -> [u64; 3] {
    [5, 5, 10]
}
