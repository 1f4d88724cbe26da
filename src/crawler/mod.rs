//! Crawler module for page fetching and pacing
//!
//! This module contains the core harvest logic, including:
//! - HTTP fetching with bounded retries and a liveness check
//! - Jitter and rotating cooldowns between pages and accounts
//! - The per-account pagination state machine
//! - Overall run coordination

mod coordinator;
mod endpoints;
mod fetcher;
mod rate_limiter;
mod scheduler;

pub use coordinator::{harvest, Coordinator};
pub use endpoints::Endpoints;
pub use fetcher::{
    build_http_client, DecodedPage, FetchGateway, HttpSource, PageSource, MAX_FETCH_ATTEMPTS,
};
pub use rate_limiter::{
    pause_for, CooldownCheck, CooldownEntry, CooldownRing, PacingRange, RateLimiter,
};
pub use scheduler::{window_open, AccountRun, CrawlScheduler};
