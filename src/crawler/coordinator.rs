//! Crawl coordinator - main harvest orchestration logic
//!
//! This module contains the run loop over accounts:
//! - Building the fetch gateway, endpoints and sinks from configuration
//! - Running accounts strictly one after another
//! - Pausing between accounts
//! - Absorbing per-account failures and stopping on fatal ones
//! - Collecting the run summary

use crate::config::Config;
use crate::crawler::endpoints::Endpoints;
use crate::crawler::fetcher::{build_http_client, FetchGateway, HttpSource, PageSource};
use crate::crawler::rate_limiter::{pause_for, RateLimiter};
use crate::crawler::scheduler::CrawlScheduler;
use crate::decoder::{FeedDecoder, WeiboCnDecoder};
use crate::output::{RunSummary, SinkRegistry};
use crate::targets::TargetList;
use crate::HarvestError;
use std::sync::Arc;

/// Main harvest coordinator structure
pub struct Coordinator {
    targets: TargetList,
    scheduler: CrawlScheduler,
    limiter: RateLimiter,
    config_hash: String,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `targets` - Accounts to harvest, in order
    /// * `source` - Where page content comes from
    /// * `decoder` - Turns page content into profiles and posts
    /// * `registry` - Writer factories
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(HarvestError)` - The pacing settings or base URL are invalid
    pub fn new(
        config: Config,
        targets: TargetList,
        source: Arc<dyn PageSource>,
        decoder: Arc<dyn FeedDecoder>,
        registry: SinkRegistry,
    ) -> Result<Self, HarvestError> {
        let limiter = RateLimiter::from_config(&config.crawler)?;
        let endpoints = Endpoints::new(&config.crawler.base_url)?;
        let scheduler = CrawlScheduler::new(
            FetchGateway::new(source),
            decoder,
            endpoints,
            Arc::new(config),
            Arc::new(registry),
        );

        Ok(Self {
            targets,
            scheduler,
            limiter,
            config_hash: String::new(),
        })
    }

    /// Labels the run summary with the configuration fingerprint
    pub fn with_config_hash(mut self, config_hash: impl Into<String>) -> Self {
        self.config_hash = config_hash.into();
        self
    }

    /// Replaces the pacing state, e.g. with a seeded one
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// Skips the randomized pause before each media transfer
    pub fn without_media_delay(mut self) -> Self {
        self.scheduler.set_media_pre_delay(false);
        self
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn targets(&self) -> &TargetList {
        &self.targets
    }

    /// Runs every account once
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - Every account was attempted; failed ones are in the summary
    /// * `Err(HarvestError)` - A fatal error (such as a rejected cookie) stopped the run
    pub async fn run(&mut self) -> Result<RunSummary, HarvestError> {
        let mut summary = RunSummary::new(self.config_hash.clone());
        let total = self.targets.len();
        tracing::info!("Starting harvest of {} accounts", total);

        let mut carried_pages = 0;
        let (mut account_period, mut account_pause) = self.limiter.next_page_jitter();
        let mut accounts_since_pause = 0;

        for (position, target) in self.targets.targets().iter().enumerate() {
            if position > 0 {
                accounts_since_pause += 1;
                if accounts_since_pause >= account_period {
                    pause_for(account_pause, "account jitter").await;
                    accounts_since_pause = 0;
                    (account_period, account_pause) = self.limiter.next_page_jitter();
                }
            }

            tracing::info!("Account {}/{}: {}", position + 1, total, target.account_id);
            let run = self
                .scheduler
                .run_account(target, &self.targets, &mut self.limiter, carried_pages)
                .await;
            carried_pages = run.pages_since_cooldown;

            match run.outcome {
                Err(e) if e.is_fatal() => {
                    tracing::error!("Stopping harvest: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    tracing::error!("Account {} failed: {}", target.account_id, e);
                    summary.push(&target.account_id, Err(e));
                }
                Ok(report) => summary.push(&target.account_id, Ok(report)),
            }
        }

        summary.finish();
        tracing::info!(
            "Harvest completed: {} posts from {} accounts, {} failed",
            summary.total_records(),
            total,
            summary.failed_count()
        );

        Ok(summary)
    }
}

/// Runs a complete harvest against the live site
///
/// This is the main entry point. It will:
/// 1. Build the cookie-authenticated HTTP client
/// 2. Open the configured writers
/// 3. Harvest every target with the weibo.cn decoder
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `targets` - Accounts to harvest
/// * `config_hash` - Fingerprint of the configuration file
///
/// # Returns
///
/// * `Ok(RunSummary)` - Harvest finished
/// * `Err(HarvestError)` - Setup failed or a fatal error stopped the run
pub async fn harvest(
    config: Config,
    targets: TargetList,
    config_hash: &str,
) -> Result<RunSummary, HarvestError> {
    let client = build_http_client(&config.crawler)?;
    let source = Arc::new(HttpSource::new(client, config.auth.cookie.clone()));
    let registry = SinkRegistry::from_config(&config).map_err(|e| HarvestError::Sink(e.to_string()))?;

    let mut coordinator = Coordinator::new(
        config,
        targets,
        source,
        Arc::new(WeiboCnDecoder::new()),
        registry,
    )?
    .with_config_hash(config_hash);

    coordinator.run().await
}
