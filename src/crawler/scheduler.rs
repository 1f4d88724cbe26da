//! Per-account harvest: the pagination state machine
//!
//! One call to [`CrawlScheduler::run_account`] drives one account from
//! `Idle` to `Done`:
//! - fetch the index and info pages, resolving the real account id
//! - walk the listing pages in ascending order until the decoder reports
//!   the since-date boundary or the pages run out
//! - de-duplicate each batch and dispatch it to the sinks
//! - pause for jitter and cooldowns between pages
//! - derive the resume cursor and persist it for file-backed target lists

use crate::config::Config;
use crate::crawler::endpoints::Endpoints;
use crate::crawler::fetcher::FetchGateway;
use crate::crawler::rate_limiter::{pause_for, CooldownCheck, RateLimiter};
use crate::dates::now_minute;
use crate::decoder::{DecodedBatch, FeedDecoder, IndexPage, PageContext};
use crate::output::{AccountOutcome, AccountReport, SinkDispatcher, SinkRegistry};
use crate::record::AccountMetadata;
use crate::state::{CrawlPhase, CrawlState, ResumeCursor};
use crate::targets::{AccountTarget, TargetList};
use crate::HarvestError;
use chrono::NaiveDateTime;
use std::sync::Arc;

/// How one account ended, plus the page counter to carry into the next
#[derive(Debug)]
pub struct AccountRun {
    pub outcome: AccountOutcome,
    pub pages_since_cooldown: u64,
}

/// Drives accounts through the crawl state machine
pub struct CrawlScheduler {
    gateway: FetchGateway,
    decoder: Arc<dyn FeedDecoder>,
    endpoints: Endpoints,
    config: Arc<Config>,
    registry: Arc<SinkRegistry>,
    media_pre_delay: bool,
}

impl CrawlScheduler {
    pub fn new(
        gateway: FetchGateway,
        decoder: Arc<dyn FeedDecoder>,
        endpoints: Endpoints,
        config: Arc<Config>,
        registry: Arc<SinkRegistry>,
    ) -> Self {
        Self {
            gateway,
            decoder,
            endpoints,
            config,
            registry,
            media_pre_delay: true,
        }
    }

    /// Turns the randomized pause before media transfers on or off
    pub fn set_media_pre_delay(&mut self, enabled: bool) {
        self.media_pre_delay = enabled;
    }

    /// Harvests one account
    ///
    /// # Arguments
    ///
    /// * `target` - The account and its date window
    /// * `targets` - The list the target came from; receives the resume cursor
    /// * `limiter` - Pacing state shared by the whole run
    /// * `carried_pages` - Pages counted since the last cooldown, from earlier accounts
    ///
    /// # Returns
    ///
    /// The account's outcome and the page counter to hand to the next account.
    /// Fatal errors are returned in the outcome; the caller decides to stop.
    pub async fn run_account(
        &self,
        target: &AccountTarget,
        targets: &TargetList,
        limiter: &mut RateLimiter,
        carried_pages: u64,
    ) -> AccountRun {
        let mut state = CrawlState::new(carried_pages);
        let mut report = AccountReport::new(&target.account_id);

        limiter.reset_ring();
        let result = self
            .harvest(target, targets, limiter, &mut state, &mut report)
            .await;

        AccountRun {
            outcome: result.map(|_| report),
            pages_since_cooldown: state.pages_since_cooldown,
        }
    }

    async fn harvest(
        &self,
        target: &AccountTarget,
        targets: &TargetList,
        limiter: &mut RateLimiter,
        state: &mut CrawlState,
        report: &mut AccountReport,
    ) -> Result<(), HarvestError> {
        let started = now_minute();

        if !window_open(target, started) {
            tracing::info!(
                "Skipping {}: since-date {} is in the future",
                target.account_id,
                target.since_date
            );
            state.transition(CrawlPhase::Done)?;
            return Ok(());
        }

        state.transition(CrawlPhase::FetchingIndex)?;
        let (index, metadata) = self.fetch_profile(&target.account_id).await?;
        state.count_page();
        report.pages_fetched += 1;
        report.metadata = metadata.clone();
        tracing::info!(
            "Harvesting {} ({}): {} posts over {} pages",
            metadata.nickname,
            metadata.id,
            index.post_count,
            index.page_count
        );

        let dispatcher = SinkDispatcher::for_account(
            &self.registry,
            &self.config,
            &metadata,
            self.media_pre_delay,
        )
        .map_err(|e| HarvestError::Sink(e.to_string()))?;
        let account_dispatch = dispatcher.dispatch_account(&metadata).await;
        report.media_saved += account_dispatch.media_saved as u64;
        report.sink_failures += account_dispatch.sink_failures as u64;

        state.transition(CrawlPhase::Paginating)?;
        let check = CooldownCheck::AfterIndex {
            total_pages: index.page_count,
        };
        self.maybe_cool_down(limiter, state, report, check).await?;

        let (mut jitter_period, mut jitter_pause) = limiter.next_page_jitter();
        let mut pages_since_jitter = 0;

        while state.page_cursor <= index.page_count {
            let page = state.page_cursor;
            let batch = self
                .fetch_page(&metadata.id, page, target, report)
                .await?;
            state.count_page();
            report.pages_fetched += 1;

            let continue_paging = batch.continue_paging;
            let (fresh, dropped) = state.admit(batch.records);
            report.duplicates_dropped += dropped as u64;
            if !fresh.is_empty() {
                report.records_emitted += fresh.len() as u64;
                let dispatched = dispatcher.dispatch(fresh).await;
                report.media_saved += dispatched.media_saved as u64;
                report.sink_failures += dispatched.sink_failures as u64;
            }
            tracing::debug!(
                "Page {}/{} of {} done, {} posts so far",
                page,
                index.page_count,
                metadata.id,
                report.records_emitted
            );

            if !continue_paging {
                tracing::info!("Reached since-date of {} on page {}", metadata.id, page);
                break;
            }

            self.maybe_cool_down(limiter, state, report, CooldownCheck::AfterPage)
                .await?;

            pages_since_jitter += 1;
            if pages_since_jitter >= jitter_period && page < index.page_count {
                pause_for(jitter_pause, "page jitter").await;
                report.jitter_pauses += 1;
                pages_since_jitter = 0;
                (jitter_period, jitter_pause) = limiter.next_page_jitter();
            }

            state.page_cursor += 1;
        }

        state.transition(CrawlPhase::Done)?;
        let cursor = ResumeCursor::from_end_date(&target.end_date, started);
        match targets.record_cursor(target, &metadata.nickname, &cursor).await {
            Ok(true) => tracing::info!("Next run of {} starts at {}", target.account_id, cursor),
            Ok(false) => {}
            Err(e) => tracing::warn!("Failed to record cursor for {}: {}", target.account_id, e),
        }
        report.cursor = Some(cursor);

        tracing::info!(
            "Finished {}: {} posts, {} duplicates dropped, {} pages skipped",
            metadata.id,
            report.records_emitted,
            report.duplicates_dropped,
            report.pages_skipped
        );
        Ok(())
    }

    /// Fetches the index page, then the info page of the resolved id
    async fn fetch_profile(&self, account_id: &str) -> Result<(IndexPage, AccountMetadata), HarvestError> {
        let index_url = self.endpoints.index_url(account_id)?;
        let index = self
            .gateway
            .fetch(&index_url, |raw| self.decoder.decode_index(raw, account_id))
            .await?
            .value;

        let mut metadata = AccountMetadata {
            id: index.resolved_id.clone(),
            post_count: index.post_count,
            following: index.following,
            followers: index.followers,
            avatar_url: index.avatar_url.clone(),
            ..Default::default()
        };

        let info_url = self.endpoints.info_url(&index.resolved_id)?;
        let decoded = self
            .gateway
            .fetch(&info_url, |raw| {
                let mut filled = metadata.clone();
                self.decoder.decode_info(raw, &mut filled).map(|_| filled)
            })
            .await?;
        metadata = decoded.value;

        Ok((index, metadata))
    }

    /// Fetches and decodes one listing page
    ///
    /// A page that exhausts its retries yields an empty batch and paging goes on.
    async fn fetch_page(
        &self,
        account_id: &str,
        page: u64,
        target: &AccountTarget,
        report: &mut AccountReport,
    ) -> Result<DecodedBatch, HarvestError> {
        let now = now_minute();
        let ctx = PageContext {
            account_id: account_id.to_string(),
            page,
            since_date: target.since_date,
            end_date: target.end_date.as_time(now),
            original_only: self.config.crawler.filter,
            now,
        };
        let url = self
            .endpoints
            .page_url(account_id, page, self.config.crawler.filter)?;

        match self
            .gateway
            .fetch(&url, |raw| self.decoder.decode_page(raw, &ctx))
            .await
        {
            Ok(decoded) => Ok(decoded.value),
            Err(HarvestError::FetchExhausted { url, attempts }) => {
                tracing::warn!("Skipping page {} ({} attempts failed): {}", page, attempts, url);
                report.pages_skipped += 1;
                Ok(DecodedBatch::new(Vec::new(), true))
            }
            Err(e) => Err(e),
        }
    }

    async fn maybe_cool_down(
        &self,
        limiter: &mut RateLimiter,
        state: &mut CrawlState,
        report: &mut AccountReport,
        check: CooldownCheck,
    ) -> Result<(), HarvestError> {
        let Some(pause) = limiter.should_cooldown(state.pages_since_cooldown, check) else {
            return Ok(());
        };

        state.transition(CrawlPhase::Cooldown)?;
        pause_for(pause, "cooldown").await;
        state.reset_cooldown_counter();
        report.cooldowns += 1;
        state.transition(CrawlPhase::Paginating)?;
        Ok(())
    }
}

/// Whether an account's window has opened at `now`
pub fn window_open(target: &AccountTarget, now: NaiveDateTime) -> bool {
    target.since_date <= now
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthConfig, CrawlerConfig, OutputConfig, ResultDirName, UserIdList};
    use crate::crawler::fetcher::PageSource;
    use crate::dates::{EndDate, SinceDate};
    use crate::decoder::{DecodeError, PageDecoder, ProfileDecoder};
    use crate::record::Record;
    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Echoes the requested URL and remembers it
    #[derive(Default)]
    struct EchoSource {
        requested: Mutex<Vec<String>>,
    }

    impl EchoSource {
        fn listing_requests(&self) -> Vec<String> {
            self.requested
                .lock()
                .unwrap()
                .iter()
                .filter(|u| u.contains("page="))
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl PageSource for EchoSource {
        async fn fetch_text(&self, url: &str) -> Result<String, HarvestError> {
            self.requested.lock().unwrap().push(url.to_string());
            Ok(url.to_string())
        }
    }

    /// Serves a fixed number of pages with scripted contents
    struct ScriptedDecoder {
        page_count: u64,
        pages: HashMap<u64, Result<DecodedBatch, DecodeError>>,
    }

    impl ScriptedDecoder {
        fn new(page_count: u64) -> Self {
            Self {
                page_count,
                pages: HashMap::new(),
            }
        }

        fn page(mut self, page: u64, result: Result<DecodedBatch, DecodeError>) -> Self {
            self.pages.insert(page, result);
            self
        }
    }

    impl ProfileDecoder for ScriptedDecoder {
        fn decode_index(&self, _raw: &str, _configured_id: &str) -> Result<IndexPage, DecodeError> {
            Ok(IndexPage {
                resolved_id: "1001".to_string(),
                post_count: 10,
                following: 1,
                followers: 2,
                page_count: self.page_count,
                avatar_url: None,
            })
        }

        fn decode_info(&self, _raw: &str, metadata: &mut AccountMetadata) -> Result<(), DecodeError> {
            metadata.nickname = "scripted".to_string();
            Ok(())
        }
    }

    impl PageDecoder for ScriptedDecoder {
        fn decode_page(&self, raw: &str, ctx: &PageContext) -> Result<DecodedBatch, DecodeError> {
            assert!(raw.ends_with(&format!("page={}", ctx.page)));
            self.pages
                .get(&ctx.page)
                .cloned()
                .unwrap_or_else(|| Ok(DecodedBatch::new(Vec::new(), true)))
        }
    }

    fn posts(ids: &[&str]) -> Result<DecodedBatch, DecodeError> {
        let time = NaiveDate::from_ymd_opt(2024, 4, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let records = ids
            .iter()
            .map(|id| Record::new(*id, "1001", "post", time))
            .collect();
        Ok(DecodedBatch::new(records, true))
    }

    fn config(output_dir: &std::path::Path, wait_pages: [u64; 2], global_wait: Vec<[u64; 2]>) -> Config {
        Config {
            crawler: CrawlerConfig {
                user_id_list: UserIdList::Inline(vec![]),
                filter: false,
                since_date: SinceDate::default(),
                end_date: "now".to_string(),
                random_wait_pages: wait_pages,
                random_wait_seconds: [7, 7],
                global_wait,
                base_url: "https://weibo.cn".to_string(),
                request_timeout: 5,
                user_agent: None,
            },
            auth: AuthConfig {
                cookie: "SUB=test".to_string(),
            },
            output: OutputConfig {
                output_dir: output_dir.display().to_string(),
                write_mode: vec![],
                result_dir_name: ResultDirName::Id,
                pic_download: false,
                video_download: false,
                file_download_timeout: [0, 1, 1],
            },
            sqlite: None,
            post: None,
        }
    }

    struct Harness {
        scheduler: CrawlScheduler,
        source: Arc<EchoSource>,
        limiter: RateLimiter,
        targets: TargetList,
    }

    fn harness(decoder: ScriptedDecoder, config: Config) -> Harness {
        let source = Arc::new(EchoSource::default());
        let limiter = RateLimiter::from_config(&config.crawler).unwrap().with_seed(3);
        let since = now_minute() - Duration::days(30);
        let targets = TargetList::from_ids(&["1001".to_string()], since, EndDate::Now);
        let mut scheduler = CrawlScheduler::new(
            FetchGateway::new(source.clone()),
            Arc::new(decoder),
            Endpoints::new(&config.crawler.base_url).unwrap(),
            Arc::new(config),
            Arc::new(SinkRegistry::new()),
        );
        scheduler.set_media_pre_delay(false);
        Harness {
            scheduler,
            source,
            limiter,
            targets,
        }
    }

    impl Harness {
        async fn run(&mut self, carried_pages: u64) -> AccountRun {
            let target = self.targets.targets()[0].clone();
            self.scheduler
                .run_account(&target, &self.targets, &mut self.limiter, carried_pages)
                .await
        }
    }

    #[tokio::test]
    async fn test_stops_when_decoder_crosses_since_date() {
        let dir = tempfile::tempdir().unwrap();
        let decoder = ScriptedDecoder::new(3)
            .page(1, posts(&["a"]))
            .page(2, Ok(DecodedBatch::new(Vec::new(), false)));
        let mut h = harness(decoder, config(dir.path(), [100, 100], vec![[1000, 60]]));

        let run = h.run(0).await;
        let report = run.outcome.unwrap();

        let listing = h.source.listing_requests();
        assert_eq!(listing.len(), 2);
        assert!(listing.iter().all(|u| !u.ends_with("page=3")));
        assert_eq!(report.pages_fetched, 3);
        assert_eq!(report.records_emitted, 1);
        assert!(report.cursor.is_some());
        assert_eq!(report.metadata.nickname, "scripted");
    }

    #[tokio::test]
    async fn test_record_seen_on_two_pages_emitted_once() {
        let dir = tempfile::tempdir().unwrap();
        let decoder = ScriptedDecoder::new(2)
            .page(1, posts(&["a", "b"]))
            .page(2, posts(&["b", "c"]));
        let mut h = harness(decoder, config(dir.path(), [100, 100], vec![[1000, 60]]));

        let report = h.run(0).await.outcome.unwrap();

        assert_eq!(report.records_emitted, 3);
        assert_eq!(report.duplicates_dropped, 1);
    }

    #[tokio::test]
    async fn test_exhausted_page_is_skipped_and_paging_continues() {
        let dir = tempfile::tempdir().unwrap();
        let decoder = ScriptedDecoder::new(3)
            .page(2, Err(DecodeError::Malformed("no div.c".to_string())))
            .page(3, posts(&["z"]));
        let mut h = harness(decoder, config(dir.path(), [100, 100], vec![[1000, 60]]));

        let run = h.run(0).await;
        let report = run.outcome.unwrap();

        let page_two = h
            .source
            .listing_requests()
            .iter()
            .filter(|u| u.ends_with("page=2"))
            .count();
        assert_eq!(page_two, 3);
        assert_eq!(report.pages_skipped, 1);
        assert_eq!(report.pages_fetched, 4);
        assert_eq!(report.records_emitted, 1);
        assert_eq!(run.pages_since_cooldown, 4);
    }

    #[tokio::test]
    async fn test_login_wall_on_listing_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let decoder = ScriptedDecoder::new(2).page(1, Err(DecodeError::NotLoggedIn));
        let mut h = harness(decoder, config(dir.path(), [100, 100], vec![[1000, 60]]));

        let run = h.run(0).await;

        match run.outcome {
            Err(e) => assert!(e.is_fatal()),
            Ok(_) => panic!("login wall must fail the account"),
        }
        assert_eq!(h.source.listing_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_future_window_skips_without_fetching() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = harness(
            ScriptedDecoder::new(2),
            config(dir.path(), [100, 100], vec![[1000, 60]]),
        );
        let future = now_minute() + Duration::days(2);
        h.targets = TargetList::from_ids(&["1001".to_string()], future, EndDate::Now);

        let run = h.run(5).await;
        let report = run.outcome.unwrap();

        assert!(h.source.requested.lock().unwrap().is_empty());
        assert_eq!(report.cursor, None);
        assert_eq!(report.pages_fetched, 0);
        assert_eq!(run.pages_since_cooldown, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_fires_at_threshold_and_rotates() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = harness(
            ScriptedDecoder::new(6),
            config(dir.path(), [100, 100], vec![[5, 30], [100, 60]]),
        );
        let start = tokio::time::Instant::now();

        let run = h.run(0).await;
        let report = run.outcome.unwrap();

        // index + 4 listing pages reach the threshold of 5
        assert_eq!(report.cooldowns, 1);
        assert!(start.elapsed() >= std::time::Duration::from_secs(30));
        assert_eq!(h.limiter.ring().head().page_threshold, 100);
        assert_eq!(run.pages_since_cooldown, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_carried_pages_trigger_softened_cooldown_after_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = harness(
            ScriptedDecoder::new(10),
            config(dir.path(), [100, 100], vec![[8, 100], [1000, 60]]),
        );
        let start = tokio::time::Instant::now();

        // 3 carried + index = 4 counted; 4 + 10 > 8, pause 100 * 4/8
        let report = h.run(3).await.outcome.unwrap();

        assert_eq!(report.cooldowns, 1);
        let elapsed = start.elapsed();
        assert!(elapsed >= std::time::Duration::from_secs(50));
        assert!(elapsed < std::time::Duration::from_secs(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_jitter_every_period_but_not_after_last_page() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = harness(
            ScriptedDecoder::new(4),
            config(dir.path(), [2, 2], vec![[1000, 60]]),
        );
        let start = tokio::time::Instant::now();

        let report = h.run(0).await.outcome.unwrap();

        // after page 2 only; page 4 is the last
        assert_eq!(report.jitter_pauses, 1);
        assert_eq!(start.elapsed().as_secs(), 7);
    }
}
