//! Pacing for page and account fetches
//!
//! Two layers keep the harvest polite:
//! - jitter: every few pages (a drawn period) sleep a drawn number of seconds
//! - cooldowns: a ring of `(page threshold, pause)` entries; once the running
//!   page counter reaches the head's threshold, sleep its pause and rotate

use crate::config::CrawlerConfig;
use crate::ConfigError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::time::Duration;

/// Inclusive `[min, max]` range with `1 <= min <= max`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingRange {
    min: u64,
    max: u64,
}

impl PacingRange {
    /// Creates a range, rejecting `min < 1` and `min > max`
    pub fn new(min: u64, max: u64) -> Result<Self, ConfigError> {
        if min < 1 || min > max {
            return Err(ConfigError::Validation(format!(
                "pacing range [{}, {}] must satisfy 1 <= min <= max",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> u64 {
        self.min
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    /// Draws a uniform integer from the range
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        rng.gen_range(self.min..=self.max)
    }
}

/// One cooldown: after `page_threshold` pages, pause `pause_seconds`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownEntry {
    pub page_threshold: u64,
    pub pause_seconds: u64,
}

/// Round-robin schedule of cooldowns
///
/// Never empty, and every threshold is at least 1.
#[derive(Debug, Clone)]
pub struct CooldownRing {
    entries: VecDeque<CooldownEntry>,
    initial: Vec<CooldownEntry>,
}

impl CooldownRing {
    pub fn new(entries: Vec<CooldownEntry>) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::Validation(
                "cooldown ring needs at least one entry".to_string(),
            ));
        }
        if let Some(bad) = entries.iter().find(|e| e.page_threshold < 1) {
            return Err(ConfigError::Validation(format!(
                "cooldown page threshold must be >= 1, got {}",
                bad.page_threshold
            )));
        }
        Ok(Self {
            entries: entries.iter().copied().collect(),
            initial: entries,
        })
    }

    /// The entry checked next
    pub fn head(&self) -> CooldownEntry {
        self.entries[0]
    }

    /// Moves the head to the tail
    pub fn rotate(&mut self) {
        self.entries.rotate_left(1);
    }

    /// Restores the configured order
    pub fn reset(&mut self) {
        self.entries = self.initial.iter().copied().collect();
    }

    /// Entries in current order, head first
    pub fn entries(&self) -> impl Iterator<Item = &CooldownEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Which of the two cooldown call sites is asking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownCheck {
    /// Right after the index fetch, once the account's page count is known
    ///
    /// Fires when the pages already counted plus the pages still to come
    /// would overshoot the threshold, and only once more than two pages have
    /// been counted. The pause is scaled by `min(1, processed / threshold)`.
    AfterIndex { total_pages: u64 },

    /// After each listing page; fires at the threshold with the full pause
    AfterPage,
}

/// Draws jitter and decides cooldowns
#[derive(Debug, Clone)]
pub struct RateLimiter {
    period_pages: PacingRange,
    pause_seconds: PacingRange,
    ring: CooldownRing,
    rng: StdRng,
}

impl RateLimiter {
    pub fn new(period_pages: PacingRange, pause_seconds: PacingRange, ring: CooldownRing) -> Self {
        Self {
            period_pages,
            pause_seconds,
            ring,
            rng: StdRng::from_entropy(),
        }
    }

    /// Builds a limiter from the crawler configuration
    pub fn from_config(config: &CrawlerConfig) -> Result<Self, ConfigError> {
        let [pages_min, pages_max] = config.random_wait_pages;
        let [secs_min, secs_max] = config.random_wait_seconds;
        let ring = config
            .global_wait
            .iter()
            .map(|[threshold, pause]| CooldownEntry {
                page_threshold: *threshold,
                pause_seconds: *pause,
            })
            .collect();

        Ok(Self::new(
            PacingRange::new(pages_min, pages_max)?,
            PacingRange::new(secs_min, secs_max)?,
            CooldownRing::new(ring)?,
        ))
    }

    /// Replaces the entropy-seeded generator with a deterministic one
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn ring(&self) -> &CooldownRing {
        &self.ring
    }

    /// Restores the cooldown ring to its configured order
    pub fn reset_ring(&mut self) {
        self.ring.reset();
    }

    /// Draws `(period_pages, pause_seconds)` for the next jitter pause
    pub fn next_page_jitter(&mut self) -> (u64, u64) {
        let period = self.period_pages.draw(&mut self.rng);
        let pause = self.pause_seconds.draw(&mut self.rng);
        (period, pause)
    }

    /// Decides whether a cooldown is due, rotating the ring if so
    ///
    /// # Arguments
    ///
    /// * `pages_processed` - Pages counted since the last cooldown
    /// * `check` - Which call site is asking
    ///
    /// # Returns
    ///
    /// The pause in seconds, or `None` if no cooldown is due.
    pub fn should_cooldown(&mut self, pages_processed: u64, check: CooldownCheck) -> Option<u64> {
        let head = self.ring.head();

        let pause = match check {
            CooldownCheck::AfterIndex { total_pages } => {
                if pages_processed <= 2 || pages_processed + total_pages <= head.page_threshold {
                    return None;
                }
                let ratio = (pages_processed as f64 / head.page_threshold as f64).min(1.0);
                (head.pause_seconds as f64 * ratio) as u64
            }
            CooldownCheck::AfterPage => {
                if pages_processed < head.page_threshold {
                    return None;
                }
                head.pause_seconds
            }
        };

        self.ring.rotate();
        Some(pause)
    }
}

/// Sleeps for a pacing pause
pub async fn pause_for(seconds: u64, reason: &str) {
    if seconds == 0 {
        return;
    }
    tracing::info!("Pausing {}s ({})", seconds, reason);
    tokio::time::sleep(Duration::from_secs(seconds)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(page_threshold: u64, pause_seconds: u64) -> CooldownEntry {
        CooldownEntry {
            page_threshold,
            pause_seconds,
        }
    }

    fn limiter(ring: Vec<CooldownEntry>) -> RateLimiter {
        RateLimiter::new(
            PacingRange::new(1, 5).unwrap(),
            PacingRange::new(6, 10).unwrap(),
            CooldownRing::new(ring).unwrap(),
        )
        .with_seed(7)
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        assert!(PacingRange::new(0, 3).is_err());
        assert!(PacingRange::new(4, 3).is_err());
        assert!(PacingRange::new(3, 3).is_ok());
    }

    #[test]
    fn test_jitter_draws_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        for (min, max) in [(1, 1), (1, 5), (6, 10), (3, 300)] {
            let range = PacingRange::new(min, max).unwrap();
            for _ in 0..1000 {
                let value = range.draw(&mut rng);
                assert!(value >= min && value <= max, "{} outside [{}, {}]", value, min, max);
            }
        }

        let mut limiter = limiter(vec![entry(5, 30)]);
        for _ in 0..1000 {
            let (period, pause) = limiter.next_page_jitter();
            assert!((1..=5).contains(&period));
            assert!((6..=10).contains(&pause));
        }
    }

    #[test]
    fn test_empty_ring_and_zero_threshold_rejected() {
        assert!(CooldownRing::new(vec![]).is_err());
        assert!(CooldownRing::new(vec![entry(0, 10)]).is_err());
    }

    #[test]
    fn test_ring_rotation_is_a_permutation() {
        let entries = vec![entry(5, 30), entry(10, 60), entry(20, 90)];
        let mut ring = CooldownRing::new(entries.clone()).unwrap();

        for step in 1..=100 {
            ring.rotate();
            let mut current: Vec<CooldownEntry> = ring.entries().copied().collect();
            assert_eq!(ring.head(), entries[step % entries.len()]);
            current.sort_by_key(|e| e.page_threshold);
            assert_eq!(current, entries);
        }

        ring.reset();
        assert_eq!(ring.head(), entries[0]);
    }

    #[test]
    fn test_after_page_full_pause_and_single_rotation() {
        let mut limiter = limiter(vec![entry(5, 30), entry(100, 60)]);

        assert_eq!(limiter.should_cooldown(4, CooldownCheck::AfterPage), None);
        assert_eq!(limiter.ring().head(), entry(5, 30));

        assert_eq!(limiter.should_cooldown(5, CooldownCheck::AfterPage), Some(30));
        assert_eq!(limiter.ring().head(), entry(100, 60));

        assert_eq!(limiter.should_cooldown(5, CooldownCheck::AfterPage), None);
        assert_eq!(limiter.ring().head(), entry(100, 60));
    }

    #[test]
    fn test_after_index_softened_pause() {
        // 4 pages counted, 10 to come: 4 + 10 > 8, pause scaled by 4/8
        let mut limiter = limiter(vec![entry(8, 100), entry(50, 10)]);
        assert_eq!(
            limiter.should_cooldown(4, CooldownCheck::AfterIndex { total_pages: 10 }),
            Some(50)
        );
        assert_eq!(limiter.ring().head(), entry(50, 10));
    }

    #[test]
    fn test_after_index_ratio_capped_at_one() {
        let mut limiter = limiter(vec![entry(8, 100)]);
        assert_eq!(
            limiter.should_cooldown(20, CooldownCheck::AfterIndex { total_pages: 1 }),
            Some(100)
        );
    }

    #[test]
    fn test_after_index_needs_more_than_two_pages() {
        let mut limiter = limiter(vec![entry(3, 100)]);
        assert_eq!(
            limiter.should_cooldown(2, CooldownCheck::AfterIndex { total_pages: 50 }),
            None
        );
        assert_eq!(
            limiter.should_cooldown(5, CooldownCheck::AfterIndex { total_pages: 0 }),
            Some(100)
        );
    }

    #[test]
    fn test_after_index_no_overshoot_no_cooldown() {
        let mut limiter = limiter(vec![entry(100, 60)]);
        assert_eq!(
            limiter.should_cooldown(10, CooldownCheck::AfterIndex { total_pages: 90 }),
            None
        );
        assert_eq!(limiter.ring().head(), entry(100, 60));
    }
}
