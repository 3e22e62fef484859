//! Randomized waits between page interactions.
//!
//! The page gives no signal when lazily loaded content has rendered, so the
//! harvester sleeps for bounded, jittered intervals instead.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Inclusive millisecond range, written as `[min, max]` in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u64, u64)", into = "(u64, u64)")]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const ZERO: Self = Self::fixed(0);

    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub const fn fixed(ms: u64) -> Self {
        Self::new(ms, ms)
    }

    /// Pick a duration inside the range. A reversed range is read as fixed
    /// at its lower bound.
    pub fn sample(&self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rand::rng().random_range(self.min_ms..=self.max_ms))
    }

    pub fn is_zero(&self) -> bool {
        self.min_ms == 0 && self.max_ms == 0
    }
}

impl From<(u64, u64)> for DelayRange {
    fn from((min_ms, max_ms): (u64, u64)) -> Self {
        Self::new(min_ms, max_ms)
    }
}

impl From<DelayRange> for (u64, u64) {
    fn from(range: DelayRange) -> Self {
        (range.min_ms, range.max_ms)
    }
}

/// Wait budget for each kind of interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Pacing {
    /// After navigation, before anything else touches the page.
    pub initial_load: DelayRange,
    /// Before the warm-up scrolls begin.
    pub before_harvest: DelayRange,
    /// After each warm-up scroll.
    pub pre_scroll: DelayRange,
    /// After each harvest scroll.
    pub scroll_settle: DelayRange,
    /// Between a scroll attempt and measuring whether it moved.
    pub scroll_check: DelayRange,
    /// Around clicks on in-review "more" controls.
    pub click_settle: DelayRange,
    /// After the "more reviews" control was clicked.
    pub expand_settle: DelayRange,
    /// Between consecutive image downloads.
    pub image_gap: DelayRange,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            initial_load: DelayRange::fixed(5000),
            before_harvest: DelayRange::fixed(3000),
            pre_scroll: DelayRange::new(500, 1000),
            scroll_settle: DelayRange::new(1000, 2000),
            scroll_check: DelayRange::fixed(300),
            click_settle: DelayRange::fixed(300),
            expand_settle: DelayRange::fixed(1500),
            image_gap: DelayRange::new(500, 1500),
        }
    }
}

impl Pacing {
    /// No waits at all; used against in-memory pages.
    pub fn none() -> Self {
        Self {
            initial_load: DelayRange::ZERO,
            before_harvest: DelayRange::ZERO,
            pre_scroll: DelayRange::ZERO,
            scroll_settle: DelayRange::ZERO,
            scroll_check: DelayRange::ZERO,
            click_settle: DelayRange::ZERO,
            expand_settle: DelayRange::ZERO,
            image_gap: DelayRange::ZERO,
        }
    }
}

/// Sleep for a duration drawn from `range`.
pub async fn pause(range: DelayRange) {
    if range.is_zero() {
        return;
    }
    tokio::time::sleep(range.sample()).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_stays_in_range() {
        let range = DelayRange::new(10, 20);
        for _ in 0..100 {
            let d = range.sample();
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(20));
        }
    }

    #[test]
    fn test_reversed_range_is_fixed() {
        assert_eq!(DelayRange::new(50, 10).sample(), Duration::from_millis(50));
    }

    #[test]
    fn test_range_reads_as_pair() {
        let pacing: Pacing = toml::from_str("scroll_settle = [200, 400]").unwrap();
        assert_eq!(pacing.scroll_settle, DelayRange::new(200, 400));
        assert_eq!(pacing.image_gap, Pacing::default().image_gap);
    }
}
