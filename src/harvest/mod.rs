//! The scroll/extract/dedup loop.
//!
//! A run goes through: locate the scroll region, warm-up scrolls, one
//! "more reviews" expansion, then cycles of scroll, extract and decide until
//! a [`StopReason`] fires. Everything is sequential; progress is published
//! on an optional event channel.

pub mod extract;
pub mod filter;
pub mod ledger;
pub mod matcher;
pub mod panel;
pub mod selectors;
pub mod state;

pub use filter::ContentFilter;
pub use ledger::{DedupLedger, FingerprintSource, ImageCache, ReviewFingerprint};
pub use panel::ScrollOutcome;
pub use state::{HarvestState, StopReason};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::HarvestSettings;
use crate::driver::{DriverError, DriverResult, ElementRef, PageDriver};
use crate::images::ImageFetcher;
use crate::models::ReviewRecord;
use crate::pacing::{pause, Pacing};

/// Failures that end a harvest before anything was collected.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("no scrollable review panel or page body found")]
    NoScrollRegion,

    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Progress notifications for the UI layer.
#[derive(Debug, Clone)]
pub enum HarvestEvent {
    Started {
        target: usize,
    },
    PreScroll {
        done: usize,
        total: usize,
        clicked: bool,
    },
    Scrolled {
        cycle: usize,
        outcome: ScrollOutcome,
    },
    ReviewsVisible {
        cycle: usize,
        count: usize,
    },
    Accepted {
        sequence_id: usize,
        reviewer: String,
        images: usize,
    },
    Filtered {
        reviewer: String,
    },
    CycleFinished {
        cycle: usize,
        added: usize,
        collected: usize,
        empty_streak: usize,
    },
    Finished {
        collected: usize,
        reason: StopReason,
    },
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct HarvestStats {
    /// Unseen review elements that went through extraction.
    pub evaluated: usize,
    /// Review elements skipped because their fingerprint was already seen.
    pub duplicates_skipped: usize,
    /// Extracted reviews rejected by the content filter.
    pub filtered_out: usize,
    pub images_downloaded: usize,
    pub image_cache_hits: usize,
    pub images_reused: usize,
    pub image_failures: usize,
    pub pre_scroll_clicks: usize,
    pub scroll_count: usize,
    pub stop_reason: StopReason,
    /// Set when the run ended on a lost session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatal_error: Option<String>,
}

impl Default for HarvestStats {
    fn default() -> Self {
        Self {
            evaluated: 0,
            duplicates_skipped: 0,
            filtered_out: 0,
            images_downloaded: 0,
            image_cache_hits: 0,
            images_reused: 0,
            image_failures: 0,
            pre_scroll_clicks: 0,
            scroll_count: 0,
            stop_reason: StopReason::TargetReached,
            fatal_error: None,
        }
    }
}

/// Reviews plus statistics from one run.
#[derive(Debug, Clone)]
pub struct HarvestReport {
    pub reviews: Vec<ReviewRecord>,
    pub stats: HarvestStats,
}

impl HarvestReport {
    /// Empty report for a run that failed before harvesting started.
    pub fn failed(error: &HarvestError) -> Self {
        Self {
            reviews: Vec::new(),
            stats: HarvestStats {
                stop_reason: StopReason::SessionLost,
                fatal_error: Some(error.to_string()),
                ..HarvestStats::default()
            },
        }
    }
}

/// Drives one harvest against a page.
pub struct Harvester<'a> {
    driver: &'a dyn PageDriver,
    settings: HarvestSettings,
    pacing: Pacing,
    filter: ContentFilter,
    images: Option<ImageFetcher>,
    events: Option<mpsc::Sender<HarvestEvent>>,
}

impl<'a> Harvester<'a> {
    pub fn new(driver: &'a dyn PageDriver, settings: HarvestSettings, pacing: Pacing) -> Self {
        Self {
            driver,
            settings,
            pacing,
            filter: ContentFilter::All,
            images: None,
            events: None,
        }
    }

    pub fn with_filter(mut self, filter: ContentFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Download photos for accepted reviews.
    pub fn with_images(mut self, fetcher: ImageFetcher) -> Self {
        self.images = Some(fetcher);
        self
    }

    pub fn with_events(mut self, events: mpsc::Sender<HarvestEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Open `url` and harvest its reviews.
    pub async fn run(&self, url: &str) -> Result<HarvestReport, HarvestError> {
        info!("Opening {}", url);
        self.driver.navigate(url).await?;
        pause(self.pacing.initial_load).await;
        self.harvest().await
    }

    /// Harvest from the page already loaded in the driver.
    pub async fn harvest(&self) -> Result<HarvestReport, HarvestError> {
        let mut state = HarvestState::new(&self.settings);
        let mut ledger = DedupLedger::new();
        let mut stats = HarvestStats::default();

        self.emit(HarvestEvent::Started {
            target: state.target_count,
        })
        .await;

        if let Some(reason) = state.initial_stop() {
            info!("Nothing to do ({})", reason);
            return Ok(self.finish(state, stats, reason).await);
        }

        let mut region = panel::locate_scroll_region(self.driver).await?;

        pause(self.pacing.before_harvest).await;
        stats.pre_scroll_clicks = self.pre_scroll(&mut region).await?;

        if panel::click_more_reviews(self.driver, &self.pacing).await? {
            info!("Expanded the review list");
            match panel::relocate(self.driver, &mut region).await {
                Ok(()) => {}
                Err(e) if e.is_transient() => debug!("Keeping the old scroll region: {}", e),
                Err(e) => return Err(e.into()),
            }
        } else {
            debug!("No \"more reviews\" control, list is likely already expanded");
        }

        let reason = loop {
            state.begin_cycle();
            debug!(
                "Cycle {}: {}/{} collected",
                state.scroll_count,
                state.collected().len(),
                state.target_count
            );

            match self.cycle(&mut region, &mut state, &mut ledger, &mut stats).await {
                Ok(added) => {
                    let decision = state.decide(added);
                    self.emit(HarvestEvent::CycleFinished {
                        cycle: state.scroll_count,
                        added,
                        collected: state.collected().len(),
                        empty_streak: state.consecutive_empty_scrolls,
                    })
                    .await;
                    if let Some(reason) = decision {
                        break reason;
                    }
                }
                Err(e) => {
                    error!("Browser session lost in cycle {}: {}", state.scroll_count, e);
                    stats.fatal_error = Some(e.to_string());
                    break StopReason::SessionLost;
                }
            }
        };

        Ok(self.finish(state, stats, reason).await)
    }

    /// Warm-up scrolls that coax the panel into loading, pressing "more
    /// reviews" whenever it appears. Returns the number of clicks.
    async fn pre_scroll(&self, region: &mut ElementRef) -> DriverResult<usize> {
        let total = self.settings.pre_scroll_cycles;
        let mut clicks = 0;

        for i in 0..total {
            match self.pre_scroll_step(region).await {
                Ok(clicked) => {
                    if clicked {
                        clicks += 1;
                    }
                    self.emit(HarvestEvent::PreScroll {
                        done: i + 1,
                        total,
                        clicked,
                    })
                    .await;
                }
                Err(e) if e.is_transient() => debug!("Warm-up scroll {} failed: {}", i + 1, e),
                Err(e) => return Err(e),
            }
        }

        info!(
            "Warm-up done: {} scrolls, {} \"more reviews\" clicks",
            total, clicks
        );
        Ok(clicks)
    }

    async fn pre_scroll_step(&self, region: &mut ElementRef) -> DriverResult<bool> {
        let moved = panel::scroll_region(
            self.driver,
            region,
            self.settings.scroll_distance,
            self.pacing.pre_scroll,
        )
        .await?;
        if moved.is_none() {
            debug!("Warm-up scroll did not move the panel");
        }
        panel::click_more_reviews(self.driver, &self.pacing).await
    }

    /// One scroll + extract pass. Returns the number of accepted reviews.
    async fn cycle(
        &self,
        region: &mut ElementRef,
        state: &mut HarvestState,
        ledger: &mut DedupLedger,
        stats: &mut HarvestStats,
    ) -> DriverResult<usize> {
        let outcome = panel::advance(
            self.driver,
            region,
            self.settings.scroll_distance,
            self.pacing.scroll_check,
        )
        .await?;
        if !outcome.moved() {
            debug!("Scroll cycle {}: {}", state.scroll_count, outcome);
        }
        self.emit(HarvestEvent::Scrolled {
            cycle: state.scroll_count,
            outcome,
        })
        .await;
        pause(self.pacing.scroll_settle).await;

        let elements = matcher::first_match(self.driver, None, selectors::REVIEWS).await?;
        self.emit(HarvestEvent::ReviewsVisible {
            cycle: state.scroll_count,
            count: elements.len(),
        })
        .await;

        let mut added = 0;
        for el in &elements {
            if state.remaining() == 0 {
                debug!("Target met mid-cycle, leaving remaining elements");
                break;
            }
            match self.evaluate(el, state, ledger, stats).await {
                Ok(true) => added += 1,
                Ok(false) => {}
                Err(e) if e.is_transient() => debug!("Skipping review element {}: {}", el, e),
                Err(e) => return Err(e),
            }
        }

        Ok(added)
    }

    /// Fingerprint, extract, filter and accept one review element.
    async fn evaluate(
        &self,
        el: &ElementRef,
        state: &mut HarvestState,
        ledger: &mut DedupLedger,
        stats: &mut HarvestStats,
    ) -> DriverResult<bool> {
        let fp = extract::fingerprint_source(self.driver, el)
            .await?
            .fingerprint();
        if !ledger.is_new(&fp) {
            stats.duplicates_skipped += 1;
            return Ok(false);
        }

        extract::expand_review(self.driver, el, &self.pacing).await?;
        let fields = extract::extract_fields(self.driver, el, self.settings.default_rating).await?;
        stats.evaluated += 1;
        ledger.mark_seen(fp);

        if !self.filter.accepts(&fields.review_text) {
            debug!("Filtered out review by {}", fields.reviewer_name);
            stats.filtered_out += 1;
            self.emit(HarvestEvent::Filtered {
                reviewer: fields.reviewer_name,
            })
            .await;
            return Ok(false);
        }

        let sequence_id = state.next_sequence_id();
        let (images, image_dir) = match &self.images {
            Some(fetcher) => {
                let outcome = fetcher
                    .process(self.driver, el, sequence_id, ledger.images_mut())
                    .await?;
                stats.images_downloaded += outcome.downloaded;
                stats.image_cache_hits += outcome.cache_hits;
                stats.images_reused += outcome.reused;
                stats.image_failures += outcome.failed;
                (outcome.files, Some(fetcher.target_dir()))
            }
            None => (Vec::new(), None),
        };

        let record = ReviewRecord::new(fields, sequence_id, images, image_dir);
        info!(
            "Review {}: {} ({} photo(s))",
            sequence_id,
            record.reviewer_name,
            record.images.len()
        );
        let event = HarvestEvent::Accepted {
            sequence_id,
            reviewer: record.reviewer_name.clone(),
            images: record.images.len(),
        };

        if !state.accept(record) {
            warn!("Review {} arrived after the target was met", sequence_id);
            return Ok(false);
        }
        self.emit(event).await;
        Ok(true)
    }

    async fn finish(
        &self,
        state: HarvestState,
        mut stats: HarvestStats,
        reason: StopReason,
    ) -> HarvestReport {
        stats.scroll_count = state.scroll_count;
        stats.stop_reason = reason;
        let reviews = state.finish();

        info!(
            "Harvest finished: {} review(s), {} scroll(s), {}",
            reviews.len(),
            stats.scroll_count,
            reason
        );
        self.emit(HarvestEvent::Finished {
            collected: reviews.len(),
            reason,
        })
        .await;

        HarvestReport { reviews, stats }
    }

    async fn emit(&self, event: HarvestEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event).await;
        }
    }
}
