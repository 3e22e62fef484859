//! Review panel navigation: locating the scroll region, scrolling it, and
//! pressing the "more reviews" control.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::matcher::first_match;
use super::selectors::{MORE_REVIEWS, PAGE_BODY, SCROLL_CONTAINERS};
use super::HarvestError;
use crate::driver::{DriverError, DriverResult, ElementRef, Key, PageDriver};
use crate::pacing::{pause, DelayRange, Pacing};

/// Which scroll strategy took effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollOutcome {
    /// The review container's own offset advanced.
    Container { from: i64, to: i64 },
    /// The container was stuck but the window moved.
    Window { from: i64, to: i64 },
    /// Offsets were stuck; a PageDown key press was sent instead.
    Keyboard,
    /// Nothing worked this cycle.
    Stuck,
}

impl ScrollOutcome {
    pub fn moved(&self) -> bool {
        matches!(self, Self::Container { .. } | Self::Window { .. })
    }
}

impl fmt::Display for ScrollOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Container { from, to } => write!(f, "panel {} -> {}", from, to),
            Self::Window { from, to } => write!(f, "page {} -> {}", from, to),
            Self::Keyboard => f.write_str("keyboard"),
            Self::Stuck => f.write_str("stuck"),
        }
    }
}

/// Find the element to scroll: the first container candidate whose first
/// match overflows, else the document body.
pub async fn locate_scroll_region(driver: &dyn PageDriver) -> Result<ElementRef, HarvestError> {
    for candidate in SCROLL_CONTAINERS {
        let found = match driver.find(None, &candidate.selector).await {
            Ok(found) => found,
            Err(e) if e.is_transient() => {
                debug!("Skipping {}: {}", candidate.selector, e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let Some(first) = found.into_iter().next() else {
            continue;
        };

        match driver.scroll_extent(&first).await {
            Ok((scroll_height, client_height)) if scroll_height > client_height => {
                info!(
                    "Scroll region {} (scrollHeight {}, clientHeight {})",
                    candidate.selector, scroll_height, client_height
                );
                return Ok(first);
            }
            Ok((scroll_height, client_height)) => debug!(
                "{} does not overflow (scrollHeight {}, clientHeight {})",
                candidate.selector, scroll_height, client_height
            ),
            Err(e) if e.is_transient() => debug!("Skipping {}: {}", candidate.selector, e),
            Err(e) => return Err(e.into()),
        }
    }

    warn!("No scrollable review panel found, falling back to page body");
    match driver.find(None, &PAGE_BODY.selector).await {
        Ok(found) => found.into_iter().next().ok_or(HarvestError::NoScrollRegion),
        Err(e) if e.is_transient() => Err(HarvestError::NoScrollRegion),
        Err(e) => Err(e.into()),
    }
}

/// Locate the scroll region again after the panel re-rendered.
///
/// `region` keeps its old value when nothing can be found.
pub async fn relocate(driver: &dyn PageDriver, region: &mut ElementRef) -> DriverResult<()> {
    match locate_scroll_region(driver).await {
        Ok(fresh) => {
            if fresh != *region {
                debug!("Scroll region is now {}", fresh);
            }
            *region = fresh;
            Ok(())
        }
        Err(HarvestError::Driver(e)) => Err(e),
        Err(HarvestError::NoScrollRegion) => Err(DriverError::NotFound),
    }
}

/// Scroll `region` and report the offset change. A stale handle is
/// replaced by a fresh lookup and the scroll retried once.
pub async fn scroll_region(
    driver: &dyn PageDriver,
    region: &mut ElementRef,
    distance: i64,
    check: DelayRange,
) -> DriverResult<Option<(i64, i64)>> {
    match scroll_and_measure(driver, Some(&*region), distance, check).await {
        Err(DriverError::Stale(id)) => {
            debug!("Scroll region {} went stale, locating it again", id);
            relocate(driver, region).await?;
            scroll_and_measure(driver, Some(&*region), distance, check).await
        }
        other => other,
    }
}

/// Scroll `region` by `distance`, falling back to the window and then to a
/// PageDown key press. Only a lost session is an error.
pub async fn advance(
    driver: &dyn PageDriver,
    region: &mut ElementRef,
    distance: i64,
    check: DelayRange,
) -> DriverResult<ScrollOutcome> {
    match scroll_region(driver, region, distance, check).await {
        Ok(Some((from, to))) => return Ok(ScrollOutcome::Container { from, to }),
        Ok(None) => debug!("Panel offset unchanged, scrolling the page"),
        Err(e) if e.is_transient() => debug!("Panel scroll failed: {}", e),
        Err(e) => return Err(e),
    }

    match scroll_and_measure(driver, None, distance, check).await {
        Ok(Some((from, to))) => return Ok(ScrollOutcome::Window { from, to }),
        Ok(None) => debug!("Page offset unchanged, pressing PageDown"),
        Err(e) if e.is_transient() => debug!("Page scroll failed: {}", e),
        Err(e) => return Err(e),
    }

    match driver.send_keys(region, Key::PageDown).await {
        Ok(()) => Ok(ScrollOutcome::Keyboard),
        Err(e) if e.is_transient() => {
            warn!("All scroll strategies failed: {}", e);
            Ok(ScrollOutcome::Stuck)
        }
        Err(e) => Err(e),
    }
}

async fn scroll_and_measure(
    driver: &dyn PageDriver,
    target: Option<&ElementRef>,
    distance: i64,
    check: DelayRange,
) -> DriverResult<Option<(i64, i64)>> {
    let before = driver.scroll_offset(target).await?;
    driver.scroll_by(target, distance).await?;
    pause(check).await;
    let after = driver.scroll_offset(target).await?;
    Ok((after != before).then_some((before, after)))
}

/// Click the panel's "more reviews" control if one is showing.
///
/// Returns whether a click landed. Absence of the control is normal.
pub async fn click_more_reviews(driver: &dyn PageDriver, pacing: &Pacing) -> DriverResult<bool> {
    let buttons = first_match(driver, None, MORE_REVIEWS).await?;
    let Some(button) = buttons.first() else {
        return Ok(false);
    };

    pause(pacing.click_settle).await;
    match driver.click(button).await {
        Ok(()) => {
            debug!("Clicked \"more reviews\"");
            pause(pacing.expand_settle).await;
            Ok(true)
        }
        Err(e) if e.is_transient() => {
            debug!("\"More reviews\" click failed: {}", e);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
