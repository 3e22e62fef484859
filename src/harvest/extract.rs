//! Field extraction from a single review element.
//!
//! Every field has a default, so extraction only fails when the browser
//! session itself is gone.

use tracing::trace;

use super::ledger::FingerprintSource;
use super::matcher::{first_match, first_value};
use super::selectors::{
    EXPAND_REVIEW, RATING, REVIEWER_NAME, REVIEWER_NAME_FALLBACK, REVIEW_DATE, REVIEW_TEXT,
};
use crate::driver::{DriverResult, ElementRef, PageDriver};
use crate::models::ReviewFields;
use crate::pacing::{pause, Pacing};

pub const UNKNOWN_REVIEWER: &str = "Unknown";
pub const UNKNOWN_DATE: &str = "unknown";

/// Lines of the element's own text shorter than this never stand in for
/// the review body.
const FALLBACK_LINE_MIN_CHARS: usize = 20;

/// Gather what [`FingerprintSource::fingerprint`] needs, reading as little
/// as possible: a site id short-circuits the text lookups.
pub async fn fingerprint_source(
    driver: &dyn PageDriver,
    el: &ElementRef,
) -> DriverResult<FingerprintSource> {
    let review_id = driver.attribute(el, "data-review-id").await?;
    if review_id.as_deref().is_some_and(|id| !id.trim().is_empty()) {
        return Ok(FingerprintSource {
            review_id,
            ..Default::default()
        });
    }

    Ok(FingerprintSource {
        review_id,
        name: first_value(driver, Some(el), &REVIEWER_NAME).await?,
        text: first_value(driver, Some(el), &REVIEW_TEXT).await?,
        visible_text: recover(driver.text(el).await, String::new())?,
    })
}

/// Click the review's own "more" control so the full text renders.
pub async fn expand_review(
    driver: &dyn PageDriver,
    el: &ElementRef,
    pacing: &Pacing,
) -> DriverResult<bool> {
    let buttons = first_match(driver, Some(el), EXPAND_REVIEW).await?;
    let Some(button) = buttons.first() else {
        return Ok(false);
    };

    pause(pacing.click_settle).await;
    let clicked = recover(driver.click(button).await.map(|_| true), false)?;
    pause(pacing.click_settle).await;
    Ok(clicked)
}

/// Read every field, substituting defaults for whatever is missing.
pub async fn extract_fields(
    driver: &dyn PageDriver,
    el: &ElementRef,
    default_rating: Option<u8>,
) -> DriverResult<ReviewFields> {
    let scope = Some(el);

    let reviewer_name = match first_value(driver, scope, &REVIEWER_NAME).await? {
        Some(name) => name,
        None => first_value(driver, scope, &REVIEWER_NAME_FALLBACK)
            .await?
            .unwrap_or_else(|| UNKNOWN_REVIEWER.to_string()),
    };

    let rating = first_value(driver, scope, &RATING)
        .await?
        .or(default_rating);

    let review_text = match first_value(driver, scope, &REVIEW_TEXT).await? {
        Some(text) => text,
        None => {
            let visible = recover(driver.text(el).await, String::new())?;
            longest_line(&visible).unwrap_or_default()
        }
    };

    let review_date = first_value(driver, scope, &REVIEW_DATE)
        .await?
        .unwrap_or_else(|| UNKNOWN_DATE.to_string());

    Ok(ReviewFields {
        reviewer_name,
        rating,
        review_text,
        review_date,
    })
}

/// Longest trimmed line over the minimum length; the first one wins ties.
pub fn longest_line(text: &str) -> Option<String> {
    let mut best: Option<&str> = None;
    for line in text.lines().map(str::trim) {
        let len = line.chars().count();
        if len > FALLBACK_LINE_MIN_CHARS && best.map_or(true, |b| len > b.chars().count()) {
            best = Some(line);
        }
    }
    best.map(str::to_string)
}

/// Swap a transient failure for `default`; keep fatal ones.
fn recover<T>(result: DriverResult<T>, default: T) -> DriverResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_transient() => {
            trace!("Using default after {}", e);
            Ok(default)
        }
        Err(e) => Err(e),
    }
}
