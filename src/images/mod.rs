//! Review photo downloads.
//!
//! Each accepted review contributes up to `max_per_review` photos. URLs are
//! resolved to full resolution, fetched with bounded retries, verified as
//! decodable images and deduplicated across reviews through the
//! [`ImageCache`].

mod source;
pub mod url;

pub use source::{FetchedImage, HttpImageSource, ImageError, ImageSource};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::ImageSettings;
use crate::driver::{DriverResult, ElementRef, PageDriver};
use crate::harvest::ledger::ImageCache;
use crate::harvest::matcher::first_match;
use crate::harvest::selectors::PHOTO_BUTTONS;
use crate::pacing::{pause, DelayRange};

use self::url::{extract_background_url, image_file_name, to_high_res};

/// Result of processing one review's photos.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageOutcome {
    /// File names, in photo order, of every slot that produced a file.
    pub files: Vec<String>,
    /// Fetched over the network.
    pub downloaded: usize,
    /// Copied from a file saved for an earlier review.
    pub cache_hits: usize,
    /// Target file was already on disk.
    pub reused: usize,
    pub failed: usize,
}

/// How a single slot was filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stored {
    Downloaded,
    CacheHit,
    Existing,
}

/// Resolves, downloads and verifies review photos into one directory.
pub struct ImageFetcher {
    source: Arc<dyn ImageSource>,
    settings: ImageSettings,
    gap: DelayRange,
    target_dir: PathBuf,
}

impl ImageFetcher {
    pub fn new(
        source: Arc<dyn ImageSource>,
        settings: ImageSettings,
        gap: DelayRange,
        target_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            settings,
            gap,
            target_dir: target_dir.into(),
        }
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    /// Collect and store the photos of `review`, numbering files with
    /// `sequence_id`. Individual photo failures only drop that slot.
    pub async fn process(
        &self,
        driver: &dyn PageDriver,
        review: &ElementRef,
        sequence_id: usize,
        cache: &mut ImageCache,
    ) -> DriverResult<ImageOutcome> {
        let urls = self.collect_urls(driver, review).await?;
        if urls.is_empty() {
            debug!("Review {} has no photos", sequence_id);
            return Ok(ImageOutcome::default());
        }

        if let Err(e) = tokio::fs::create_dir_all(&self.target_dir).await {
            warn!(
                "Cannot create image directory {}: {}",
                self.target_dir.display(),
                e
            );
            return Ok(ImageOutcome {
                failed: urls.len(),
                ..Default::default()
            });
        }

        Ok(self.store_all(&urls, sequence_id, cache).await)
    }

    /// Full-resolution URLs of the review's photo thumbnails.
    pub async fn collect_urls(
        &self,
        driver: &dyn PageDriver,
        review: &ElementRef,
    ) -> DriverResult<Vec<String>> {
        let buttons = first_match(driver, Some(review), PHOTO_BUTTONS).await?;
        let mut urls = Vec::new();

        for button in &buttons {
            if urls.len() >= self.settings.max_per_review {
                break;
            }
            let style = match driver.attribute(button, "style").await {
                Ok(style) => style.unwrap_or_default(),
                Err(e) if e.is_transient() => {
                    debug!("Cannot read photo style: {}", e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            match extract_background_url(&style) {
                Some(url) => urls.push(to_high_res(&url)),
                None => debug!("No background URL in photo style"),
            }
        }

        Ok(urls)
    }

    /// Store each URL as `review_<seq>_img_<n>.jpg` in the target directory.
    pub async fn store_all(
        &self,
        urls: &[String],
        sequence_id: usize,
        cache: &mut ImageCache,
    ) -> ImageOutcome {
        let mut outcome = ImageOutcome::default();

        for (i, url) in urls.iter().enumerate() {
            let name = image_file_name(sequence_id, i + 1);
            let path = self.target_dir.join(&name);

            match self.store_one(url, &path, cache).await {
                Ok(Stored::Downloaded) => {
                    info!("Saved {}", name);
                    outcome.downloaded += 1;
                    outcome.files.push(name);
                    pause(self.gap).await;
                }
                Ok(Stored::CacheHit) => {
                    debug!("{} copied from an earlier download", name);
                    outcome.cache_hits += 1;
                    outcome.files.push(name);
                }
                Ok(Stored::Existing) => {
                    debug!("{} already on disk", name);
                    outcome.reused += 1;
                    outcome.files.push(name);
                }
                Err(e) => {
                    warn!("Dropping photo {} of review {}: {}", i + 1, sequence_id, e);
                    outcome.failed += 1;
                    pause(self.gap).await;
                }
            }
        }

        outcome
    }

    async fn store_one(
        &self,
        url: &str,
        path: &Path,
        cache: &mut ImageCache,
    ) -> Result<Stored, ImageError> {
        if let Some(cached) = cache.lookup(url) {
            if cached != path {
                tokio::fs::copy(&cached, path).await?;
            }
            return Ok(Stored::CacheHit);
        }

        if tokio::fs::try_exists(path).await? {
            cache.record(url, path);
            return Ok(Stored::Existing);
        }

        self.download(url, path).await?;
        cache.record(url, path);
        Ok(Stored::Downloaded)
    }

    /// Fetch `url` into `path`, retrying transport and status failures.
    pub async fn download(&self, url: &str, path: &Path) -> Result<(), ImageError> {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.try_download(url, path).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = backoff_delay(self.settings.backoff_base_ms, attempt);
                    warn!(
                        "Download attempt {}/{} failed: {}, retrying in {:?}",
                        attempt, max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_download(&self, url: &str, path: &Path) -> Result<(), ImageError> {
        let fetched = self.source.fetch(url).await?;
        ensure_image(&fetched)?;

        tokio::fs::write(path, &fetched.bytes).await?;
        if let Err(e) = image::load_from_memory(&fetched.bytes) {
            let _ = tokio::fs::remove_file(path).await;
            return Err(ImageError::Corrupt(e.to_string()));
        }
        Ok(())
    }
}

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`.
pub fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor))
}

/// Accept a declared image content type, or sniff the bytes when the
/// server sent none.
fn ensure_image(fetched: &FetchedImage) -> Result<(), ImageError> {
    match &fetched.content_type {
        Some(content_type) if content_type.to_ascii_lowercase().starts_with("image/") => Ok(()),
        Some(content_type) => Err(ImageError::NotImage(content_type.clone())),
        None => match infer::get(&fetched.bytes) {
            Some(kind) if kind.matcher_type() == infer::MatcherType::Image => Ok(()),
            Some(kind) => Err(ImageError::NotImage(kind.mime_type().to_string())),
            None => Err(ImageError::NotImage("unknown".to_string())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff_delay(1000, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(1000, 2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(1000, 3), Duration::from_millis(4000));
        assert_eq!(backoff_delay(0, 5), Duration::ZERO);
        assert_eq!(backoff_delay(u64::MAX, 80), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_ensure_image_checks_header_then_bytes() {
        let png_magic = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

        let declared = FetchedImage {
            content_type: Some("image/jpeg".into()),
            bytes: Vec::new(),
        };
        assert!(ensure_image(&declared).is_ok());

        let html = FetchedImage {
            content_type: Some("text/html; charset=utf-8".into()),
            bytes: png_magic.clone(),
        };
        assert!(matches!(ensure_image(&html), Err(ImageError::NotImage(_))));

        let sniffed = FetchedImage {
            content_type: None,
            bytes: png_magic,
        };
        assert!(ensure_image(&sniffed).is_ok());

        let unknown = FetchedImage {
            content_type: None,
            bytes: b"<html></html>".to_vec(),
        };
        assert!(ensure_image(&unknown).is_err());
    }
}
