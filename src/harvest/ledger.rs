//! Review fingerprints and the per-run dedup ledger.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

/// Identity of a review across re-renders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReviewFingerprint {
    /// Site-assigned `data-review-id`.
    SiteId(String),
    /// Reviewer name plus the opening of the review text.
    Composite(String),
    /// Hash of the element's visible text.
    TextHash(String),
}

impl fmt::Display for ReviewFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SiteId(id) => write!(f, "review_id_{}", id),
            Self::Composite(key) => f.write_str(key),
            Self::TextHash(hash) => write!(f, "review_hash_{}", hash),
        }
    }
}

/// Raw material for a fingerprint, read from one review element.
#[derive(Debug, Clone, Default)]
pub struct FingerprintSource {
    pub review_id: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub visible_text: String,
}

impl FingerprintSource {
    pub fn fingerprint(&self) -> ReviewFingerprint {
        fingerprint(self)
    }
}

/// Composite keys use this many characters of review text.
const COMPOSITE_TEXT_CHARS: usize = 50;
/// Text hashes cover this many characters of visible text.
const HASHED_TEXT_CHARS: usize = 100;

/// Derive the fingerprint for a review. Pure and deterministic.
pub fn fingerprint(source: &FingerprintSource) -> ReviewFingerprint {
    if let Some(id) = non_blank(source.review_id.as_deref()) {
        return ReviewFingerprint::SiteId(id.to_string());
    }

    if let (Some(name), Some(text)) = (
        non_blank(source.name.as_deref()),
        non_blank(source.text.as_deref()),
    ) {
        let head: String = text.chars().take(COMPOSITE_TEXT_CHARS).collect();
        let key = format!("{}_{}", name, head).replace([' ', '\n'], "_");
        return ReviewFingerprint::Composite(key);
    }

    let head: String = source.visible_text.chars().take(HASHED_TEXT_CHARS).collect();
    let digest = Sha256::digest(head.as_bytes());
    ReviewFingerprint::TextHash(hex::encode(&digest[..8]))
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Image URL to the first file it was saved as.
#[derive(Debug, Default)]
pub struct ImageCache {
    entries: HashMap<String, PathBuf>,
}

impl ImageCache {
    /// Cached file for `url`. An entry whose file has disappeared is dropped.
    pub fn lookup(&mut self, url: &str) -> Option<PathBuf> {
        let path = self.entries.get(url)?;
        if path.exists() {
            return Some(path.clone());
        }
        debug!("Cached image {} is gone, evicting", path.display());
        self.entries.remove(url);
        None
    }

    pub fn record(&mut self, url: impl Into<String>, path: impl AsRef<Path>) {
        self.entries.insert(url.into(), path.as_ref().to_path_buf());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fingerprints already evaluated plus the image cache. Both only grow.
#[derive(Debug, Default)]
pub struct DedupLedger {
    seen: HashSet<ReviewFingerprint>,
    images: ImageCache,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_new(&self, fp: &ReviewFingerprint) -> bool {
        !self.seen.contains(fp)
    }

    /// Returns false if the fingerprint was already present.
    pub fn mark_seen(&mut self, fp: ReviewFingerprint) -> bool {
        self.seen.insert(fp)
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn images_mut(&mut self) -> &mut ImageCache {
        &mut self.images
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(id: Option<&str>, name: Option<&str>, text: Option<&str>, visible: &str) -> FingerprintSource {
        FingerprintSource {
            review_id: id.map(String::from),
            name: name.map(String::from),
            text: text.map(String::from),
            visible_text: visible.to_string(),
        }
    }

    #[test]
    fn test_site_id_takes_precedence() {
        let fp = fingerprint(&source(Some("ChdDSUhN"), Some("Amy"), Some("nice"), "x"));
        assert_eq!(fp, ReviewFingerprint::SiteId("ChdDSUhN".to_string()));
        assert_eq!(fp.to_string(), "review_id_ChdDSUhN");
    }

    #[test]
    fn test_composite_key_truncates_and_flattens() {
        let text = format!("Great service\n{}", "a".repeat(80));
        let fp = fingerprint(&source(None, Some("Amy Lin"), Some(&text), ""));
        let ReviewFingerprint::Composite(key) = &fp else {
            panic!("expected composite, got {fp:?}");
        };
        assert!(key.starts_with("Amy_Lin_Great_service_"));
        assert_eq!(key.chars().count(), "Amy Lin_".chars().count() + 50);
    }

    #[test]
    fn test_blank_fields_fall_through_to_hash() {
        let a = fingerprint(&source(Some("  "), Some("Amy"), None, "Amy\n5 stars\nlovely"));
        let b = fingerprint(&source(None, None, Some("ignored"), "Amy\n5 stars\nlovely"));
        assert!(matches!(a, ReviewFingerprint::TextHash(_)));
        assert_eq!(a, b);
        assert!(a.to_string().starts_with("review_hash_"));
    }

    #[test]
    fn test_hash_only_covers_leading_text() {
        let base = "x".repeat(100);
        let a = fingerprint(&source(None, None, None, &format!("{base}tail one")));
        let b = fingerprint(&source(None, None, None, &format!("{base}tail two")));
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let s = source(None, Some("王小明"), Some("沙發品質很好，會再回購"), "");
        assert_eq!(fingerprint(&s), fingerprint(&s.clone()));
    }

    #[test]
    fn test_mark_seen_is_monotonic() {
        let mut ledger = DedupLedger::new();
        let fp = ReviewFingerprint::SiteId("1".into());
        assert!(ledger.is_new(&fp));
        assert!(ledger.mark_seen(fp.clone()));
        assert!(!ledger.is_new(&fp));
        assert!(!ledger.mark_seen(fp));
        assert_eq!(ledger.seen_count(), 1);
    }

    #[test]
    fn test_image_cache_evicts_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("a.jpg");
        std::fs::write(&kept, b"data").unwrap();

        let mut ledger = DedupLedger::new();
        let cache = ledger.images_mut();
        cache.record("https://img/a", &kept);
        cache.record("https://img/b", dir.path().join("missing.jpg"));

        assert_eq!(cache.lookup("https://img/a"), Some(kept));
        assert_eq!(cache.lookup("https://img/b"), None);
        assert_eq!(cache.len(), 1);
    }
}
