//! Run configuration.
//!
//! Settings come from built-in defaults, optionally overlaid by a TOML file,
//! then by command line flags.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::browser::BrowserEngineConfig;
use crate::pacing::Pacing;

/// Listing scraped when no URL is given.
pub const DEFAULT_LISTING_URL: &str = "https://www.google.com/maps/place/%E7%AF%89%E5%AE%9C%E7%B3%BB%E7%B5%B1%E5%82%A2%E4%BF%B1-%E6%A1%83%E5%9C%92%E5%BA%97/@24.9948316,121.2836128,17z/data=!4m8!3m7!1s0x34681f295669592d:0xd8650cf553030107!8m2!3d24.9948316!4d121.2836128!9m1!1b1!16s%2Fg%2F11rb4r3796?entry=ttu";

/// Business name used in output and image directory names.
pub const DEFAULT_BUSINESS_NAME: &str = "築宜系統傢俱_桃園店";

/// Config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "mapreviews.toml";

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "MAPREVIEWS_CONFIG";

/// Top-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Listing URL to harvest.
    pub url: String,
    /// Human-readable name of the listing.
    pub business_name: String,
    /// Directory receiving the JSON file and the `images/` tree.
    pub output_dir: PathBuf,
    pub harvest: HarvestSettings,
    pub pacing: Pacing,
    pub images: ImageSettings,
    pub browser: BrowserEngineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            url: DEFAULT_LISTING_URL.to_string(),
            business_name: DEFAULT_BUSINESS_NAME.to_string(),
            output_dir: PathBuf::from("."),
            harvest: HarvestSettings::default(),
            pacing: Pacing::default(),
            images: ImageSettings::default(),
            browser: BrowserEngineConfig::default(),
        }
    }
}

/// Harvest loop bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestSettings {
    /// Reviews wanted.
    pub target_count: usize,
    /// Hard cap on harvest scrolls.
    pub max_total_scrolls: usize,
    /// Consecutive cycles without an accepted review before giving up.
    pub empty_scroll_threshold: usize,
    /// Warm-up scrolls before harvesting starts.
    pub pre_scroll_cycles: usize,
    /// Pixels per scroll step.
    pub scroll_distance: i64,
    /// Rating recorded when the review shows no star rating. Written as
    /// `0` in config files to leave the rating absent.
    #[serde(with = "rating_setting")]
    pub default_rating: Option<u8>,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            target_count: 30,
            max_total_scrolls: 50,
            empty_scroll_threshold: 20,
            pre_scroll_cycles: 30,
            scroll_distance: 300,
            default_rating: Some(5),
        }
    }
}

/// `Option<u8>` encoded as `0..=5`, with `0` standing for "no rating".
mod rating_setting {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<u8>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(value.unwrap_or(0))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u8>, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(None),
            n @ 1..=5 => Ok(Some(n)),
            n => Err(D::Error::custom(format!(
                "default_rating must be between 0 and 5, got {}",
                n
            ))),
        }
    }
}

/// Review photo downloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub enabled: bool,
    /// Photos kept per review.
    pub max_per_review: usize,
    /// Download attempts per photo.
    pub max_attempts: u32,
    /// First retry delay; doubles on each further retry.
    pub backoff_base_ms: u64,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// User agent for downloads. Defaults to a desktop browser string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_per_review: 3,
            max_attempts: 3,
            backoff_base_ms: 1000,
            request_timeout_secs: 30,
            user_agent: None,
        }
    }
}

impl Settings {
    /// Load settings, returning the file they came from if any.
    ///
    /// Lookup order: explicit path, `MAPREVIEWS_CONFIG`, `./mapreviews.toml`.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<(Self, Option<PathBuf>)> {
        let candidate = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => std::env::var_os(CONFIG_ENV_VAR)
                .map(PathBuf::from)
                .or_else(|| {
                    let local = PathBuf::from(CONFIG_FILE_NAME);
                    local.exists().then_some(local)
                }),
        };

        let Some(path) = candidate else {
            debug!("No config file found, using defaults");
            return Ok((Self::default(), None));
        };

        let path = expand_path(&path);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut settings = Self::from_toml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        settings.output_dir = expand_path(&settings.output_dir);
        info!("Loaded config from {}", path.display());

        Ok((settings, Some(path)))
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Expand `~` and environment variables in a path.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_run_parameters() {
        let settings = Settings::default();
        assert_eq!(settings.harvest.target_count, 30);
        assert_eq!(settings.harvest.max_total_scrolls, 50);
        assert_eq!(settings.harvest.empty_scroll_threshold, 20);
        assert_eq!(settings.harvest.default_rating, Some(5));
        assert_eq!(settings.images.max_per_review, 3);
        assert!(!settings.images.enabled);
        assert!(!settings.browser.headless);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings = Settings::from_toml(
            r#"
            business_name = "Corner Cafe"

            [harvest]
            target_count = 12

            [images]
            enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(settings.business_name, "Corner Cafe");
        assert_eq!(settings.harvest.target_count, 12);
        assert_eq!(settings.harvest.scroll_distance, 300);
        assert!(settings.images.enabled);
        assert_eq!(settings.images.max_attempts, 3);
        assert_eq!(settings.url, DEFAULT_LISTING_URL);
    }

    #[test]
    fn test_settings_survive_toml_round_trip() {
        let mut settings = Settings::default();
        settings.harvest.default_rating = None;
        let text = settings.to_toml().unwrap();
        assert!(text.contains("default_rating = 0"));
        let back = Settings::from_toml(&text).unwrap();
        assert_eq!(back.harvest.default_rating, None);
        assert_eq!(back.pacing.scroll_settle, settings.pacing.scroll_settle);

        let text = Settings::default().to_toml().unwrap();
        let back = Settings::from_toml(&text).unwrap();
        assert_eq!(back.harvest.default_rating, Some(5));
    }

    #[test]
    fn test_default_rating_zero_means_absent() {
        let settings = Settings::from_toml("[harvest]\ndefault_rating = 0\n").unwrap();
        assert_eq!(settings.harvest.default_rating, None);

        let settings = Settings::from_toml("[harvest]\ndefault_rating = 3\n").unwrap();
        assert_eq!(settings.harvest.default_rating, Some(3));

        assert!(Settings::from_toml("[harvest]\ndefault_rating = 6\n").is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[harvest]\nmax_total_scrolls = 7\n").unwrap();

        let (settings, source) = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.harvest.max_total_scrolls, 7);
        assert_eq!(source.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(Settings::load(Some(&missing)).is_err());
    }
}
