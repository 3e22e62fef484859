//! Google Maps review harvester.
//!
//! Drives a Chromium page to scroll a listing's review panel, extracts and
//! deduplicates reviews as they load, optionally downloads review photos,
//! and writes the result as JSON.

pub mod browser;
pub mod cli;
pub mod config;
pub mod driver;
pub mod harvest;
pub mod images;
pub mod models;
pub mod output;
pub mod pacing;
pub mod user_agent;

pub use config::Settings;
pub use driver::{DriverError, ElementRef, Key, PageDriver, ScriptArg, Selector};
pub use harvest::{
    ContentFilter, HarvestError, HarvestEvent, HarvestReport, HarvestStats, Harvester, StopReason,
};
pub use images::{FetchedImage, HttpImageSource, ImageError, ImageFetcher, ImageSource};
pub use models::{ReviewFields, ReviewRecord};
