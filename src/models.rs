//! Review record written to the output file.

use std::path::Path;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Fields read from one review element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewFields {
    pub reviewer_name: String,
    pub rating: Option<u8>,
    pub review_text: String,
    pub review_date: String,
}

/// One accepted review. Built once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub reviewer_name: String,
    pub rating: Option<u8>,
    pub review_text: String,
    /// Relative time as displayed by the site, e.g. "3 週前".
    pub review_date: String,
    pub scraped_at: DateTime<Local>,
    /// 1-based position in this run's output.
    pub sequence_id: usize,
    /// File names under `image_directory`.
    pub images: Vec<String>,
    pub total_images: usize,
    pub images_downloaded: bool,
    /// Empty when image downloads were disabled.
    pub image_directory: String,
}

impl ReviewRecord {
    pub fn new(
        fields: ReviewFields,
        sequence_id: usize,
        images: Vec<String>,
        image_directory: Option<&Path>,
    ) -> Self {
        let image_directory = image_directory
            .map(|dir| dir.display().to_string())
            .unwrap_or_default();

        Self {
            reviewer_name: fields.reviewer_name,
            rating: fields.rating,
            review_text: fields.review_text,
            review_date: fields.review_date,
            scraped_at: Local::now(),
            sequence_id,
            total_images: images.len(),
            images_downloaded: !images.is_empty(),
            images,
            image_directory,
        }
    }
}
