//! JSON output and on-disk naming.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::info;

use crate::models::ReviewRecord;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Make a business name safe to use as a path component.
pub fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect();

    if cleaned.is_empty() {
        "listing".to_string()
    } else {
        cleaned
    }
}

/// `<dir>/<business>_reviews_<YYYYMMDD_HHMMSS>.json`
pub fn default_output_path(dir: &Path, business_name: &str, now: DateTime<Local>) -> PathBuf {
    dir.join(format!(
        "{}_reviews_{}.json",
        sanitize_component(business_name),
        now.format("%Y%m%d_%H%M%S")
    ))
}

/// `<dir>/images/<business>_<YYYYMMDD>`
pub fn image_directory(dir: &Path, business_name: &str, now: DateTime<Local>) -> PathBuf {
    dir.join("images").join(format!(
        "{}_{}",
        sanitize_component(business_name),
        now.format("%Y%m%d")
    ))
}

/// Write `reviews` as a pretty-printed UTF-8 JSON array.
pub fn write_reviews(path: &Path, reviews: &[ReviewRecord]) -> Result<(), OutputError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, reviews)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    info!("Wrote {} review(s) to {}", reviews.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::models::ReviewFields;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("築宜系統傢俱_桃園店"), "築宜系統傢俱_桃園店");
        assert_eq!(sanitize_component("Joe's Cafe: Main/2nd"), "Joe's_Cafe__Main_2nd");
        assert_eq!(sanitize_component("   "), "listing");
    }

    #[test]
    fn test_naming() {
        assert_eq!(
            default_output_path(Path::new("out"), "Corner Cafe", at()),
            PathBuf::from("out/Corner_Cafe_reviews_20240309_140507.json")
        );
        assert_eq!(
            image_directory(Path::new("out"), "Corner Cafe", at()),
            PathBuf::from("out/images/Corner_Cafe_20240309")
        );
    }

    #[test]
    fn test_write_keeps_cjk_unescaped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("reviews.json");
        let record = ReviewRecord::new(
            ReviewFields {
                reviewer_name: "林先生".to_string(),
                rating: Some(5),
                review_text: "櫃子做得很好".to_string(),
                review_date: "1 週前".to_string(),
            },
            1,
            Vec::new(),
            None,
        );

        write_reviews(&path, std::slice::from_ref(&record)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("櫃子做得很好"));
        assert!(text.contains("\n  {"));
        let back: Vec<ReviewRecord> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, vec![record]);
    }
}
