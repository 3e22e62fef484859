//! End-of-run summary.

use std::path::Path;
use std::time::Duration;

use console::style;

use crate::harvest::{HarvestReport, StopReason};

const PREVIEW_COUNT: usize = 3;
const PREVIEW_CHARS: usize = 100;

pub fn print_summary(report: &HarvestReport, output: Option<&Path>, elapsed: Duration) {
    let stats = &report.stats;
    let reviews = &report.reviews;

    println!("\n{}", style("Harvest summary").bold());
    println!("  {:<22} {}", "Elapsed:", format_elapsed(elapsed));
    println!("  {:<22} {}", "Reviews collected:", style(reviews.len()).green());
    println!("  {:<22} {}", "Reviews evaluated:", stats.evaluated);
    println!("  {:<22} {}", "Duplicates skipped:", stats.duplicates_skipped);
    println!("  {:<22} {}", "Filtered out:", stats.filtered_out);
    println!("  {:<22} {}", "Scrolls:", stats.scroll_count);
    println!("  {:<22} {}", "Stopped because:", stop_label(stats.stop_reason));
    if let Some(ref e) = stats.fatal_error {
        println!("  {:<22} {}", "Last error:", style(e).red());
    }

    let photos: usize = reviews.iter().map(|r| r.total_images).sum();
    if photos > 0 || stats.image_failures > 0 {
        let with_photos = reviews.iter().filter(|r| r.images_downloaded).count();
        println!("\n{}", style("Photos").bold());
        println!("  {:<22} {}", "Saved:", photos);
        println!("  {:<22} {}", "Downloaded:", stats.images_downloaded);
        println!("  {:<22} {}", "Duplicate URLs:", stats.image_cache_hits);
        println!("  {:<22} {}", "Already on disk:", stats.images_reused);
        println!("  {:<22} {}", "Failed:", stats.image_failures);
        println!("  {:<22} {}", "Reviews with photos:", with_photos);
    }

    if !reviews.is_empty() {
        println!("\n{}", style("Preview").bold());
    }
    for review in reviews.iter().take(PREVIEW_COUNT) {
        let rating = review
            .rating
            .map(|r| format!("{}★", r))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {} {} {} {}",
            style(format!("#{}", review.sequence_id)).dim(),
            style(&review.reviewer_name).cyan(),
            rating,
            style(&review.review_date).dim()
        );
        if !review.review_text.is_empty() {
            println!("    {}", preview(&review.review_text));
        }
    }

    if let Some(path) = output {
        println!(
            "\n{} Saved to {}",
            style("✓").green(),
            style(path.display()).bold()
        );
    }
}

fn stop_label(reason: StopReason) -> String {
    match reason {
        StopReason::TargetReached => style(reason).green().to_string(),
        StopReason::SessionLost => style(reason).red().to_string(),
        _ => style(reason).yellow().to_string(),
    }
}

/// First characters of a review on one line.
fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > PREVIEW_CHARS {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut)
    } else {
        flat
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}
