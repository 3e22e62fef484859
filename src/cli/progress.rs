//! Harvest progress bar.

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::harvest::HarvestEvent;

/// Drain harvest events into a progress bar until the sender is dropped.
pub fn spawn(mut events: mpsc::Receiver<HarvestEvent>, target: usize) -> JoinHandle<()> {
    let bar = ProgressBar::new(target as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            apply(&bar, event);
        }
        if !bar.is_finished() {
            bar.abandon();
        }
    })
}

fn apply(bar: &ProgressBar, event: HarvestEvent) {
    match event {
        HarvestEvent::Started { target } => {
            bar.set_length(target as u64);
            bar.set_message("loading reviews");
        }
        HarvestEvent::PreScroll { done, total, .. } => {
            bar.set_message(format!("warming up {}/{}", done, total));
            bar.tick();
        }
        HarvestEvent::Scrolled { cycle, outcome } => {
            bar.set_message(format!("scroll {} ({})", cycle, outcome));
        }
        HarvestEvent::ReviewsVisible { .. } => {}
        HarvestEvent::Accepted {
            sequence_id,
            reviewer,
            images,
        } => {
            bar.set_position(sequence_id as u64);
            if images > 0 {
                bar.set_message(format!("{} ({} photo(s))", reviewer, images));
            } else {
                bar.set_message(reviewer);
            }
        }
        HarvestEvent::Filtered { reviewer } => {
            bar.set_message(format!("skipped {}", reviewer));
        }
        HarvestEvent::CycleFinished {
            added: 0,
            empty_streak,
            ..
        } => {
            bar.set_message(format!("no new reviews ({} in a row)", empty_streak));
        }
        HarvestEvent::CycleFinished { .. } => {}
        HarvestEvent::Finished { collected, reason } => {
            bar.set_position(collected as u64);
            bar.finish_with_message(reason.to_string());
        }
    }
}
