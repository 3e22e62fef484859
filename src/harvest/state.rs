//! Loop bookkeeping and stop decisions.

use std::fmt;

use serde::Serialize;

use crate::config::HarvestSettings;
use crate::models::ReviewRecord;

/// Why the harvest loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `target_count` reviews collected.
    TargetReached,
    /// Too many consecutive cycles without an accepted review.
    Exhausted,
    /// `max_total_scrolls` reached.
    ScrollCap,
    /// The browser went away mid-run.
    SessionLost,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TargetReached => "target reached",
            Self::Exhausted => "no new reviews",
            Self::ScrollCap => "scroll limit reached",
            Self::SessionLost => "browser session lost",
        };
        f.write_str(s)
    }
}

/// Mutable state of one harvest run.
#[derive(Debug)]
pub struct HarvestState {
    pub target_count: usize,
    pub max_total_scrolls: usize,
    pub empty_scroll_threshold: usize,
    pub scroll_count: usize,
    pub consecutive_empty_scrolls: usize,
    collected: Vec<ReviewRecord>,
}

impl HarvestState {
    pub fn new(settings: &HarvestSettings) -> Self {
        Self {
            target_count: settings.target_count,
            max_total_scrolls: settings.max_total_scrolls,
            empty_scroll_threshold: settings.empty_scroll_threshold,
            scroll_count: 0,
            consecutive_empty_scrolls: 0,
            collected: Vec::with_capacity(settings.target_count.min(1024)),
        }
    }

    /// Stop before any work when the bounds leave nothing to do.
    pub fn initial_stop(&self) -> Option<StopReason> {
        if self.target_count == 0 {
            Some(StopReason::TargetReached)
        } else if self.max_total_scrolls == 0 {
            Some(StopReason::ScrollCap)
        } else {
            None
        }
    }

    pub fn begin_cycle(&mut self) {
        self.scroll_count += 1;
    }

    pub fn collected(&self) -> &[ReviewRecord] {
        &self.collected
    }

    pub fn remaining(&self) -> usize {
        self.target_count.saturating_sub(self.collected.len())
    }

    pub fn next_sequence_id(&self) -> usize {
        self.collected.len() + 1
    }

    /// Append a record. Refused once the target is met.
    pub fn accept(&mut self, record: ReviewRecord) -> bool {
        if self.remaining() == 0 {
            return false;
        }
        self.collected.push(record);
        true
    }

    /// Decide after a cycle that accepted `added` reviews.
    pub fn decide(&mut self, added: usize) -> Option<StopReason> {
        if self.collected.len() >= self.target_count {
            return Some(StopReason::TargetReached);
        }

        if added == 0 {
            self.consecutive_empty_scrolls += 1;
            if self.consecutive_empty_scrolls >= self.empty_scroll_threshold {
                return Some(StopReason::Exhausted);
            }
        } else {
            self.consecutive_empty_scrolls = 0;
        }

        if self.scroll_count >= self.max_total_scrolls {
            return Some(StopReason::ScrollCap);
        }
        None
    }

    pub fn finish(mut self) -> Vec<ReviewRecord> {
        self.collected.truncate(self.target_count);
        self.collected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReviewFields;

    fn settings(target: usize, max_scrolls: usize, threshold: usize) -> HarvestSettings {
        HarvestSettings {
            target_count: target,
            max_total_scrolls: max_scrolls,
            empty_scroll_threshold: threshold,
            ..HarvestSettings::default()
        }
    }

    fn record(seq: usize) -> ReviewRecord {
        ReviewRecord::new(
            ReviewFields {
                reviewer_name: format!("r{seq}"),
                rating: Some(5),
                review_text: String::new(),
                review_date: "unknown".to_string(),
            },
            seq,
            Vec::new(),
            None,
        )
    }

    #[test]
    fn test_target_reached_wins() {
        let mut state = HarvestState::new(&settings(2, 10, 3));
        state.begin_cycle();
        assert!(state.accept(record(1)));
        assert!(state.accept(record(2)));
        assert!(!state.accept(record(3)));
        assert_eq!(state.decide(2), Some(StopReason::TargetReached));
        assert_eq!(state.finish().len(), 2);
    }

    #[test]
    fn test_empty_streak_resets_on_progress() {
        let mut state = HarvestState::new(&settings(10, 100, 3));
        for _ in 0..2 {
            state.begin_cycle();
            assert_eq!(state.decide(0), None);
        }
        state.begin_cycle();
        state.accept(record(1));
        assert_eq!(state.decide(1), None);
        assert_eq!(state.consecutive_empty_scrolls, 0);

        for _ in 0..2 {
            state.begin_cycle();
            assert_eq!(state.decide(0), None);
        }
        state.begin_cycle();
        assert_eq!(state.decide(0), Some(StopReason::Exhausted));
    }

    #[test]
    fn test_scroll_cap() {
        let mut state = HarvestState::new(&settings(10, 2, 100));
        state.begin_cycle();
        state.accept(record(1));
        assert_eq!(state.decide(1), None);
        state.begin_cycle();
        state.accept(record(2));
        assert_eq!(state.decide(1), Some(StopReason::ScrollCap));
    }

    #[test]
    fn test_degenerate_bounds_stop_immediately() {
        assert_eq!(
            HarvestState::new(&settings(0, 10, 3)).initial_stop(),
            Some(StopReason::TargetReached)
        );
        assert_eq!(
            HarvestState::new(&settings(5, 0, 3)).initial_stop(),
            Some(StopReason::ScrollCap)
        );
        assert_eq!(HarvestState::new(&settings(5, 10, 3)).initial_stop(), None);
    }

    #[test]
    fn test_sequence_ids_follow_output_position() {
        let mut state = HarvestState::new(&settings(3, 10, 3));
        assert_eq!(state.next_sequence_id(), 1);
        state.accept(record(1));
        assert_eq!(state.next_sequence_id(), 2);
        assert_eq!(state.remaining(), 2);
    }
}
