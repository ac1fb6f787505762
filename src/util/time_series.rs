/// Rolling per-instrument observation history

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::VecDeque;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HistoryPoint {
    pub price_in_sol: f64,
    pub sol_in_curve: f64,
    pub timestamp: DateTime<Utc>,
}

/// Append-only, time-ordered window pruned to a retention horizon
#[derive(Clone, Debug)]
pub struct SlidingWindow {
    pub events: VecDeque<HistoryPoint>,
    pub retention: ChronoDuration,
}

impl SlidingWindow {
    pub fn new(retention: ChronoDuration) -> Self {
        Self {
            events: VecDeque::new(),
            retention,
        }
    }

    pub fn add_point(&mut self, point: HistoryPoint) {
        self.events.push_back(point);
        self.cleanup_old_events(point.timestamp);
    }

    /// Drop everything older than the retention horizon relative to `now`
    pub fn cleanup_old_events(&mut self, now: DateTime<Utc>) {
        let cutoff_time = now - self.retention;
        while let Some(front) = self.events.front() {
            if front.timestamp < cutoff_time {
                self.events.pop_front();
            } else {
                break;
            }
        }
    }

    /// Points no older than `window` at `now`, oldest first
    pub fn recent(&self, window: ChronoDuration, now: DateTime<Utc>) -> Vec<HistoryPoint> {
        self.events
            .iter()
            .filter(|p| now - p.timestamp <= window)
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
