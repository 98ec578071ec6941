//! Rolling window of vacant-slot counts for live charting

use crate::domain::types::Timestamp;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::VecDeque;

/// Default number of samples kept
pub const DEFAULT_WINDOW: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeSeriesSample {
    pub timestamp: Timestamp,
    pub vacant_count: usize,
}

/// Bounded FIFO of the most recent samples
pub struct OccupancyTimeSeries {
    window: usize,
    samples: RwLock<VecDeque<TimeSeriesSample>>,
}

impl OccupancyTimeSeries {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self { window, samples: RwLock::new(VecDeque::with_capacity(window + 1)) }
    }

    /// Append a sample, evicting the oldest once the window is full
    pub fn append(&self, timestamp: Timestamp, vacant_count: usize) {
        let mut samples = self.samples.write();
        samples.push_back(TimeSeriesSample { timestamp, vacant_count });
        while samples.len() > self.window {
            samples.pop_front();
        }
    }

    /// Samples oldest first
    pub fn snapshot(&self) -> Vec<TimeSeriesSample> {
        self.samples.read().iter().copied().collect()
    }

    pub fn latest(&self) -> Option<TimeSeriesSample> {
        self.samples.read().back().copied()
    }

    pub fn capacity(&self) -> usize {
        self.window
    }
}

impl Default for OccupancyTimeSeries {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn t(secs: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn test_window_evicts_oldest() {
        let series = OccupancyTimeSeries::default();
        for i in 0..=DEFAULT_WINDOW as i64 {
            series.append(t(i), i as usize);
        }

        let snapshot = series.snapshot();
        assert_eq!(snapshot.len(), DEFAULT_WINDOW);
        assert!(snapshot.iter().all(|s| s.timestamp != t(0)));
        assert_eq!(snapshot.first().unwrap().timestamp, t(1));
        assert!(snapshot.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(series.latest().unwrap().vacant_count, DEFAULT_WINDOW);
    }

    #[test]
    fn test_never_exceeds_window() {
        let series = OccupancyTimeSeries::new(3);
        for i in 0..50 {
            series.append(t(i), 1);
            assert!(series.snapshot().len() <= 3);
        }
        let times: Vec<Timestamp> = series.snapshot().iter().map(|s| s.timestamp).collect();
        assert_eq!(times, vec![t(47), t(48), t(49)]);
    }

    #[test]
    fn test_empty_series() {
        let series = OccupancyTimeSeries::new(0);
        assert_eq!(series.capacity(), 1);
        assert!(series.snapshot().is_empty());
        assert!(series.latest().is_none());
    }
}
