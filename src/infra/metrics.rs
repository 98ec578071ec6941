//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations to avoid mutex contention.
//! All counter updates are lock-free; reporting swaps the periodic counters
//! to get a consistent snapshot.
//!
//! NOTE: All atomics use Relaxed ordering intentionally. These are
//! statistical counters only and never drive billing or state decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Frame latency bucket boundaries (microseconds)
/// Buckets: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200
const BUCKET_BOUNDS: [u64; 10] = [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200];
const NUM_BUCKETS: usize = 11;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_us: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Swap all buckets to zero and return their values
#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = ((total as f64 * percentile).ceil() as u64).max(1);
    let mut cumulative = 0u64;

    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200, 102400];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
pub struct Metrics {
    /// Frames processed (monotonic)
    frames_total: AtomicU64,
    /// Frames since last report (reset on report)
    frames_since_report: AtomicU64,
    /// Frames that failed with a frame-level error (monotonic)
    frame_errors_total: AtomicU64,
    /// Detections accepted (monotonic)
    detections_total: AtomicU64,
    /// Detections skipped as malformed (monotonic)
    detections_skipped_total: AtomicU64,
    /// Sessions opened (monotonic)
    sessions_opened_total: AtomicU64,
    /// Sessions closed and billed (monotonic)
    sessions_billed_total: AtomicU64,
    /// Exit events rejected as duplicates (monotonic)
    duplicate_exits_total: AtomicU64,
    /// Sum of billed fees (monotonic)
    fees_total: AtomicU64,
    /// Sum of frame latencies in microseconds (reset on report)
    latency_sum_us: AtomicU64,
    /// Max frame latency in microseconds (reset on report)
    latency_max_us: AtomicU64,
    /// Frame latency histogram (reset on report)
    latency_buckets: [AtomicU64; NUM_BUCKETS],
    /// Last report time (only accessed from reporter)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            frames_total: AtomicU64::new(0),
            frames_since_report: AtomicU64::new(0),
            frame_errors_total: AtomicU64::new(0),
            detections_total: AtomicU64::new(0),
            detections_skipped_total: AtomicU64::new(0),
            sessions_opened_total: AtomicU64::new(0),
            sessions_billed_total: AtomicU64::new(0),
            duplicate_exits_total: AtomicU64::new(0),
            fees_total: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
            latency_max_us: AtomicU64::new(0),
            latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Record a frame was processed with given latency (lock-free)
    #[inline]
    pub fn record_frame_processed(&self, latency_us: u64) {
        self.frames_total.fetch_add(1, Ordering::Relaxed);
        self.frames_since_report.fetch_add(1, Ordering::Relaxed);
        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        self.latency_buckets[bucket_index(latency_us)].fetch_add(1, Ordering::Relaxed);
        update_atomic_max(&self.latency_max_us, latency_us);
    }

    #[inline]
    pub fn record_frame_error(&self) {
        self.frame_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_detections(&self, accepted: u64, skipped: u64) {
        self.detections_total.fetch_add(accepted, Ordering::Relaxed);
        self.detections_skipped_total.fetch_add(skipped, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_session_opened(&self) {
        self.sessions_opened_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_session_billed(&self, fee: u64) {
        self.sessions_billed_total.fetch_add(1, Ordering::Relaxed);
        self.fees_total.fetch_add(fee, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_duplicate_exit(&self) {
        self.duplicate_exits_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_total(&self) -> u64 {
        self.frames_total.load(Ordering::Relaxed)
    }

    pub fn frame_errors_total(&self) -> u64 {
        self.frame_errors_total.load(Ordering::Relaxed)
    }

    pub fn detections_skipped_total(&self) -> u64 {
        self.detections_skipped_total.load(Ordering::Relaxed)
    }

    pub fn sessions_billed_total(&self) -> u64 {
        self.sessions_billed_total.load(Ordering::Relaxed)
    }

    pub fn duplicate_exits_total(&self) -> u64 {
        self.duplicate_exits_total.load(Ordering::Relaxed)
    }

    /// Generate a report and reset the periodic counters
    pub fn report(&self) -> MetricsSummary {
        let frames_count = self.frames_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.latency_sum_us.swap(0, Ordering::Relaxed);
        let max_latency = self.latency_max_us.swap(0, Ordering::Relaxed);
        let lat_buckets = swap_buckets(&self.latency_buckets);

        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let frames_per_sec = if elapsed.as_secs_f64() > 0.0 {
            frames_count as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };
        let avg_latency = if frames_count > 0 { latency_sum / frames_count } else { 0 };

        MetricsSummary {
            frames_total: self.frames_total.load(Ordering::Relaxed),
            frames_per_sec,
            avg_frame_latency_us: avg_latency,
            max_frame_latency_us: max_latency,
            lat_p50_us: percentile_from_buckets(&lat_buckets, 0.50),
            lat_p99_us: percentile_from_buckets(&lat_buckets, 0.99),
            frame_errors_total: self.frame_errors_total.load(Ordering::Relaxed),
            detections_total: self.detections_total.load(Ordering::Relaxed),
            detections_skipped_total: self.detections_skipped_total.load(Ordering::Relaxed),
            sessions_opened_total: self.sessions_opened_total.load(Ordering::Relaxed),
            sessions_billed_total: self.sessions_billed_total.load(Ordering::Relaxed),
            duplicate_exits_total: self.duplicate_exits_total.load(Ordering::Relaxed),
            fees_total: self.fees_total.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time metrics snapshot
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub frames_total: u64,
    pub frames_per_sec: f64,
    pub avg_frame_latency_us: u64,
    pub max_frame_latency_us: u64,
    pub lat_p50_us: u64,
    pub lat_p99_us: u64,
    pub frame_errors_total: u64,
    pub detections_total: u64,
    pub detections_skipped_total: u64,
    pub sessions_opened_total: u64,
    pub sessions_billed_total: u64,
    pub duplicate_exits_total: u64,
    pub fees_total: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            frames_total = %self.frames_total,
            frames_per_sec = format!("{:.1}", self.frames_per_sec),
            avg_latency_us = %self.avg_frame_latency_us,
            max_latency_us = %self.max_frame_latency_us,
            p50_us = %self.lat_p50_us,
            p99_us = %self.lat_p99_us,
            frame_errors = %self.frame_errors_total,
            skipped = %self.detections_skipped_total,
            opened = %self.sessions_opened_total,
            billed = %self.sessions_billed_total,
            fees = %self.fees_total,
            "metrics"
        );
    }
}
