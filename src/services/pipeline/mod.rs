//! Frame processing and session billing orchestration
//!
//! The pipeline is the single entry point driven once per captured frame. It
//! coordinates:
//! - Slot identity resolution (jittery boxes -> stable numbered slots)
//! - Occupancy transitions (entry/exit per slot)
//! - Billing of completed sessions into the shared record store
//! - The rolling vacant-count series used for live charts
//!
//! The resolver and tracker are owned exclusively here, so frames must be
//! fed one at a time. The record store and time series are shared handles
//! that readers may query while a frame is in flight.


use crate::domain::session::{ExitEvent, OccupancyEvent, SessionRecord};
use crate::domain::types::{Detection, SlotNumber, SlotState, Timestamp};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::services::billing::{BillingError, Tariff};
use crate::services::occupancy::{OccupancyTracker, TrackerError};
use crate::services::records::SessionRecordStore;
use crate::services::slot_resolver::SlotIdentityResolver;
use crate::services::timeseries::{OccupancyTimeSeries, TimeSeriesSample};
use smallvec::SmallVec;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Frame-level failures. State mutated before the failure is kept.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    #[error(transparent)]
    Clock(#[from] TrackerError),
    #[error("billing failed for slot {slot_number}: {source}")]
    Billing { slot_number: SlotNumber, source: BillingError },
}

/// Result of processing one frame
#[derive(Debug, Clone)]
pub struct FrameSummary {
    pub timestamp: Timestamp,
    pub vacant_count: usize,
    pub occupied_count: usize,
    /// Detections dropped as malformed
    pub skipped_count: usize,
    /// Records billed during this frame, in billing order
    pub new_session_records: SmallVec<[SessionRecord; 4]>,
}

impl FrameSummary {
    pub fn total(&self) -> usize {
        self.vacant_count + self.occupied_count
    }
}

/// Orchestrates one frame at a time over the owned slot state
pub struct FrameProcessingPipeline {
    pub(crate) resolver: SlotIdentityResolver,
    pub(crate) tracker: OccupancyTracker,
    pub(crate) tariff: Tariff,
    /// Completed sessions, shared with reporting/export
    pub(crate) records: Arc<SessionRecordStore>,
    /// Vacant-count samples, shared with charting
    pub(crate) series: Arc<OccupancyTimeSeries>,
    pub(crate) metrics: Arc<Metrics>,
}

impl FrameProcessingPipeline {
    /// Create a pipeline from configuration
    pub fn new(config: &Config, metrics: Arc<Metrics>) -> Self {
        Self::with_parts(
            SlotIdentityResolver::new(config.grid_px()),
            Tariff::new(config.unit_minutes(), config.unit_fee()),
            Arc::new(SessionRecordStore::new()),
            Arc::new(OccupancyTimeSeries::new(config.timeseries_window())),
            metrics,
        )
    }

    pub fn with_parts(
        resolver: SlotIdentityResolver,
        tariff: Tariff,
        records: Arc<SessionRecordStore>,
        series: Arc<OccupancyTimeSeries>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { resolver, tracker: OccupancyTracker::new(), tariff, records, series, metrics }
    }

    /// Process all detections of one frame observed at `now`.
    ///
    /// Malformed detections are skipped and counted. A clock regression on
    /// an open session aborts the remainder of the frame, including its
    /// time-series sample.
    pub fn process_frame(
        &mut self,
        detections: &[Detection],
        now: Timestamp,
    ) -> Result<FrameSummary, FrameError> {
        let process_start = Instant::now();

        let mut vacant_count = 0;
        let mut occupied_count = 0;
        let mut skipped_count = 0;
        let mut new_session_records = SmallVec::new();

        for (index, detection) in detections.iter().enumerate() {
            let state = match detection.validate() {
                Ok(state) => state,
                Err(e) => {
                    warn!(
                        index = %index,
                        label = %detection.label.as_str(),
                        error = %e,
                        "detection_skipped"
                    );
                    skipped_count += 1;
                    continue;
                }
            };

            let identity = self.resolver.resolve(detection, now);

            let event = match self.tracker.observe(&identity, state, now) {
                Ok(event) => event,
                Err(e) => {
                    self.metrics.record_detections(
                        (vacant_count + occupied_count) as u64,
                        skipped_count as u64,
                    );
                    self.metrics.record_frame_error();
                    return Err(e.into());
                }
            };

            match state {
                SlotState::Vacant => vacant_count += 1,
                SlotState::Occupied => occupied_count += 1,
            }

            match event {
                Some(OccupancyEvent::Entry(_)) => self.metrics.record_session_opened(),
                Some(OccupancyEvent::Exit(exit)) => {
                    let slot_number = exit.slot_number;
                    let settled = self.settle_exit(exit).map_err(|source| {
                        self.metrics.record_frame_error();
                        FrameError::Billing { slot_number, source }
                    })?;
                    if let Some(record) = settled {
                        new_session_records.push(record);
                    }
                }
                None => {}
            }
        }

        self.series.append(now, vacant_count);
        self.metrics.record_detections((vacant_count + occupied_count) as u64, skipped_count as u64);
        self.metrics.record_frame_processed(process_start.elapsed().as_micros() as u64);

        debug!(
            total = %(vacant_count + occupied_count),
            vacant = %vacant_count,
            occupied = %occupied_count,
            skipped = %skipped_count,
            billed = %new_session_records.len(),
            "frame_processed"
        );

        Ok(FrameSummary {
            timestamp: now,
            vacant_count,
            occupied_count,
            skipped_count,
            new_session_records,
        })
    }

    /// Bill an exit and store the record.
    ///
    /// Returns `None` when the same exit was already recorded.
    pub fn settle_exit(&mut self, exit: ExitEvent) -> Result<Option<SessionRecord>, BillingError> {
        let fee = self.tariff.fee(exit.duration_minutes)?;
        let record = SessionRecord::from_exit(exit, fee);

        if !self.records.insert(record.clone()) {
            self.metrics.record_duplicate_exit();
            return Ok(None);
        }

        self.metrics.record_session_billed(fee);
        info!(
            slot = %record.slot_number,
            sid = %record.session_id,
            duration_min = %format!("{:.1}", record.duration_minutes),
            fee = %record.fee,
            "session_billed"
        );
        Ok(Some(record))
    }

    /// Completed sessions in billing order
    pub fn list_session_records(&self) -> Vec<SessionRecord> {
        self.records.list_all()
    }

    /// Recent `(timestamp, vacant_count)` samples, oldest first
    pub fn time_series_snapshot(&self) -> Vec<TimeSeriesSample> {
        self.series.snapshot()
    }

    /// Shared handle for concurrent readers of completed sessions
    pub fn records_handle(&self) -> Arc<SessionRecordStore> {
        self.records.clone()
    }

    /// Shared handle for concurrent readers of the occupancy series
    pub fn series_handle(&self) -> Arc<OccupancyTimeSeries> {
        self.series.clone()
    }

    pub fn resolver(&self) -> &SlotIdentityResolver {
        &self.resolver
    }

    pub fn tracker(&self) -> &OccupancyTracker {
        &self.tracker
    }

    pub fn tariff(&self) -> &Tariff {
        &self.tariff
    }
}
