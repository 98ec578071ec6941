//! Services - business logic and state management
//!
//! This module contains the core business logic services:
//! - `slot_resolver` - Stable slot identity from jittery detections
//! - `occupancy` - Per-slot occupancy state machine
//! - `billing` - Fee calculation for completed sessions
//! - `records` - Append-only store of billed sessions
//! - `timeseries` - Rolling vacant-count series for live charts
//! - `pipeline` - Per-frame orchestration of the above
//! - `frame_loop` - Cooperative, cancellable frame delivery

pub mod billing;
pub mod frame_loop;
pub mod occupancy;
pub mod pipeline;
pub mod records;
pub mod slot_resolver;
pub mod timeseries;

// Re-export commonly used types
pub use billing::{compute_fee, BillingError, Tariff};
pub use frame_loop::{run_and_export, run_frame_loop, LoopStats};
pub use occupancy::{OccupancyTracker, TrackerError};
pub use pipeline::{FrameError, FrameProcessingPipeline, FrameSummary};
pub use records::SessionRecordStore;
pub use slot_resolver::SlotIdentityResolver;
pub use timeseries::{OccupancyTimeSeries, TimeSeriesSample};
