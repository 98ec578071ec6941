//! Domain models - core parking types and the session model
//!
//! This module contains the canonical data types used throughout the system:
//! - `Detection` - one raw detector observation for one slot in one frame
//! - `SlotKey` / `SlotIdentity` - quantized slot identity and its stable number
//! - `OpenSession` / `SessionRecord` - an occupancy session before and after billing
//! - `OccupancyEvent` - entry/exit transitions emitted by the tracker

pub mod session;
pub mod types;

pub use session::{EntryEvent, ExitEvent, ExportRow, OccupancyEvent, OpenSession, SessionRecord};
pub use types::{
    BoundingBox, Detection, DetectionError, Label, SlotIdentity, SlotKey, SlotNumber, SlotState,
    Timestamp,
};
