//! Shared types for the parking monitor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wall-clock instant attached to every frame
pub type Timestamp = DateTime<Utc>;

/// Label reported by the detector for one parking slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    Vacant,
    Occupied,
    Unknown(String),
}

impl std::str::FromStr for Label {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            // "empty" is the vocabulary of the hosted detector model
            "vacant" | "empty" => Label::Vacant,
            "occupied" => Label::Occupied,
            _ => Label::Unknown(s.to_string()),
        })
    }
}

impl Label {
    pub fn as_str(&self) -> &str {
        match self {
            Label::Vacant => "vacant",
            Label::Occupied => "occupied",
            Label::Unknown(s) => s,
        }
    }
}

/// Axis-aligned box in pixel space, `(x1, y1)` is the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }
}

/// One raw observation from the detector for one slot in one frame
#[derive(Debug, Clone)]
pub struct Detection {
    pub label: Label,
    pub bbox: BoundingBox,
    /// Carried through for diagnostics only; thresholding happens in the detector
    pub confidence: f32,
}

impl Detection {
    pub fn new(label: Label, bbox: BoundingBox, confidence: f32) -> Self {
        Self { label, bbox, confidence }
    }

    pub fn vacant(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(Label::Vacant, BoundingBox::new(x1, y1, x2, y2), 1.0)
    }

    pub fn occupied(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(Label::Occupied, BoundingBox::new(x1, y1, x2, y2), 1.0)
    }

    /// Check the detection is usable and return its slot state
    pub fn validate(&self) -> Result<SlotState, DetectionError> {
        if !self.bbox.is_finite() {
            return Err(DetectionError::NonFiniteCoordinates(self.bbox));
        }
        match &self.label {
            Label::Vacant => Ok(SlotState::Vacant),
            Label::Occupied => Ok(SlotState::Occupied),
            Label::Unknown(s) => Err(DetectionError::UnknownLabel(s.clone())),
        }
    }
}

/// Reasons a single detection is skipped
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectionError {
    #[error("unrecognized label '{0}'")]
    UnknownLabel(String),
    #[error("non-finite coordinates {0:?}")]
    NonFiniteCoordinates(BoundingBox),
}

/// Quantized top-left corner used as the identity of a physical slot.
///
/// Two boxes of the same slot in consecutive frames usually round to the
/// same key, but jitter across a cell boundary splits the slot and two
/// neighbouring slots closer than the grid merge. This is a heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SlotKey {
    pub x: i64,
    pub y: i64,
}

impl SlotKey {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Round the anchor to the nearest multiple of `grid_px`
    pub fn quantize(x: f64, y: f64, grid_px: u32) -> Self {
        let grid = f64::from(grid_px.max(1));
        Self { x: ((x / grid).round() * grid) as i64, y: ((y / grid).round() * grid) as i64 }
    }

    pub fn from_bbox(bbox: &BoundingBox, grid_px: u32) -> Self {
        Self::quantize(bbox.x1, bbox.y1, grid_px)
    }
}

impl std::fmt::Display for SlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.x, self.y)
    }
}

/// Human-readable slot number, starting at 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct SlotNumber(pub u32);

impl std::fmt::Display for SlotNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Persistent identity of a slot for the process lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotIdentity {
    pub key: SlotKey,
    pub number: SlotNumber,
    pub first_seen_at: Timestamp,
}

/// Observed occupancy of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotState {
    Vacant,
    Occupied,
}

impl SlotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotState::Vacant => "vacant",
            SlotState::Occupied => "occupied",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_from_str() {
        assert_eq!("vacant".parse::<Label>().unwrap(), Label::Vacant);
        assert_eq!("empty".parse::<Label>().unwrap(), Label::Vacant);
        assert_eq!("Occupied".parse::<Label>().unwrap(), Label::Occupied);
        assert!(matches!("car".parse::<Label>().unwrap(), Label::Unknown(_)));
    }

    #[test]
    fn test_quantize_rounds_to_grid() {
        assert_eq!(SlotKey::quantize(12.0, 18.0, 10), SlotKey::new(10, 20));
        assert_eq!(SlotKey::quantize(14.9, 15.0, 10), SlotKey::new(10, 20));
        assert_eq!(SlotKey::quantize(101.0, 249.0, 10), SlotKey::new(100, 250));
        assert_eq!(SlotKey::quantize(37.0, 37.0, 25), SlotKey::new(25, 25));
    }

    #[test]
    fn test_slot_key_display() {
        assert_eq!(SlotKey::new(10, 20).to_string(), "10_20");
    }

    #[test]
    fn test_validate_rejects_malformed() {
        let det = Detection::new(Label::Unknown("truck".into()), BoundingBox::new(0.0, 0.0, 1.0, 1.0), 0.9);
        assert_eq!(det.validate(), Err(DetectionError::UnknownLabel("truck".into())));

        let det = Detection::vacant(f64::NAN, 0.0, 1.0, 1.0);
        assert!(matches!(det.validate(), Err(DetectionError::NonFiniteCoordinates(_))));

        let det = Detection::occupied(0.0, 0.0, f64::INFINITY, 1.0);
        assert!(det.validate().is_err());

        assert_eq!(Detection::occupied(1.0, 2.0, 3.0, 4.0).validate(), Ok(SlotState::Occupied));
    }
}
