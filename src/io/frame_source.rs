//! Detector frame sources
//!
//! A `FrameSource` stands in for the capture device plus the detection
//! model: each call yields the detections of one frame. The JSONL replay
//! source reads one frame per line:
//!
//! ```text
//! {"time": "2025-06-01T08:00:00Z", "detections": [{"label": "vacant", "bbox": [12, 18, 60, 90], "confidence": 0.91}]}
//! ```
//!
//! `time` may be an RFC 3339 string or epoch milliseconds; frames without a
//! usable time are stamped with the wall clock when processed.

use crate::domain::types::{BoundingBox, Detection, Label, Timestamp};
use anyhow::Context;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use tracing::{debug, info, warn};

/// Detections of one captured frame
#[derive(Debug, Clone, Default)]
pub struct DetectionFrame {
    pub time: Option<Timestamp>,
    pub detections: Vec<Detection>,
}

/// Source of frames, consumed one frame at a time
pub trait FrameSource {
    /// Next frame, `Ok(None)` once the source is exhausted
    fn next_frame(&mut self) -> anyhow::Result<Option<DetectionFrame>>;
}

/// In-memory frames, used by the simulator and tests
#[derive(Debug, Default)]
pub struct MemoryFrameSource {
    frames: VecDeque<DetectionFrame>,
}

impl MemoryFrameSource {
    pub fn new(frames: Vec<DetectionFrame>) -> Self {
        Self { frames: frames.into() }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for MemoryFrameSource {
    fn next_frame(&mut self) -> anyhow::Result<Option<DetectionFrame>> {
        Ok(self.frames.pop_front())
    }
}

/// Timestamp that can be either ISO 8601 string or epoch milliseconds
#[derive(Debug, Clone, Default)]
enum TimestampValue {
    #[default]
    None,
    IsoString(String),
    EpochMs(u64),
}

impl TimestampValue {
    fn to_timestamp(&self) -> Option<Timestamp> {
        match self {
            TimestampValue::EpochMs(ms) => Utc.timestamp_millis_opt(i64::try_from(*ms).ok()?).single(),
            TimestampValue::IsoString(s) => {
                DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
            }
            TimestampValue::None => None,
        }
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<TimestampValue, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct TimestampVisitor;

    impl<'de> Visitor<'de> for TimestampVisitor {
        type Value = TimestampValue;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or integer timestamp")
        }

        fn visit_str<E>(self, value: &str) -> Result<TimestampValue, E>
        where
            E: de::Error,
        {
            Ok(TimestampValue::IsoString(value.to_string()))
        }

        fn visit_u64<E>(self, value: u64) -> Result<TimestampValue, E>
        where
            E: de::Error,
        {
            Ok(TimestampValue::EpochMs(value))
        }

        fn visit_i64<E>(self, value: i64) -> Result<TimestampValue, E>
        where
            E: de::Error,
        {
            Ok(u64::try_from(value).map(TimestampValue::EpochMs).unwrap_or_default())
        }

        fn visit_unit<E>(self) -> Result<TimestampValue, E>
        where
            E: de::Error,
        {
            Ok(TimestampValue::None)
        }
    }

    deserializer.deserialize_any(TimestampVisitor)
}

/// Wire format of one frame line
#[derive(Debug, Deserialize)]
struct WireFrame {
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    time: TimestampValue,
    #[serde(default)]
    detections: Vec<WireDetection>,
}

#[derive(Debug, Deserialize)]
struct WireDetection {
    #[serde(default)]
    label: String,
    #[serde(default)]
    bbox: Vec<f64>,
    #[serde(default)]
    confidence: f32,
}

impl WireDetection {
    /// A box with fewer than four coordinates becomes non-finite and is
    /// rejected downstream as malformed.
    fn into_detection(self) -> Detection {
        let coord = |i: usize| self.bbox.get(i).copied().unwrap_or(f64::NAN);
        let bbox = BoundingBox::new(coord(0), coord(1), coord(2), coord(3));
        let label = self.label.parse::<Label>().unwrap_or_else(|never| match never {});
        Detection::new(label, bbox, self.confidence)
    }
}

/// Parse one JSONL line into a frame
pub fn parse_frame_line(line: &str) -> anyhow::Result<DetectionFrame> {
    let wire: WireFrame = serde_json::from_str(line).context("invalid frame JSON")?;

    let time = wire.time.to_timestamp();
    if time.is_none() && !matches!(wire.time, TimestampValue::None) {
        warn!(time = ?wire.time, "frame_time_unparseable");
    }

    Ok(DetectionFrame {
        time,
        detections: wire.detections.into_iter().map(WireDetection::into_detection).collect(),
    })
}

/// Replays detector output recorded as JSONL
pub struct JsonlFrameSource {
    path: String,
    lines: Lines<BufReader<File>>,
    line_no: usize,
}

impl JsonlFrameSource {
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open frame file {}", path.display()))?;
        info!(file = %path.display(), "frame_source_opened");
        Ok(Self { path: path.display().to_string(), lines: BufReader::new(file).lines(), line_no: 0 })
    }
}

impl FrameSource for JsonlFrameSource {
    fn next_frame(&mut self) -> anyhow::Result<Option<DetectionFrame>> {
        for line in self.lines.by_ref() {
            self.line_no += 1;
            let line =
                line.with_context(|| format!("Failed to read {} line {}", self.path, self.line_no))?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let frame = parse_frame_line(trimmed)
                .with_context(|| format!("{} line {}", self.path, self.line_no))?;
            debug!(line = %self.line_no, detections = %frame.detections.len(), "frame_read");
            return Ok(Some(frame));
        }
        Ok(None)
    }
}
