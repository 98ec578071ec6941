//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `frame_source` - Detector frames (JSONL replay, in-memory)
//! - `export` - Billed session output to file (JSONL rows)

pub mod export;
pub mod frame_source;

// Re-export commonly used types
pub use export::SessionExporter;
pub use frame_source::{DetectionFrame, FrameSource, JsonlFrameSource, MemoryFrameSource};
