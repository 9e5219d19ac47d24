//! Services - segmentation logic and derived statistics
//!
//! This module contains the core business logic services:
//! - `segmenter` - Episode/trip segmentation over per-entity event sequences
//! - `distributions` - Frequency tables over the segmentation output
//! - `transitions` - Edge list over episode paths (virtual start/end nodes)
//! - `paths` - Encoded episode paths and entry/exit location weights
//! - `report` - Run report combining the above

pub mod distributions;
pub mod paths;
pub mod report;
pub mod segmenter;
pub mod transitions;

// Re-export commonly used types
pub use distributions::FrequencyTable;
pub use paths::{LocationWeight, PathCount};
pub use report::RunReport;
pub use segmenter::{SegmentError, Segmenter, SegmenterConfig};
pub use transitions::{Edge, TransitionBuilder};
