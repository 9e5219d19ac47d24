//! IO modules - external system interfaces
//!
//! This module contains all file IO:
//! - `sources` - JSONL record readers and schema adapters
//! - `dwell` - CDR tower dwell merging and curation
//! - `egress` - Segmentation output to files (JSONL + JSON report)

pub mod dwell;
pub mod egress;
pub mod sources;

// Re-export commonly used types
pub use egress::Egress;
pub use sources::{load_events, InputFormat, SourceError, SourceOptions};
