//! Domain models - event records and the episode model
//!
//! This module contains the canonical data types used throughout the system:
//! - `EventRecord` - one dated event for an entity, the segmenter's input unit
//! - `Role` - episode boundary role assigned to each record
//! - `SegmentedRecord` - an input record plus its segmentation annotations
//! - `Episode` - a maximal run of on-episode records for one entity

pub mod episode;
pub mod types;

// Re-export commonly used types at module level
pub use episode::{Episode, EpisodePositions, SegmentedRecord, Segmentation, NO_EPISODE};
pub use types::{EntityId, EventRecord, OrderPolicy, Role};
