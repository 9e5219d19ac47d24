//! Episode data model: annotated records and the grouped episode table

use crate::domain::types::{EntityId, EventRecord, Role};
use serde::Serialize;
use smallvec::SmallVec;

/// Episode id carried by records that are not on an episode
pub const NO_EPISODE: u64 = 0;

/// Input positions of one episode's records
pub type EpisodePositions = SmallVec<[usize; 8]>;

/// One input record with its segmentation annotations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentedRecord {
    #[serde(flatten)]
    pub record: EventRecord,
    pub is_first_of_entity: bool,
    pub is_last_of_entity: bool,
    pub gap: Option<i64>, // ticks since previous same-entity record
    pub was_in_scope: Option<bool>, // previous same-entity record
    pub will_be_in_scope: Option<bool>, // next same-entity record
    pub role: Role,
    pub on_episode: bool,
    pub episode_id: u64,
}

impl SegmentedRecord {
    /// Wrap a record with no neighbours and no role yet
    pub(crate) fn unlabelled(record: EventRecord) -> Self {
        Self {
            record,
            is_first_of_entity: false,
            is_last_of_entity: false,
            gap: None,
            was_in_scope: None,
            will_be_in_scope: None,
            role: Role::None,
            on_episode: false,
            episode_id: NO_EPISODE,
        }
    }

    #[inline]
    pub fn entity_id(&self) -> EntityId {
        self.record.entity_id
    }
}

/// A maximal run of on-episode records for one entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Episode {
    pub episode_id: u64,
    pub entity_id: EntityId,
    /// Position of the first record in the entity's ordered subsequence
    /// (the entity's period when periods are enabled)
    pub start_index: usize,
    /// Position of the last record in the same subsequence
    pub end_index: usize,
    pub started_at: i64,
    pub ended_at: i64,
    pub total_weight: f64,
    pub closing_role: Role,
}

impl Episode {
    /// Number of records in the episode (always at least one)
    #[inline]
    pub fn record_count(&self) -> usize {
        self.end_index - self.start_index + 1
    }

    /// Elapsed ticks between first and last record
    #[inline]
    pub fn duration(&self) -> i64 {
        self.ended_at.saturating_sub(self.started_at)
    }
}

/// Output of one segmentation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Segmentation {
    /// Annotated records, in input order
    pub records: Vec<SegmentedRecord>,
    /// Episodes ordered by id
    pub episodes: Vec<Episode>,
    pub entity_count: usize,
}

impl Segmentation {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record positions of every episode in one pass over the records.
    ///
    /// Entry `i` holds episode `i + 1`, positions in input order.
    pub fn episode_positions(&self) -> Vec<EpisodePositions> {
        let mut buckets: Vec<EpisodePositions> = vec![EpisodePositions::new(); self.episodes.len()];
        for (pos, row) in self.records.iter().enumerate() {
            if row.episode_id == NO_EPISODE {
                continue;
            }
            if let Some(bucket) = buckets.get_mut((row.episode_id - 1) as usize) {
                bucket.push(pos);
            }
        }
        buckets
    }
}
