//! Episode segmentation over per-entity event sequences
//!
//! Labels every record with an episode boundary role and groups consecutive
//! on-episode records into episodes. Works on one batch in a single pass:
//! - Records of different entities may be interleaved; each entity only sees
//!   its own previous/next record
//! - Gaps are measured between consecutive records of the same entity
//! - With a period length set, each entity is split into calendar periods
//!   (days) that are segmented independently
//! - Episode ids are dense (1..) in input order of each episode's first record

use crate::domain::episode::{Episode, SegmentedRecord, Segmentation, NO_EPISODE};
use crate::domain::types::{EntityId, EventRecord, OrderPolicy, Role};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tracing::{debug, info, warn};

/// Default gap threshold, in source ticks
pub const DEFAULT_GAP_LENGTH: i64 = 3;

/// Positions of one entity's records in the input batch
type EntityPositions = SmallVec<[usize; 8]>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SegmentError {
    #[error(
        "records out of order for entity {entity} at position {position}: \
         ts {ts} follows ts {previous_ts}"
    )]
    InvalidInput { entity: EntityId, position: usize, previous_ts: i64, ts: i64 },

    #[error(
        "gap overflows for entity {entity} at position {position}: \
         ts {ts} after ts {previous_ts}"
    )]
    GapOverflow { entity: EntityId, position: usize, previous_ts: i64, ts: i64 },
}

/// Segmenter parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmenterConfig {
    /// A gap must be strictly below this to continue or start an episode
    pub gap_length: i64,
    /// Skip `end`/`last` roles
    pub only_start: bool,
    pub order_policy: OrderPolicy,
    /// Ticks per calendar period; an entity's records in different periods
    /// (`ts / period_length`) never share neighbours or episodes
    pub period_length: Option<i64>,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            gap_length: DEFAULT_GAP_LENGTH,
            only_start: false,
            order_policy: OrderPolicy::Reject,
            period_length: None,
        }
    }
}

impl SegmenterConfig {
    pub fn with_gap_length(mut self, gap_length: i64) -> Self {
        self.gap_length = gap_length;
        self
    }

    pub fn with_only_start(mut self, only_start: bool) -> Self {
        self.only_start = only_start;
        self
    }

    pub fn with_order_policy(mut self, order_policy: OrderPolicy) -> Self {
        self.order_policy = order_policy;
        self
    }

    pub fn with_period_length(mut self, period_length: Option<i64>) -> Self {
        self.period_length = period_length;
        self
    }
}

/// Neighbourhood of one record within its entity's subsequence
#[derive(Debug, Clone, Copy)]
struct RowContext {
    in_scope: bool,
    is_first: bool,
    is_last: bool,
    gap: Option<i64>,
    was_in_scope: Option<bool>,
    will_be_in_scope: Option<bool>,
}

/// A run of on-episode records found for one entity, before numbering
#[derive(Debug, Clone, Copy)]
struct Run {
    first_position: usize,
    group: usize,
    start: usize,
    end: usize,
}

/// Partitions per-entity event sequences into episodes
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    config: SegmenterConfig,
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Segment a batch of records.
    ///
    /// The output keeps the input order and length. An empty batch yields
    /// an empty segmentation. With `period_length` set, every
    /// (entity, period) pair is its own subsequence: time order is only
    /// checked inside it and episode positions are relative to it.
    ///
    /// # Example
    ///
    /// ```
    /// use trip_segmenter::domain::{EntityId, EventRecord, Role};
    /// use trip_segmenter::services::segmenter::{Segmenter, SegmenterConfig};
    ///
    /// let records = vec![
    ///     EventRecord::new(EntityId(1), 0, false),
    ///     EventRecord::new(EntityId(1), 1, true),
    /// ];
    /// let seg = Segmenter::new(SegmenterConfig::default()).segment(records).unwrap();
    /// assert_eq!(seg.records[1].role, Role::Start);
    /// assert_eq!(seg.records[1].episode_id, 1);
    /// ```
    pub fn segment(&self, mut records: Vec<EventRecord>) -> Result<Segmentation, SegmentError> {
        if records.is_empty() {
            debug!("segment_empty_input");
            return Ok(Segmentation::default());
        }

        let period_length = self.config.period_length.filter(|&p| p > 0);
        let (groups, entity_count) = group_by_entity(&records, period_length);
        for positions in &groups {
            self.enforce_order(&mut records, positions)?;
        }

        let mut rows: Vec<SegmentedRecord> =
            records.into_iter().map(SegmentedRecord::unlabelled).collect();

        let mut runs: Vec<Run> = Vec::new();
        for (group, positions) in groups.iter().enumerate() {
            self.label_entity(&mut rows, positions)?;
            collect_runs(&rows, positions, group, self.config.gap_length, &mut runs);
        }

        let episodes = number_episodes(&mut rows, &groups, &mut runs);

        info!(
            records = %rows.len(),
            entities = %entity_count,
            subsequences = %groups.len(),
            episodes = %episodes.len(),
            gap_length = %self.config.gap_length,
            only_start = %self.config.only_start,
            "segmentation_complete"
        );

        Ok(Segmentation { records: rows, episodes, entity_count })
    }

    /// Check (or repair) the time order of one entity's records
    fn enforce_order(
        &self,
        records: &mut [EventRecord],
        positions: &EntityPositions,
    ) -> Result<(), SegmentError> {
        let regression = positions
            .windows(2)
            .find(|pair| records[pair[1]].ts < records[pair[0]].ts)
            .map(|pair| (pair[0], pair[1]));

        let Some((prev, pos)) = regression else {
            return Ok(());
        };

        match self.config.order_policy {
            OrderPolicy::Reject => Err(SegmentError::InvalidInput {
                entity: records[pos].entity_id,
                position: pos,
                previous_ts: records[prev].ts,
                ts: records[pos].ts,
            }),
            OrderPolicy::Sort => {
                warn!(
                    entity = %records[pos].entity_id,
                    position = %pos,
                    "entity_records_resorted"
                );
                let mut sorted: Vec<EventRecord> =
                    positions.iter().map(|&p| records[p].clone()).collect();
                sorted.sort_by_key(|r| r.ts);
                for (&p, record) in positions.iter().zip(sorted) {
                    records[p] = record;
                }
                Ok(())
            }
        }
    }

    /// Fill neighbour fields and roles for one entity
    fn label_entity(
        &self,
        rows: &mut [SegmentedRecord],
        positions: &EntityPositions,
    ) -> Result<(), SegmentError> {
        for (k, &pos) in positions.iter().enumerate() {
            let prev = k.checked_sub(1).map(|j| positions[j]);
            let next = positions.get(k + 1).copied();

            let gap = match prev {
                Some(p) => {
                    let (previous_ts, ts) = (rows[p].record.ts, rows[pos].record.ts);
                    let gap = ts.checked_sub(previous_ts).ok_or(SegmentError::GapOverflow {
                        entity: rows[pos].entity_id(),
                        position: pos,
                        previous_ts,
                        ts,
                    })?;
                    Some(gap)
                }
                None => None,
            };

            let ctx = RowContext {
                in_scope: rows[pos].record.in_scope,
                is_first: prev.is_none(),
                is_last: next.is_none(),
                gap,
                was_in_scope: prev.map(|p| rows[p].record.in_scope),
                will_be_in_scope: next.map(|p| rows[p].record.in_scope),
            };
            let role = self.assign_role(&ctx);

            let row = &mut rows[pos];
            row.is_first_of_entity = ctx.is_first;
            row.is_last_of_entity = ctx.is_last;
            row.gap = ctx.gap;
            row.was_in_scope = ctx.was_in_scope;
            row.will_be_in_scope = ctx.will_be_in_scope;
            row.role = role;
            row.on_episode = role.is_on_episode();
        }
        Ok(())
    }

    /// Apply the role rules from least to most specific; later matches win
    fn assign_role(&self, ctx: &RowContext) -> Role {
        let mut role = Role::None;
        if !ctx.in_scope {
            return role;
        }

        if ctx.is_first {
            role = Role::First;
        }

        if !self.config.only_start && !ctx.is_first && ctx.is_last {
            role = Role::Last;
        }

        let within_gap = ctx.gap.is_some_and(|g| g < self.config.gap_length);
        if ctx.is_first || !within_gap {
            return role;
        }

        if ctx.was_in_scope == Some(true) {
            role = Role::Continue;
            if !self.config.only_start && ctx.will_be_in_scope != Some(true) {
                role = Role::End;
            }
        } else {
            role = Role::Start;
        }

        role
    }
}

/// Group record positions by entity (and period), in order of first
/// appearance. Also returns the number of distinct entities.
fn group_by_entity(
    records: &[EventRecord],
    period_length: Option<i64>,
) -> (Vec<EntityPositions>, usize) {
    let mut index: FxHashMap<(EntityId, i64), usize> = FxHashMap::default();
    let mut entities: FxHashSet<EntityId> = FxHashSet::default();
    let mut groups: Vec<EntityPositions> = Vec::new();

    for (pos, record) in records.iter().enumerate() {
        let period = period_length.map_or(0, |p| record.ts.div_euclid(p));
        let group = *index.entry((record.entity_id, period)).or_insert_with(|| {
            groups.push(EntityPositions::new());
            groups.len() - 1
        });
        groups[group].push(pos);
        entities.insert(record.entity_id);
    }

    (groups, entities.len())
}

/// Find maximal on-episode runs within one entity.
///
/// A run also breaks where the gap reaches the threshold, so an in-scope
/// `last` record far from its predecessor forms its own episode.
fn collect_runs(
    rows: &[SegmentedRecord],
    positions: &EntityPositions,
    group: usize,
    gap_length: i64,
    runs: &mut Vec<Run>,
) {
    let before = runs.len();
    let mut open: Option<usize> = None;
    for (k, &pos) in positions.iter().enumerate() {
        let row = &rows[pos];
        let within_gap = row.gap.is_some_and(|g| g < gap_length);
        match (row.on_episode, open) {
            (true, None) => open = Some(k),
            (true, Some(start)) if !within_gap => {
                runs.push(Run { first_position: positions[start], group, start, end: k - 1 });
                open = Some(k);
            }
            (false, Some(start)) => {
                runs.push(Run { first_position: positions[start], group, start, end: k - 1 });
                open = None;
            }
            _ => {}
        }
    }
    if let Some(start) = open {
        runs.push(Run { first_position: positions[start], group, start, end: positions.len() - 1 });
    }

    debug!(
        entity = %rows[positions[0]].entity_id(),
        records = %positions.len(),
        runs = %(runs.len() - before),
        "entity_segmented"
    );
}

/// Assign episode ids in input order of each run's first record
fn number_episodes(
    rows: &mut [SegmentedRecord],
    groups: &[EntityPositions],
    runs: &mut [Run],
) -> Vec<Episode> {
    runs.sort_by_key(|r| r.first_position);

    let mut episodes = Vec::with_capacity(runs.len());
    for (i, run) in runs.iter().enumerate() {
        let episode_id = i as u64 + 1;
        let positions = &groups[run.group][run.start..=run.end];

        let mut total_weight = 0.0;
        for &pos in positions {
            rows[pos].episode_id = episode_id;
            total_weight += rows[pos].record.weight;
        }

        let first = &rows[positions[0]];
        let last = &rows[positions[positions.len() - 1]];
        episodes.push(Episode {
            episode_id,
            entity_id: first.entity_id(),
            start_index: run.start,
            end_index: run.end,
            started_at: first.record.ts,
            ended_at: last.record.ts,
            total_weight,
            closing_role: last.role,
        });
    }

    debug_assert!(rows.iter().all(|r| r.on_episode || r.episode_id == NO_EPISODE));
    episodes
}
