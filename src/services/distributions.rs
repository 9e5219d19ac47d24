//! Frequency tables derived from a segmentation
//!
//! Every reducer here is a pure function of the segmenter output.

use crate::domain::episode::{Segmentation, NO_EPISODE};
use crate::domain::types::EntityId;
use serde::Serialize;
use std::collections::BTreeMap;

/// One distinct value and its share of the total
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyRow {
    pub value: i64,
    pub frequency: u64,
    pub percentage: f64,
    pub cumulative: f64,
    pub ccdf: f64,
}

/// Frequency of each distinct value, sorted ascending by value
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FrequencyTable {
    rows: Vec<FrequencyRow>,
}

impl FrequencyTable {
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        let mut counts: BTreeMap<i64, u64> = BTreeMap::new();
        for value in values {
            *counts.entry(value).or_insert(0) += 1;
        }

        let total: u64 = counts.values().sum();
        if total == 0 {
            return Self::default();
        }

        let mut running = 0u64;
        let rows = counts
            .into_iter()
            .map(|(value, frequency)| {
                running += frequency;
                let cumulative = running as f64 / total as f64;
                FrequencyRow {
                    value,
                    frequency,
                    percentage: frequency as f64 / total as f64,
                    cumulative,
                    ccdf: 1.0 - cumulative,
                }
            })
            .collect();

        Self { rows }
    }

    pub fn rows(&self) -> &[FrequencyRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum of all frequencies
    pub fn total(&self) -> u64 {
        self.rows.iter().map(|r| r.frequency).sum()
    }

    /// Frequency of one value, 0 when absent
    pub fn frequency_of(&self, value: i64) -> u64 {
        self.rows
            .binary_search_by_key(&value, |r| r.value)
            .map(|i| self.rows[i].frequency)
            .unwrap_or(0)
    }

    /// First `n` rows (smallest values)
    pub fn head(&self, n: usize) -> &[FrequencyRow] {
        &self.rows[..n.min(self.rows.len())]
    }

    /// `value -> frequency` view
    pub fn to_map(&self) -> BTreeMap<i64, u64> {
        self.rows.iter().map(|r| (r.value, r.frequency)).collect()
    }
}

/// Records per episode
pub fn episode_length_distribution(seg: &Segmentation) -> FrequencyTable {
    FrequencyTable::from_values(seg.episodes.iter().map(|e| e.record_count() as i64))
}

/// Defined gaps strictly greater than zero, over all records
pub fn gap_length_distribution(seg: &Segmentation) -> FrequencyTable {
    FrequencyTable::from_values(seg.records.iter().filter_map(|r| r.gap).filter(|&g| g > 0))
}

/// Distinct episodes per entity; entities without an episode are absent
pub fn episodes_per_entity(seg: &Segmentation) -> BTreeMap<EntityId, usize> {
    let mut counts: BTreeMap<EntityId, usize> = BTreeMap::new();
    for episode in &seg.episodes {
        debug_assert_ne!(episode.episode_id, NO_EPISODE);
        *counts.entry(episode.entity_id).or_insert(0) += 1;
    }
    counts
}

/// How many entities made 1, 2, ... episodes
pub fn episode_count_distribution(seg: &Segmentation) -> FrequencyTable {
    FrequencyTable::from_values(episodes_per_entity(seg).into_values().map(|n| n as i64))
}

/// Episode lengths for entities with exactly one episode
pub fn single_episode_length_distribution(seg: &Segmentation) -> FrequencyTable {
    let counts = episodes_per_entity(seg);
    FrequencyTable::from_values(
        seg.episodes
            .iter()
            .filter(|e| counts.get(&e.entity_id) == Some(&1))
            .map(|e| e.record_count() as i64),
    )
}
