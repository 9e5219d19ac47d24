//! Episode paths and location weights
//!
//! A path is the sequence of locations visited in one episode. With museum
//! entries split by day, that is one card's daily museum route. Paths are
//! encoded as location names joined by `PATH_SEPARATOR` and counted across
//! all entities and episodes.

use crate::domain::episode::Segmentation;
use rustc_hash::FxHashMap;
use serde::Serialize;

pub const PATH_SEPARATOR: &str = " > ";

/// How often one encoded path occurred
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathCount {
    pub path: String,
    pub frequency: u64,
    pub percentage: f64,
}

/// Weight of one location, with its share of the total
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationWeight {
    pub location: String,
    pub weight: f64,
    pub percentage: f64,
}

/// Encode every episode's locations as a path string, in episode id order.
///
/// Episodes with no located record produce no path.
pub fn episode_paths(seg: &Segmentation) -> Vec<String> {
    seg.episode_positions()
        .iter()
        .filter_map(|positions| {
            let stops: Vec<&str> = positions
                .iter()
                .filter_map(|&pos| seg.records[pos].record.location.as_deref())
                .collect();
            (!stops.is_empty()).then(|| stops.join(PATH_SEPARATOR))
        })
        .collect()
}

/// Path frequencies across all episodes, most common first (ties by path)
pub fn path_frequencies(seg: &Segmentation) -> Vec<PathCount> {
    let mut counts: FxHashMap<String, u64> = FxHashMap::default();
    for path in episode_paths(seg) {
        *counts.entry(path).or_insert(0) += 1;
    }

    let total: u64 = counts.values().sum();
    let mut rows: Vec<PathCount> = counts
        .into_iter()
        .map(|(path, frequency)| PathCount {
            path,
            frequency,
            percentage: frequency as f64 / total as f64,
        })
        .collect();
    rows.sort_by(|a, b| b.frequency.cmp(&a.frequency).then_with(|| a.path.cmp(&b.path)));
    rows
}

/// Where entities are first seen in scope, counted once per entity
pub fn entry_locations(seg: &Segmentation) -> Vec<LocationWeight> {
    boundary_locations(seg, false)
}

/// Where entities are last seen in scope, counted once per entity
pub fn exit_locations(seg: &Segmentation) -> Vec<LocationWeight> {
    boundary_locations(seg, true)
}

/// Summed record weight per location over in-scope records (dwell density
/// for tower dwell input)
pub fn location_density(seg: &Segmentation) -> Vec<LocationWeight> {
    let mut weights: FxHashMap<&str, f64> = FxHashMap::default();
    for row in seg.records.iter().filter(|r| r.record.in_scope) {
        if let Some(location) = row.record.location.as_deref() {
            *weights.entry(location).or_insert(0.0) += row.record.weight;
        }
    }
    ranked(weights)
}

fn boundary_locations(seg: &Segmentation, last: bool) -> Vec<LocationWeight> {
    // entity -> located in-scope record seen first (or last)
    let mut boundary: FxHashMap<_, &str> = FxHashMap::default();
    for row in seg.records.iter().filter(|r| r.record.in_scope) {
        let Some(location) = row.record.location.as_deref() else {
            continue;
        };
        if last {
            boundary.insert(row.entity_id(), location);
        } else {
            boundary.entry(row.entity_id()).or_insert(location);
        }
    }

    let mut weights: FxHashMap<&str, f64> = FxHashMap::default();
    for location in boundary.into_values() {
        *weights.entry(location).or_insert(0.0) += 1.0;
    }
    ranked(weights)
}

fn ranked(weights: FxHashMap<&str, f64>) -> Vec<LocationWeight> {
    let total: f64 = weights.values().sum();
    let mut rows: Vec<LocationWeight> = weights
        .into_iter()
        .map(|(location, weight)| LocationWeight {
            location: location.to_string(),
            weight,
            percentage: if total > 0.0 { weight / total } else { 0.0 },
        })
        .collect();
    rows.sort_by(|a, b| b.weight.total_cmp(&a.weight).then_with(|| a.location.cmp(&b.location)));
    rows
}
