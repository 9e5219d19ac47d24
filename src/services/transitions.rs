//! Transition edge list over episode paths
//!
//! Each episode is read as a path `start -> loc_0 -> ... -> loc_n`, closed
//! with `loc_n -> end` when its last record carries an `end` or `last` role.
//! `start` and `end` are virtual nodes; the origin node can be renamed
//! (`source` for the CDR network). Records without a location are skipped.

use crate::domain::episode::Segmentation;
use crate::domain::types::Role;
use rustc_hash::FxHashMap;
use serde::Serialize;

/// Name of the virtual node episodes start from
pub const START_NODE: &str = "start";
/// Name of the virtual node closed episodes lead to
pub const END_NODE: &str = "end";

/// Aggregated directed edge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub count: u64,
    /// Sum of the destination records' weights (people, calls)
    pub weight: f64,
}

/// Builds an edge list from a segmentation
#[derive(Debug, Clone)]
pub struct TransitionBuilder {
    collapse_repeats: bool,
    origin: String,
}

impl Default for TransitionBuilder {
    fn default() -> Self {
        Self { collapse_repeats: false, origin: START_NODE.to_string() }
    }
}

impl TransitionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the virtual node every path starts from
    pub fn origin_node(mut self, name: &str) -> Self {
        self.origin = name.to_string();
        self
    }

    /// Merge consecutive records at the same location (dwell transitions)
    pub fn collapse_repeats(mut self, collapse: bool) -> Self {
        self.collapse_repeats = collapse;
        self
    }

    /// Aggregate edges over all episodes, sorted by `(from, to)`
    pub fn build(&self, seg: &Segmentation) -> Vec<Edge> {
        let mut edges: FxHashMap<(String, String), (u64, f64)> = FxHashMap::default();
        let mut add = |from: &str, to: &str, weight: f64| {
            let entry = edges.entry((from.to_string(), to.to_string())).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += weight;
        };

        for positions in seg.episode_positions() {
            let mut previous: Option<&str> = None;
            let mut closing = Role::None;

            for &pos in &positions {
                let row = &seg.records[pos];
                closing = row.role;
                let Some(location) = row.record.location.as_deref() else {
                    continue;
                };
                let from = match previous {
                    Some(prev) if self.collapse_repeats && prev == location => continue,
                    Some(prev) => prev,
                    None => self.origin.as_str(),
                };
                add(from, location, row.record.weight);
                previous = Some(location);
            }

            if let Some(last) = previous {
                if closing.closes_episode() {
                    add(last, END_NODE, 0.0);
                }
            }
        }

        let mut list: Vec<Edge> = edges
            .into_iter()
            .map(|((from, to), (count, weight))| Edge { from, to, count, weight })
            .collect();
        list.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));

        tracing::debug!(edges = %list.len(), episodes = %seg.episodes.len(), "transitions_built");
        list
    }
}
