//! Shared types for the trip segmenter

use serde::{Deserialize, Serialize};

/// Newtype wrapper for entity IDs (customer, card) to provide type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct EntityId(pub i64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn default_weight() -> f64 {
    1.0
}

/// A single dated event for one entity, as handed to the segmenter.
///
/// `ts` is expressed in source ticks: days for daily call counts, minutes
/// for museum entries. The gap threshold is compared in the same unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub entity_id: EntityId,
    pub ts: i64,
    #[serde(default)]
    pub location: Option<String>,
    pub in_scope: bool,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl EventRecord {
    pub fn new(entity_id: EntityId, ts: i64, in_scope: bool) -> Self {
        Self { entity_id, ts, location: None, in_scope, weight: default_weight() }
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

/// Episode boundary role assigned to each record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    First,
    Continue,
    Start,
    End,
    Last,
    #[default]
    #[serde(rename = "")]
    None,
}

impl Role {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::First => "first",
            Role::Continue => "continue",
            Role::Start => "start",
            Role::End => "end",
            Role::Last => "last",
            Role::None => "",
        }
    }

    /// True for every role except the empty one
    #[inline]
    pub fn is_on_episode(&self) -> bool {
        !matches!(self, Role::None)
    }

    /// Roles that close an episode run
    #[inline]
    pub fn closes_episode(&self) -> bool {
        matches!(self, Role::End | Role::Last)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the segmenter treats records that go back in time within an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderPolicy {
    /// Fail with `SegmentError::InvalidInput`
    #[default]
    Reject,
    /// Stable re-sort of each entity's records within that entity's own slots
    Sort,
}

impl std::str::FromStr for OrderPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reject" => Ok(OrderPolicy::Reject),
            "sort" => Ok(OrderPolicy::Sort),
            other => Err(format!("unknown order policy '{}' (expected reject|sort)", other)),
        }
    }
}
