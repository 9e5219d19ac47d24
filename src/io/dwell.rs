//! Tower dwell adapter - CDR pings with dwell time onto `EventRecord`s
//!
//! Consecutive rows of one customer at the same tower are merged into a
//! single dwell segment by summing their dwell time. Segments shorter than
//! the threshold are dropped. Out-of-scope segments are kept only where
//! they border an in-scope one for the same customer, so a trip's way in
//! and out stays visible. Ticks are minutes.

use crate::domain::types::{EntityId, EventRecord};
use crate::io::sources::deserialize_timestamp;
use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::debug;

/// Minimum dwell time, in minutes, for a segment to count as a stop
pub const DEFAULT_MIN_DWELL_MINUTES: f64 = 20.0;

/// One CDR ping with the time spent at its tower
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TowerDwell {
    pub cust_id: i64,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub start_time: NaiveDateTime,
    pub tower_id: i64,
    /// Region label used for towers outside the city
    #[serde(default)]
    pub region_name: Option<String>,
    pub dwell_minutes: f64,
    #[serde(default)]
    pub near_airport: bool,
    #[serde(default)]
    pub in_florence_comune: bool,
}

impl TowerDwell {
    pub fn is_in_scope(&self) -> bool {
        self.in_florence_comune || self.near_airport
    }
}

/// Consecutive pings of one customer at one tower
#[derive(Debug, Clone, PartialEq)]
pub struct DwellSegment {
    pub cust_id: i64,
    pub tower_id: i64,
    pub region_name: Option<String>,
    pub started_at: NaiveDateTime,
    pub dwell_minutes: f64,
    pub in_scope: bool,
}

impl DwellSegment {
    fn open(row: &TowerDwell) -> Self {
        Self {
            cust_id: row.cust_id,
            tower_id: row.tower_id,
            region_name: row.region_name.clone(),
            started_at: row.start_time,
            dwell_minutes: row.dwell_minutes,
            in_scope: row.is_in_scope(),
        }
    }

    /// Towers in the city are named by id, the rest by region when known
    pub fn location(&self) -> String {
        match (&self.region_name, self.in_scope) {
            (Some(region), false) => region.clone(),
            _ => self.tower_id.to_string(),
        }
    }

    pub fn to_event(&self) -> EventRecord {
        let ts = self.started_at.and_utc().timestamp().div_euclid(60);
        EventRecord::new(EntityId(self.cust_id), ts, self.in_scope)
            .with_location(&self.location())
            .with_weight(self.dwell_minutes)
    }
}

/// Merge runs of same-customer same-tower rows, keeping segments whose
/// summed dwell time reaches `min_dwell_minutes`
pub fn merge_dwell(rows: &[TowerDwell], min_dwell_minutes: f64) -> Vec<DwellSegment> {
    let mut merged: Vec<DwellSegment> = Vec::new();
    for row in rows {
        let same_stop = merged
            .last()
            .is_some_and(|open| open.cust_id == row.cust_id && open.tower_id == row.tower_id);
        if !same_stop {
            merged.push(DwellSegment::open(row));
        } else if let Some(open) = merged.last_mut() {
            open.dwell_minutes += row.dwell_minutes;
        }
    }

    let before = merged.len();
    merged.retain(|s| s.dwell_minutes >= min_dwell_minutes);
    debug!(
        rows = %rows.len(),
        segments = %before,
        kept = %merged.len(),
        min_dwell_minutes = %min_dwell_minutes,
        "dwell_merged"
    );
    merged
}

/// Keep in-scope segments and the out-of-scope ones next to a scope change
pub fn curate(segments: Vec<DwellSegment>) -> Vec<DwellSegment> {
    let borders = |i: usize, j: usize| {
        segments[i].cust_id == segments[j].cust_id && segments[i].in_scope != segments[j].in_scope
    };

    let keep: Vec<bool> = (0..segments.len())
        .map(|i| {
            segments[i].in_scope
                || (i > 0 && borders(i, i - 1))
                || (i + 1 < segments.len() && borders(i, i + 1))
        })
        .collect();

    segments.into_iter().zip(keep).filter_map(|(s, keep)| keep.then_some(s)).collect()
}

/// Rows to segmenter input: merge, threshold, curate, map
pub fn to_events(rows: &[TowerDwell], min_dwell_minutes: f64) -> Vec<EventRecord> {
    curate(merge_dwell(rows, min_dwell_minutes)).iter().map(DwellSegment::to_event).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ping(cust: i64, minute: u32, tower: i64, dwell: f64, in_city: bool) -> TowerDwell {
        TowerDwell {
            cust_id: cust,
            start_time: chrono::NaiveDate::from_ymd_opt(2016, 6, 1)
                .unwrap()
                .and_hms_opt(8 + minute / 60, minute % 60, 0)
                .unwrap(),
            tower_id: tower,
            region_name: (!in_city).then(|| "Toscana".to_string()),
            dwell_minutes: dwell,
            near_airport: false,
            in_florence_comune: in_city,
        }
    }

    #[test]
    fn test_consecutive_same_tower_pings_merge() {
        let rows = vec![
            ping(1, 0, 10, 12.0, true),
            ping(1, 12, 10, 9.0, true),
            ping(1, 21, 11, 5.0, true),
            ping(1, 26, 10, 30.0, true),
        ];

        let segments = merge_dwell(&rows, DEFAULT_MIN_DWELL_MINUTES);

        // 12 + 9 reaches the threshold; the 5 minute stop does not
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].dwell_minutes, 21.0);
        assert_eq!(segments[0].started_at, rows[0].start_time);
        assert_eq!(segments[1].tower_id, 10);
        assert_eq!(segments[1].dwell_minutes, 30.0);
    }

    #[test]
    fn test_merge_does_not_cross_customers() {
        let rows = vec![ping(1, 0, 10, 15.0, true), ping(2, 0, 10, 15.0, true)];
        assert!(merge_dwell(&rows, DEFAULT_MIN_DWELL_MINUTES).is_empty());
    }

    #[test]
    fn test_curate_keeps_scope_borders() {
        let rows = vec![
            ping(1, 0, 1, 60.0, false),
            ping(1, 60, 2, 60.0, false),
            ping(1, 120, 3, 60.0, true),
            ping(1, 180, 4, 60.0, false),
            ping(1, 240, 5, 60.0, false),
        ];

        let kept: Vec<i64> = curate(merge_dwell(&rows, DEFAULT_MIN_DWELL_MINUTES))
            .iter()
            .map(|s| s.tower_id)
            .collect();
        assert_eq!(kept, vec![2, 3, 4]);
    }

    #[test]
    fn test_curate_ignores_other_customer_neighbours() {
        let rows = vec![ping(1, 0, 1, 60.0, false), ping(2, 0, 2, 60.0, true)];

        let kept: Vec<i64> = curate(merge_dwell(&rows, DEFAULT_MIN_DWELL_MINUTES))
            .iter()
            .map(|s| s.tower_id)
            .collect();
        assert_eq!(kept, vec![2]);
    }

    #[test]
    fn test_to_events_locations_and_weights() {
        let rows = vec![ping(7, 0, 1, 40.0, false), ping(7, 40, 2, 25.0, true)];

        let events = to_events(&rows, DEFAULT_MIN_DWELL_MINUTES);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].location.as_deref(), Some("Toscana"));
        assert!(!events[0].in_scope);
        assert_eq!(events[1].location.as_deref(), Some("2"));
        assert_eq!(events[1].weight, 25.0);
        assert_eq!(events[1].ts - events[0].ts, 40);
    }

    #[test]
    fn test_airport_counts_as_in_scope() {
        let mut row = ping(1, 0, 9, 30.0, false);
        row.near_airport = true;
        assert!(row.is_in_scope());
        assert_eq!(DwellSegment::open(&row).location(), "9");
    }
}
