//! End-to-end tests: JSONL source -> segmenter -> egress

use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::{tempdir, NamedTempFile};
use trip_segmenter::domain::{EntityId, OrderPolicy, Role};
use trip_segmenter::io::egress::{EPISODES_FILE, RECORDS_FILE, REPORT_FILE};
use trip_segmenter::io::{load_events, Egress, InputFormat, SourceOptions};
use trip_segmenter::services::{
    RunReport, SegmentError, Segmenter, SegmenterConfig, TransitionBuilder,
};

fn jsonl_file(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file.flush().unwrap();
    file
}

fn read_lines(path: &Path) -> Vec<serde_json::Value> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn test_daily_calls_trips() {
    // Customer 7: in the city on 1-2 June, away on the 5th, back on the 6th
    let input = jsonl_file(&[
        r#"{"cust_id": 7, "date": "2016-06-01", "calls": 4, "calls_in_florence": 4}"#,
        r#"{"cust_id": 7, "date": "2016-06-02", "calls": 2, "calls_in_florence": 1}"#,
        r#"{"cust_id": 7, "date": "2016-06-05", "calls": 3, "calls_in_florence": 0}"#,
        r#"{"cust_id": 7, "date": "2016-06-06", "calls": 1, "calls_in_florence": 0, "calls_near_airport": 1}"#,
        r#"{"cust_id": 8, "date": "2016-06-01", "calls": 1, "calls_in_florence": 0}"#,
    ]);
    let options = SourceOptions::for_format(InputFormat::DailyCalls);
    let records = load_events(input.path(), &options).unwrap();

    let seg = Segmenter::new(SegmenterConfig::default()).segment(records).unwrap();

    let roles: Vec<Role> = seg.records.iter().map(|r| r.role).collect();
    assert_eq!(roles, vec![Role::First, Role::End, Role::None, Role::Start, Role::None]);
    let ids: Vec<u64> = seg.records.iter().map(|r| r.episode_id).collect();
    assert_eq!(ids, vec![1, 1, 0, 2, 0]);
    assert_eq!(seg.entity_count, 2);
    assert_eq!(seg.episodes[0].total_weight, 6.0);
}

#[test]
fn test_airport_excluded_from_scope() {
    let input = jsonl_file(&[
        r#"{"cust_id": 1, "date": "2016-06-01", "calls": 1, "calls_in_florence": 0}"#,
        r#"{"cust_id": 1, "date": "2016-06-02", "calls": 1, "calls_in_florence": 0, "calls_near_airport": 1}"#,
    ]);
    let options =
        SourceOptions { include_airport: false, ..SourceOptions::for_format(InputFormat::DailyCalls) };
    let records = load_events(input.path(), &options).unwrap();

    let seg = Segmenter::new(SegmenterConfig::default()).segment(records).unwrap();
    assert!(seg.episodes.is_empty());
}

#[test]
fn test_museum_entries_full_run() {
    let input = jsonl_file(&[
        r#"{"user_id": 1, "entry_time": "2016-06-01 09:00:00", "museum_id": 1, "short_name": "Uffizi", "total_adults": 1, "minors": 1}"#,
        r#"{"user_id": 2, "entry_time": "2016-06-01 09:30:00", "museum_id": 2, "short_name": "Accademia"}"#,
        r#"{"user_id": 1, "entry_time": "2016-06-01 13:00:00", "museum_id": 3, "short_name": "Bargello", "total_adults": 1, "minors": 1}"#,
        r#"{"user_id": 1, "entry_time": "2016-06-03 10:00:00", "museum_id": 2, "short_name": "Accademia", "total_adults": 1, "minors": 1}"#,
    ]);
    let options = SourceOptions::for_format(InputFormat::MuseumEntries);
    let records = load_events(input.path(), &options).unwrap();

    // A visit breaks after 12 hours without an entry
    let config = SegmenterConfig::default().with_gap_length(720);
    let seg = Segmenter::new(config).segment(records).unwrap();

    let roles: Vec<Role> = seg.records.iter().map(|r| r.role).collect();
    assert_eq!(roles, vec![Role::First, Role::First, Role::Continue, Role::Last]);
    // The 3 June entry is too far from the previous one to extend the visit
    let ids: Vec<u64> = seg.records.iter().map(|r| r.episode_id).collect();
    assert_eq!(ids, vec![1, 2, 1, 3]);

    let dir = tempdir().unwrap();
    let egress = Egress::new(dir.path());
    egress.write_segmentation(&seg).unwrap();

    let transitions = TransitionBuilder::new();
    let report = RunReport::build(&seg, &config, "museum_entries", &transitions);
    egress.write_report(&report).unwrap();

    let rows = read_lines(&dir.path().join(RECORDS_FILE));
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[2]["location"], "Bargello");
    assert_eq!(rows[2]["gap"], 240);

    let episodes = read_lines(&dir.path().join(EPISODES_FILE));
    assert_eq!(episodes.len(), 3);
    assert_eq!(episodes[0]["entity_id"], 1);
    assert_eq!(episodes[0]["end_index"], 1);
    assert_eq!(episodes[2]["start_index"], 2);

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join(REPORT_FILE)).unwrap()).unwrap();
    assert_eq!(report["episodes"], 3);
    assert_eq!(report["source"], "museum_entries");
    let edges = report["transitions"].as_array().unwrap();
    assert!(edges.iter().any(|e| e["from"] == "Uffizi" && e["to"] == "Bargello"));
    assert!(edges.iter().any(|e| e["from"] == "Accademia" && e["to"] == "end"));
}

#[test]
fn test_museum_card_days_are_separate_visits() {
    let input = jsonl_file(&[
        r#"{"user_id": 5, "entry_time": "2016-06-01 09:00:00", "museum_id": 1, "short_name": "Uffizi"}"#,
        r#"{"user_id": 5, "entry_time": "2016-06-01 11:00:00", "museum_id": 3, "short_name": "Bargello"}"#,
        r#"{"user_id": 5, "entry_time": "2016-06-03 09:00:00", "museum_id": 2, "short_name": "Accademia"}"#,
        r#"{"user_id": 5, "entry_time": "2016-06-03 11:00:00", "museum_id": 4, "short_name": "Duomo"}"#,
    ]);
    let records =
        load_events(input.path(), &SourceOptions::for_format(InputFormat::MuseumEntries)).unwrap();

    let config = SegmenterConfig::default().with_gap_length(720).with_period_length(Some(1440));
    let seg = Segmenter::new(config).segment(records).unwrap();

    let roles: Vec<Role> = seg.records.iter().map(|r| r.role).collect();
    assert_eq!(roles, vec![Role::First, Role::End, Role::First, Role::End]);
    let ids: Vec<u64> = seg.records.iter().map(|r| r.episode_id).collect();
    assert_eq!(ids, vec![1, 1, 2, 2]);
    assert_eq!(seg.entity_count, 1);

    let report = RunReport::build(&seg, &config, "museum_entries", &TransitionBuilder::new());
    let edges: Vec<(&str, &str)> =
        report.transitions.iter().map(|e| (e.from.as_str(), e.to.as_str())).collect();
    assert_eq!(
        edges,
        vec![
            ("Accademia", "Duomo"),
            ("Bargello", "end"),
            ("Duomo", "end"),
            ("Uffizi", "Bargello"),
            ("start", "Accademia"),
            ("start", "Uffizi"),
        ]
    );

    let paths: Vec<(&str, u64)> =
        report.paths.iter().map(|p| (p.path.as_str(), p.frequency)).collect();
    assert_eq!(paths, vec![("Accademia > Duomo", 1), ("Uffizi > Bargello", 1)]);
    assert_eq!(report.episode_counts.frequency_of(2), 1);
}

#[test]
fn test_tower_dwell_network() {
    let input = jsonl_file(&[
        r#"{"cust_id": 3, "start_time": "2016-06-01 07:00:00", "tower_id": 900, "region_name": "Pisa", "dwell_minutes": 60.0}"#,
        r#"{"cust_id": 3, "start_time": "2016-06-01 08:00:00", "tower_id": 11, "dwell_minutes": 15.0, "in_florence_comune": true}"#,
        r#"{"cust_id": 3, "start_time": "2016-06-01 08:15:00", "tower_id": 11, "dwell_minutes": 15.0, "in_florence_comune": true}"#,
        r#"{"cust_id": 3, "start_time": "2016-06-01 08:30:00", "tower_id": 12, "dwell_minutes": 3.0, "in_florence_comune": true}"#,
        r#"{"cust_id": 3, "start_time": "2016-06-01 08:33:00", "tower_id": 14, "dwell_minutes": 90.0, "in_florence_comune": true}"#,
        r#"{"cust_id": 3, "start_time": "2016-06-01 10:03:00", "tower_id": 900, "region_name": "Pisa", "dwell_minutes": 300.0}"#,
    ]);
    let records =
        load_events(input.path(), &SourceOptions::for_format(InputFormat::TowerDwell)).unwrap();

    // Merged 11 (30 min) and 14; the 3 minute stop at 12 is dropped
    let locations: Vec<&str> = records.iter().filter_map(|r| r.location.as_deref()).collect();
    assert_eq!(locations, vec!["Pisa", "11", "14", "Pisa"]);

    let config = SegmenterConfig::default().with_gap_length(720);
    let seg = Segmenter::new(config).segment(records).unwrap();
    let roles: Vec<Role> = seg.records.iter().map(|r| r.role).collect();
    assert_eq!(roles, vec![Role::None, Role::Start, Role::End, Role::None]);

    let transitions = TransitionBuilder::new().collapse_repeats(true).origin_node("source");
    let report = RunReport::build(&seg, &config, "tower_dwell", &transitions);
    let edges: Vec<(&str, &str, u64)> = report
        .transitions
        .iter()
        .map(|e| (e.from.as_str(), e.to.as_str(), e.count))
        .collect();
    assert_eq!(edges, vec![("11", "14", 1), ("14", "end", 1), ("source", "11", 1)]);

    assert_eq!(report.entry_locations[0].location, "11");
    assert_eq!(report.exit_locations[0].location, "14");
    assert_eq!(report.location_density[0].location, "14");
    assert_eq!(report.location_density[0].weight, 90.0);
}

#[test]
fn test_out_of_order_input() {
    let input = jsonl_file(&[
        r#"{"entity_id": 3, "ts": 10, "in_scope": true}"#,
        r#"{"entity_id": 3, "ts": 4, "in_scope": true}"#,
    ]);
    let records = load_events(input.path(), &SourceOptions::default()).unwrap();

    let err = Segmenter::new(SegmenterConfig::default()).segment(records.clone()).unwrap_err();
    assert!(matches!(err, SegmentError::InvalidInput { entity: EntityId(3), position: 1, .. }));

    let sorted = Segmenter::new(SegmenterConfig::default().with_order_policy(OrderPolicy::Sort))
        .segment(records)
        .unwrap();
    assert_eq!(sorted.records[0].record.ts, 4);
    assert_eq!(sorted.records[1].role, Role::Last);
}
