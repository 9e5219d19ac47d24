//! Record sources - JSONL readers and schema adapters
//!
//! Upstream exports arrive as JSONL (one JSON object per line). Each source
//! schema is mapped onto `EventRecord`:
//! - `events` - rows are already `EventRecord`s
//! - `daily_calls` - per-customer daily call counts, ticks are days
//! - `museum_entries` - museum card entries, ticks are minutes
//! - `tower_dwell` - CDR pings with dwell time, ticks are minutes (see `dwell`)

use crate::domain::types::{EntityId, EventRecord};
use crate::io::dwell::{self, TowerDwell, DEFAULT_MIN_DWELL_MINUTES};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: {source}")]
    Parse {
        path: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Input schema of a record file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    #[default]
    Events,
    DailyCalls,
    MuseumEntries,
    TowerDwell,
}

impl InputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputFormat::Events => "events",
            InputFormat::DailyCalls => "daily_calls",
            InputFormat::MuseumEntries => "museum_entries",
            InputFormat::TowerDwell => "tower_dwell",
        }
    }
}

impl std::str::FromStr for InputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "events" => Ok(InputFormat::Events),
            "daily_calls" => Ok(InputFormat::DailyCalls),
            "museum_entries" => Ok(InputFormat::MuseumEntries),
            "tower_dwell" => Ok(InputFormat::TowerDwell),
            other => Err(format!(
                "unknown input format '{}' (expected events|daily_calls|museum_entries|tower_dwell)",
                other
            )),
        }
    }
}

/// Calls per customer per day
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DailyCallCount {
    pub cust_id: i64,
    pub date: NaiveDate,
    pub calls: u32,
    #[serde(alias = "calls_in_florence_city")]
    pub calls_in_florence: u32,
    #[serde(default)]
    pub calls_near_airport: u32,
}

impl DailyCallCount {
    /// In scope when the customer called from the city (or the airport)
    pub fn is_in_scope(&self, include_airport: bool) -> bool {
        self.calls_in_florence > 0 || (include_airport && self.calls_near_airport > 0)
    }

    pub fn to_event(&self, include_airport: bool) -> EventRecord {
        EventRecord::new(
            EntityId(self.cust_id),
            i64::from(self.date.num_days_from_ce()),
            self.is_in_scope(include_airport),
        )
        .with_weight(f64::from(self.calls))
    }
}

/// One museum card entry
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MuseumEntry {
    pub user_id: i64,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub entry_time: NaiveDateTime,
    pub museum_id: i64,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default = "default_adults")]
    pub total_adults: u32,
    #[serde(default)]
    pub minors: u32,
}

fn default_adults() -> u32 {
    1
}

/// Accepts "YYYY-MM-DD HH:MM:SS" as exported by the database, or ISO 8601
pub(crate) fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let raw = String::deserialize(deserializer)?;
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .map_err(|e| D::Error::custom(format!("invalid timestamp '{}': {}", raw, e)))
}

impl MuseumEntry {
    pub fn total_people(&self) -> u32 {
        self.total_adults + self.minors
    }

    /// Minutes since the Unix epoch
    pub fn ts_minutes(&self) -> i64 {
        self.entry_time.and_utc().timestamp().div_euclid(60)
    }

    pub fn to_event(&self) -> EventRecord {
        let location = match &self.short_name {
            Some(name) => name.clone(),
            None => self.museum_id.to_string(),
        };
        EventRecord::new(EntityId(self.user_id), self.ts_minutes(), true)
            .with_location(&location)
            .with_weight(f64::from(self.total_people()))
    }
}

/// Adapter options
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceOptions {
    pub format: InputFormat,
    /// Count calls near the airport as in scope (daily_calls only)
    pub include_airport: bool,
    /// Shortest dwell segment kept (tower_dwell only)
    pub min_dwell_minutes: f64,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            format: InputFormat::Events,
            include_airport: true,
            min_dwell_minutes: DEFAULT_MIN_DWELL_MINUTES,
        }
    }
}

impl SourceOptions {
    pub fn for_format(format: InputFormat) -> Self {
        Self { format, ..Self::default() }
    }
}

/// Parse a JSONL file into rows, skipping blank lines
pub fn read_jsonl<T, P>(path: P) -> Result<Vec<T>, SourceError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let path_str = path.display().to_string();
    let file = File::open(path).map_err(|source| SourceError::Io { path: path_str.clone(), source })?;

    let mut rows = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| SourceError::Io { path: path_str.clone(), source })?;
        if line.trim().is_empty() {
            continue;
        }
        let row = serde_json::from_str(&line).map_err(|source| SourceError::Parse {
            path: path_str.clone(),
            line: i + 1,
            source,
        })?;
        rows.push(row);
    }

    debug!(path = %path_str, rows = %rows.len(), "jsonl_read");
    Ok(rows)
}

/// Load a record file and map it onto `EventRecord`s, keeping file order
pub fn load_events<P: AsRef<Path>>(
    path: P,
    options: &SourceOptions,
) -> Result<Vec<EventRecord>, SourceError> {
    let path = path.as_ref();
    let events: Vec<EventRecord> = match options.format {
        InputFormat::Events => read_jsonl(path)?,
        InputFormat::DailyCalls => read_jsonl::<DailyCallCount, _>(path)?
            .iter()
            .map(|row| row.to_event(options.include_airport))
            .collect(),
        InputFormat::MuseumEntries => {
            read_jsonl::<MuseumEntry, _>(path)?.iter().map(MuseumEntry::to_event).collect()
        }
        InputFormat::TowerDwell => {
            dwell::to_events(&read_jsonl::<TowerDwell, _>(path)?, options.min_dwell_minutes)
        }
    };

    info!(
        path = %path.display(),
        format = %options.format.as_str(),
        records = %events.len(),
        in_scope = %events.iter().filter(|e| e.in_scope).count(),
        "records_loaded"
    );
    Ok(events)
}
