//! Run report - everything downstream consumers need from one run

use crate::domain::episode::Segmentation;
use crate::services::distributions::{self, FrequencyTable};
use crate::services::paths::{self, LocationWeight, PathCount};
use crate::services::segmenter::SegmenterConfig;
use crate::services::transitions::{Edge, TransitionBuilder};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// Summary of one segmentation run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String, // UUIDv7
    pub build: &'static str,
    pub source: String,
    pub gap_length: i64,
    pub only_start: bool,
    pub period_length: Option<i64>,
    pub records: usize,
    pub entities: usize,
    pub episodes: usize,
    pub on_episode_records: usize,
    pub episode_lengths: FrequencyTable,
    pub gap_lengths: FrequencyTable,
    pub episode_counts: FrequencyTable,
    pub single_episode_lengths: FrequencyTable,
    pub transitions: Vec<Edge>,
    pub paths: Vec<PathCount>,
    pub entry_locations: Vec<LocationWeight>,
    pub exit_locations: Vec<LocationWeight>,
    pub location_density: Vec<LocationWeight>,
}

impl RunReport {
    pub fn build(
        seg: &Segmentation,
        config: &SegmenterConfig,
        source: &str,
        transitions: &TransitionBuilder,
    ) -> Self {
        Self {
            run_id: Uuid::now_v7().to_string(),
            build: env!("GIT_HASH"),
            source: source.to_string(),
            gap_length: config.gap_length,
            only_start: config.only_start,
            period_length: config.period_length,
            records: seg.records.len(),
            entities: seg.entity_count,
            episodes: seg.episodes.len(),
            on_episode_records: seg.records.iter().filter(|r| r.on_episode).count(),
            episode_lengths: distributions::episode_length_distribution(seg),
            gap_lengths: distributions::gap_length_distribution(seg),
            episode_counts: distributions::episode_count_distribution(seg),
            single_episode_lengths: distributions::single_episode_length_distribution(seg),
            transitions: transitions.build(seg),
            paths: paths::path_frequencies(seg),
            entry_locations: paths::entry_locations(seg),
            exit_locations: paths::exit_locations(seg),
            location_density: paths::location_density(seg),
        }
    }

    /// Log the first `top_n` rows of each distribution
    pub fn log_summary(&self, top_n: usize) {
        info!(
            run_id = %self.run_id,
            records = %self.records,
            entities = %self.entities,
            episodes = %self.episodes,
            on_episode_records = %self.on_episode_records,
            edges = %self.transitions.len(),
            paths = %self.paths.len(),
            "run_summary"
        );

        for row in self.paths.iter().take(top_n) {
            info!(
                path = %row.path,
                frequency = %row.frequency,
                percentage = %format!("{:.4}", row.percentage),
                "path_row"
            );
        }

        for (name, table) in [
            ("episode_length", &self.episode_lengths),
            ("gap_length", &self.gap_lengths),
            ("episode_count", &self.episode_counts),
            ("single_episode_length", &self.single_episode_lengths),
        ] {
            for row in table.head(top_n) {
                info!(
                    distribution = %name,
                    value = %row.value,
                    frequency = %row.frequency,
                    percentage = %format!("{:.4}", row.percentage),
                    ccdf = %format!("{:.4}", row.ccdf),
                    "distribution_row"
                );
            }
        }
    }
}
