//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use crate::domain::types::OrderPolicy;
use crate::io::dwell::DEFAULT_MIN_DWELL_MINUTES;
use crate::io::sources::{InputFormat, SourceOptions};
use crate::services::segmenter::{SegmenterConfig, DEFAULT_GAP_LENGTH};
use crate::services::transitions::START_NODE;
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    /// JSONL file with the records to segment
    #[serde(default = "default_input_file")]
    pub file: String,
    #[serde(default)]
    pub format: InputFormat,
    /// Count calls near the airport as being in the city (daily_calls only)
    #[serde(default = "default_include_airport")]
    pub include_airport: bool,
    /// Shortest dwell segment kept, in minutes (tower_dwell only)
    #[serde(default = "default_min_dwell_minutes")]
    pub min_dwell_minutes: f64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            file: default_input_file(),
            format: InputFormat::default(),
            include_airport: default_include_airport(),
            min_dwell_minutes: default_min_dwell_minutes(),
        }
    }
}

fn default_input_file() -> String {
    "data/events.jsonl".to_string()
}

fn default_include_airport() -> bool {
    true
}

fn default_min_dwell_minutes() -> f64 {
    DEFAULT_MIN_DWELL_MINUTES
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmenterSection {
    /// Gap threshold in source ticks (days for daily_calls, minutes for museum_entries)
    #[serde(default = "default_gap_length")]
    pub gap_length: i64,
    #[serde(default)]
    pub only_start: bool,
    #[serde(default)]
    pub order_policy: OrderPolicy,
    /// Ticks per calendar period (1440 splits museum visits by day)
    #[serde(default)]
    pub period_length: Option<i64>,
}

impl Default for SegmenterSection {
    fn default() -> Self {
        Self {
            gap_length: default_gap_length(),
            only_start: false,
            order_policy: OrderPolicy::default(),
            period_length: None,
        }
    }
}

fn default_gap_length() -> i64 {
    DEFAULT_GAP_LENGTH
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { dir: default_output_dir() }
    }
}

fn default_output_dir() -> String {
    "output".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// Rows per distribution in the log summary
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Merge consecutive same-location records in the edge list
    #[serde(default)]
    pub collapse_repeats: bool,
    /// Name of the virtual node paths start from
    #[serde(default = "default_origin_node")]
    pub origin_node: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { top_n: default_top_n(), collapse_repeats: false, origin_node: default_origin_node() }
    }
}

fn default_top_n() -> usize {
    10
}

fn default_origin_node() -> String {
    START_NODE.to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub segmenter: SegmenterSection,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    input_file: String,
    input_format: InputFormat,
    include_airport: bool,
    min_dwell_minutes: f64,
    gap_length: i64,
    only_start: bool,
    order_policy: OrderPolicy,
    period_length: Option<i64>,
    output_dir: String,
    top_n: usize,
    collapse_repeats: bool,
    origin_node: String,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default")
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: &str) -> Self {
        Self {
            input_file: toml_config.input.file,
            input_format: toml_config.input.format,
            include_airport: toml_config.input.include_airport,
            min_dwell_minutes: toml_config.input.min_dwell_minutes,
            gap_length: toml_config.segmenter.gap_length,
            only_start: toml_config.segmenter.only_start,
            order_policy: toml_config.segmenter.order_policy,
            period_length: toml_config.segmenter.period_length,
            output_dir: toml_config.output.dir,
            top_n: toml_config.report.top_n,
            collapse_repeats: toml_config.report.collapse_repeats,
            origin_node: toml_config.report.origin_node,
            config_file: config_file.to_string(),
        }
    }

    /// Determine config file path from the command line or environment
    pub fn resolve_config_path(cli_path: Option<&str>) -> String {
        if let Some(path) = cli_path {
            return path.to_string();
        }

        // Check CONFIG_FILE environment variable
        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        if toml_config.segmenter.gap_length <= 0 {
            anyhow::bail!(
                "Invalid gap_length {} in {}: must be positive",
                toml_config.segmenter.gap_length,
                path.display()
            );
        }
        if let Some(period) = toml_config.segmenter.period_length.filter(|&p| p <= 0) {
            anyhow::bail!(
                "Invalid period_length {} in {}: must be positive",
                period,
                path.display()
            );
        }
        if toml_config.input.min_dwell_minutes < 0.0 {
            anyhow::bail!(
                "Invalid min_dwell_minutes {} in {}: must not be negative",
                toml_config.input.min_dwell_minutes,
                path.display()
            );
        }

        Ok(Self::from_toml(toml_config, &path.display().to_string()))
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load(cli_path: Option<&str>) -> Self {
        Self::load_from_path(&Self::resolve_config_path(cli_path))
    }

    /// Load configuration from a specific path, falling back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "config_fallback_to_defaults");
                Self::default()
            }
        }
    }

    /// Segmenter parameters
    pub fn segmenter_config(&self) -> SegmenterConfig {
        SegmenterConfig {
            gap_length: self.gap_length,
            only_start: self.only_start,
            order_policy: self.order_policy,
            period_length: self.period_length,
        }
    }

    /// Source adapter options
    pub fn source_options(&self) -> SourceOptions {
        SourceOptions {
            format: self.input_format,
            include_airport: self.include_airport,
            min_dwell_minutes: self.min_dwell_minutes,
        }
    }

    // Getters for all config fields
    pub fn input_file(&self) -> &str {
        &self.input_file
    }

    pub fn input_format(&self) -> InputFormat {
        self.input_format
    }

    pub fn include_airport(&self) -> bool {
        self.include_airport
    }

    pub fn min_dwell_minutes(&self) -> f64 {
        self.min_dwell_minutes
    }

    pub fn gap_length(&self) -> i64 {
        self.gap_length
    }

    pub fn only_start(&self) -> bool {
        self.only_start
    }

    pub fn order_policy(&self) -> OrderPolicy {
        self.order_policy
    }

    pub fn period_length(&self) -> Option<i64> {
        self.period_length
    }

    pub fn output_dir(&self) -> &str {
        &self.output_dir
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    pub fn collapse_repeats(&self) -> bool {
        self.collapse_repeats
    }

    pub fn origin_node(&self) -> &str {
        &self.origin_node
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    // Command line overrides
    pub fn with_input_file(mut self, file: &str) -> Self {
        self.input_file = file.to_string();
        self
    }

    pub fn with_input_format(mut self, format: InputFormat) -> Self {
        self.input_format = format;
        self
    }

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

    pub fn with_output_dir(mut self, dir: &str) -> Self {
        self.output_dir = dir.to_string();
        self
    }
}
