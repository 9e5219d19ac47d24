//! trip-segmenter - episode segmentation for the Optourism tourism study
//!
//! Reads per-entity event records (CDR daily call counts, CDR tower dwell
//! pings, museum card entries, or pre-adapted events), labels trips/visits,
//! and writes the annotated records, the episode table and a run report.
//!
//! Module structure:
//! - `domain/` - Core types (EventRecord, Role, Episode)
//! - `io/` - Record sources and file egress
//! - `services/` - Segmenter, distributions, transition edges, paths, report
//! - `infra/` - Configuration

use clap::Parser;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;
use trip_segmenter::domain::OrderPolicy;
use trip_segmenter::infra::Config;
use trip_segmenter::io::{load_events, Egress, InputFormat};
use trip_segmenter::services::{RunReport, Segmenter, TransitionBuilder};

/// Segment per-entity event records into trips
#[derive(Parser, Debug)]
#[command(name = "trip-segmenter", version, about)]
struct Args {
    /// Path to TOML configuration file (default: $CONFIG_FILE, then config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Input JSONL file (overrides input.file)
    #[arg(short, long)]
    input: Option<String>,

    /// Input schema: events, daily_calls, museum_entries or tower_dwell (overrides input.format)
    #[arg(short, long)]
    format: Option<InputFormat>,

    /// Gap threshold in source ticks (overrides segmenter.gap_length)
    #[arg(short, long)]
    gap_length: Option<i64>,

    /// Only label trip starts, skipping end/last roles
    #[arg(long)]
    only_start: bool,

    /// What to do with records out of time order: reject or sort
    #[arg(long)]
    order_policy: Option<OrderPolicy>,

    /// Output directory (overrides output.dir)
    #[arg(short, long)]
    output_dir: Option<String>,
}

fn main() -> anyhow::Result<()> {
    // Default: INFO, use RUST_LOG=debug for per-entity detail
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(build = %env!("GIT_HASH"), "trip-segmenter starting");

    let args = Args::parse();
    let config = apply_overrides(Config::load(args.config.as_deref()), &args);
    anyhow::ensure!(config.gap_length() > 0, "gap_length must be positive");

    info!(
        config_file = %config.config_file(),
        input_file = %config.input_file(),
        input_format = %config.input_format().as_str(),
        gap_length = %config.gap_length(),
        only_start = %config.only_start(),
        order_policy = ?config.order_policy(),
        period_length = ?config.period_length(),
        output_dir = %config.output_dir(),
        "config_loaded"
    );

    let records = load_events(config.input_file(), &config.source_options())?;

    let segmenter = Segmenter::new(config.segmenter_config());
    let segmentation = segmenter.segment(records)?;

    let egress = Egress::new(config.output_dir());
    egress.write_segmentation(&segmentation)?;

    let transitions = TransitionBuilder::new()
        .collapse_repeats(config.collapse_repeats())
        .origin_node(config.origin_node());
    let report = RunReport::build(
        &segmentation,
        segmenter.config(),
        config.input_format().as_str(),
        &transitions,
    );
    egress.write_report(&report)?;
    report.log_summary(config.top_n());

    info!(dir = %egress.dir().display(), "trip-segmenter finished");
    Ok(())
}

/// Command line flags win over the config file
fn apply_overrides(mut config: Config, args: &Args) -> Config {
    if let Some(input) = &args.input {
        config = config.with_input_file(input);
    }
    if let Some(format) = args.format {
        config = config.with_input_format(format);
    }
    if let Some(gap_length) = args.gap_length {
        config = config.with_gap_length(gap_length);
    }
    if args.only_start {
        config = config.with_only_start(true);
    }
    if let Some(order_policy) = args.order_policy {
        config = config.with_order_policy(order_policy);
    }
    if let Some(dir) = &args.output_dir {
        config = config.with_output_dir(dir);
    }
    config
}
