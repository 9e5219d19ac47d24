//! Segmentation egress - writes results to files
//!
//! Annotated records and episodes are written in JSONL format (one JSON
//! object per line); the run report is a single pretty-printed JSON file.
//! Files are replaced on every run.

use crate::domain::episode::Segmentation;
use anyhow::Context;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const RECORDS_FILE: &str = "segmented_records.jsonl";
pub const EPISODES_FILE: &str = "episodes.jsonl";
pub const REPORT_FILE: &str = "report.json";

/// Egress writer rooted at an output directory
pub struct Egress {
    dir: PathBuf,
}

impl Egress {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref().to_path_buf();
        info!(dir = %dir.display(), "egress_initialized");
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write annotated records and the episode table; returns lines written
    pub fn write_segmentation(&self, seg: &Segmentation) -> anyhow::Result<usize> {
        let records = self.write_jsonl(RECORDS_FILE, &seg.records)?;
        let episodes = self.write_jsonl(EPISODES_FILE, &seg.episodes)?;

        info!(
            records = %records,
            episodes = %episodes,
            dir = %self.dir.display(),
            "segmentation_egressed"
        );
        Ok(records + episodes)
    }

    /// Write the run report
    pub fn write_report<T: Serialize>(&self, report: &T) -> anyhow::Result<PathBuf> {
        let path = self.prepare(REPORT_FILE)?;
        let file = File::create(&path)
            .with_context(|| format!("Failed to create report file {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, report)
            .with_context(|| format!("Failed to serialize report to {}", path.display()))?;
        writeln!(writer)?;
        writer.flush()?;

        info!(file = %path.display(), "report_egressed");
        Ok(path)
    }

    /// Write one JSON object per line
    fn write_jsonl<T: Serialize>(&self, name: &str, rows: &[T]) -> anyhow::Result<usize> {
        let path = self.prepare(name)?;
        let file = File::create(&path)
            .with_context(|| format!("Failed to create egress file {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        for row in rows {
            serde_json::to_writer(&mut writer, row)
                .with_context(|| format!("Failed to serialize row for {}", path.display()))?;
            writer.write_all(b"\n")?;
        }
        writer.flush().with_context(|| format!("Failed to flush {}", path.display()))?;

        debug!(file = %path.display(), lines = %rows.len(), "egress_written");
        Ok(rows.len())
    }

    /// Resolve a file name and create parent directories if they don't exist
    fn prepare(&self, name: &str) -> anyhow::Result<PathBuf> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir)
                .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        }
        Ok(self.dir.join(name))
    }
}
