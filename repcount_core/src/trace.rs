//! Per-frame CSV trace.
//!
//! One row per stream record, for plotting a session or feeding an
//! offline renderer.

use crate::{FrameOutcome, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct TraceRow {
    frame: u64,
    status: &'static str,
    angle: Option<f64>,
    target_percentage: Option<f64>,
    smoothed_percentage: f64,
    smoothed_bar_position: f64,
    count: f64,
    direction: u8,
    cue: bool,
}

impl From<&FrameOutcome> for TraceRow {
    fn from(outcome: &FrameOutcome) -> Self {
        TraceRow {
            frame: outcome.frame,
            status: outcome.status.as_str(),
            angle: outcome.angle,
            target_percentage: outcome.target_percentage,
            smoothed_percentage: outcome.smoothed_percentage,
            smoothed_bar_position: outcome.smoothed_bar_position,
            count: outcome.count,
            direction: outcome.direction,
            cue: outcome.cue,
        }
    }
}

/// Writes frame outcomes as CSV rows (header first)
pub struct TraceWriter<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl TraceWriter<File> {
    /// Create (or truncate) a trace file
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        tracing::debug!("Writing frame trace to {:?}", path);
        Ok(Self::new(file))
    }
}

impl<W: Write> TraceWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new().has_headers(true).from_writer(out),
            rows: 0,
        }
    }

    pub fn write(&mut self, outcome: &FrameOutcome) -> Result<()> {
        self.writer.serialize(TraceRow::from(outcome))?;
        self.rows += 1;
        Ok(())
    }

    /// Flush and return the number of rows written
    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush()?;
        Ok(self.rows)
    }
}
