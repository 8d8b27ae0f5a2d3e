//! Human-readable and JSON renderings of closed batches.
//!
//! Nothing here touches the engine's state; the daemon decides where the
//! text goes and when the session document is rewritten.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

use crate::analysis::{AnalysisReport, Timing};
use crate::batch::Batch;
use crate::engine::ClosedBatch;

const RULE: &str = "==================================================";

/// Render the delay analysis of one batch as plain text.
pub fn render_text(batch: &Batch, report: &AnalysisReport) -> String {
    let mut out = String::new();
    // writing to a String cannot fail
    let _ = write_report(&mut out, batch, report);
    out
}

fn write_report(out: &mut String, batch: &Batch, report: &AnalysisReport) -> std::fmt::Result {
    writeln!(out, "=== DELAY ANALYSIS ===")?;
    write!(
        out,
        "Batch {} - total time: {:.2}s",
        batch.sequence, batch.aggregate_duration
    )?;
    if batch.forced {
        write!(out, " (forced, {}/{} records)", batch.len(), batch.capacity)?;
    }
    writeln!(out)?;
    writeln!(out)?;

    for (record, deviation) in batch.records.iter().zip(&report.records) {
        writeln!(
            out,
            "- {} ({}): {:.2}s (deviation: {:+.2}s)",
            record.category.as_str().to_uppercase(),
            record.category.face_name(),
            record.duration,
            deviation.deviation
        )?;
    }

    writeln!(out)?;
    writeln!(out, "Expected total: {:.2}s", report.expected_aggregate)?;
    writeln!(out, "Batch deviation: {:+.2}s", report.aggregate_deviation)?;

    match report.timing {
        Timing::Late => {
            writeln!(out, "Batch ran late against the baseline.")?;
            if !report.causes.is_empty() {
                writeln!(out, "Caused by:")?;
                for cause in &report.causes {
                    writeln!(
                        out,
                        "  -> {} took {:+.2}s longer ({:.2}s)",
                        cause.category.as_str().to_uppercase(),
                        cause.deviation,
                        cause.duration
                    )?;
                }
            }
        }
        Timing::Early => {
            writeln!(out, "Batch ran faster than the baseline.")?;
            if !report.causes.is_empty() {
                writeln!(out, "Likely sped up by:")?;
                for cause in &report.causes {
                    writeln!(
                        out,
                        "  -> {} was {:+.2}s faster ({:.2}s)",
                        cause.category.as_str().to_uppercase(),
                        cause.deviation,
                        cause.duration
                    )?;
                }
            }
        }
        Timing::OnTime => {
            writeln!(out, "Batch is within the expected time.")?;
        }
    }
    writeln!(out, "{}", RULE)
}

/// Every batch closed during one run, rewritten in full after each closure.
#[derive(Clone, Debug, Serialize)]
pub struct SessionExport {
    pub session_start_epoch_s: u64,
    pub batches: Vec<ClosedBatch>,
    pub total_batches: usize,
}

impl SessionExport {
    pub fn new(session_start_epoch_s: u64) -> Self {
        Self {
            session_start_epoch_s,
            batches: Vec::new(),
            total_batches: 0,
        }
    }

    pub fn push(&mut self, closed: ClosedBatch) {
        self.batches.push(closed);
        self.total_batches = self.batches.len();
    }

    pub fn total_records(&self) -> usize {
        self.batches.iter().map(|c| c.batch.len()).sum()
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json)
            .map_err(|e| anyhow!("failed to write session export {}: {}", path.display(), e))
    }
}
