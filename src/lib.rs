//! Dwell Kernel
//!
//! Measures how long colored objects stay in a camera's view, groups the
//! completed stays into fixed-size batches and diagnoses each batch against a
//! timing baseline.
//!
//! # Pipeline
//!
//! ```text
//! DetectionSample* --tick--> EntityTracker --CompletedRecord--> BatchGrouper
//!                                                                  |
//!                                          AnalysisReport <-- DelayAnalyzer
//! ```
//!
//! - At most one active entity per category. An entity expires on the first
//!   tick in which its category is absent; its duration ends at that tick.
//! - A batch never holds two records of the same category. Sequence numbers
//!   start at 1 and are never reused.
//! - The analyzer only attributes deviations in the direction of the batch
//!   verdict.
//!
//! # Module Structure
//!
//! - `category`: the six categories and their face names
//! - `detect`: per-frame detection samples
//! - `stabilizer`: sliding-window majority vote over category guesses
//! - `tracker`: entity lifecycle and dwell durations
//! - `batch`: fixed-capacity grouping of completed records
//! - `analysis`: baseline comparison and cause attribution
//! - `engine`: the three stages behind one tick call
//! - `ingest`: tick sources (JSON lines)
//! - `report`, `storage`: text rendering, session export, persistence
//! - `config`: file + environment configuration

use anyhow::{anyhow, Result};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod analysis;
pub mod batch;
pub mod category;
pub mod config;
pub mod detect;
pub mod engine;
pub mod ingest;
pub mod report;
pub mod stabilizer;
pub mod storage;
pub mod tracker;

pub use analysis::{
    AnalysisReport, Baseline, DelayAnalyzer, InvariantViolation, RecordDeviation, Timing,
    INVARIANT_BATCH_DUPLICATE_CATEGORY,
};
pub use batch::{Batch, BatchGrouper, GrouperSummary};
pub use category::Category;
pub use config::DwellConfig;
pub use detect::{DetectionSample, Region};
pub use engine::{ClosedBatch, Engine, TickOutcome};
pub use ingest::{JsonLinesSource, Tick, TickSource};
pub use report::{render_text, SessionExport};
pub use stabilizer::{CategoryStabilizer, StabilizerConfig, StableLabel};
pub use storage::{InMemoryReportStore, ReportStore, SqliteReportStore, StoredBatch};
pub use tracker::{ActiveEntity, CompletedRecord, EntityTracker, TrackerConfig, TrackerStats};

/// Wall-clock seconds since the Unix epoch. Only used for persistence
/// metadata; tracking time always comes from the caller.
pub fn now_s() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| anyhow!("system clock is before the Unix epoch"))?
        .as_secs())
}
