//! Delay analysis.
//!
//! Compares a closed batch against the configured baseline. Each record and
//! the batch aggregate are classified as early, on time or late using the same
//! symmetric tolerance band. Only the aggregate verdict drives attribution:
//! a late batch names its late records as causes, an early batch names its
//! early records, an on-time batch names none.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::batch::{Batch, DEFAULT_BATCH_CAPACITY};
use crate::Category;

pub const DEFAULT_EXPECTED_PER_RECORD_S: f64 = 5.0;
pub const DEFAULT_EXPECTED_AGGREGATE_S: f64 = 15.0;
pub const DEFAULT_TOLERANCE_S: f64 = 5.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub expected_per_record_s: f64,
    pub expected_aggregate_s: f64,
    pub tolerance_s: f64,
    pub batch_capacity: usize,
}

impl Default for Baseline {
    fn default() -> Self {
        Self {
            expected_per_record_s: DEFAULT_EXPECTED_PER_RECORD_S,
            expected_aggregate_s: DEFAULT_EXPECTED_AGGREGATE_S,
            tolerance_s: DEFAULT_TOLERANCE_S,
            batch_capacity: DEFAULT_BATCH_CAPACITY,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timing {
    Early,
    OnTime,
    Late,
}

impl Timing {
    /// Strict comparison: a deviation exactly at the tolerance is on time.
    pub fn classify(deviation: f64, tolerance: f64) -> Self {
        if deviation > tolerance {
            Timing::Late
        } else if deviation < -tolerance {
            Timing::Early
        } else {
            Timing::OnTime
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Timing::Early => "early",
            Timing::OnTime => "on_time",
            Timing::Late => "late",
        }
    }
}

impl fmt::Display for Timing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordDeviation {
    pub category: Category,
    pub duration: f64,
    /// `duration - expected_per_record_s`
    pub deviation: f64,
    pub timing: Timing,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub batch_sequence: u64,
    pub forced: bool,
    /// One entry per batch member, in insertion order.
    pub records: Vec<RecordDeviation>,
    pub aggregate_duration: f64,
    pub expected_aggregate: f64,
    pub aggregate_deviation: f64,
    pub timing: Timing,
    /// Records deviating beyond tolerance in the direction of the aggregate.
    pub causes: Vec<RecordDeviation>,
}

/// Programmer-contract violation detected inside the kernel. Carries a stable
/// code so callers can `downcast_ref` and alarm on it.
#[derive(Clone, Debug)]
pub struct InvariantViolation {
    pub code: &'static str,
    pub message: String,
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for InvariantViolation {}

pub const INVARIANT_BATCH_DUPLICATE_CATEGORY: &str = "INVARIANT_BATCH_DUPLICATE_CATEGORY";

pub struct DelayAnalyzer;

impl DelayAnalyzer {
    pub fn analyze(batch: &Batch, baseline: &Baseline) -> Result<AnalysisReport> {
        if let Some(category) = batch.duplicate_category() {
            return Err(InvariantViolation {
                code: INVARIANT_BATCH_DUPLICATE_CATEGORY,
                message: format!(
                    "batch {} contains category {} more than once",
                    batch.sequence, category
                ),
            }
            .into());
        }

        let tolerance = baseline.tolerance_s;
        let records: Vec<RecordDeviation> = batch
            .records
            .iter()
            .map(|r| {
                let deviation = r.duration - baseline.expected_per_record_s;
                RecordDeviation {
                    category: r.category,
                    duration: r.duration,
                    deviation,
                    timing: Timing::classify(deviation, tolerance),
                }
            })
            .collect();

        let aggregate_deviation = batch.aggregate_duration - baseline.expected_aggregate_s;
        let timing = Timing::classify(aggregate_deviation, tolerance);
        let causes = match timing {
            Timing::OnTime => Vec::new(),
            direction => records
                .iter()
                .filter(|r| r.timing == direction)
                .cloned()
                .collect(),
        };

        Ok(AnalysisReport {
            batch_sequence: batch.sequence,
            forced: batch.forced,
            records,
            aggregate_duration: batch.aggregate_duration,
            expected_aggregate: baseline.expected_aggregate_s,
            aggregate_deviation,
            timing,
            causes,
        })
    }
}
