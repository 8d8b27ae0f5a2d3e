//! Engine: tracker + grouper + analyzer behind one tick boundary.
//!
//! The engine is single-writer and synchronous. Hosts that capture frames
//! concurrently must serialize calls into it. `now` is always supplied by the
//! caller, so the engine never reads the clock.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisReport, Baseline, DelayAnalyzer, Timing};
use crate::batch::{Batch, BatchGrouper};
use crate::config::DwellConfig;
use crate::detect::DetectionSample;
use crate::tracker::{CompletedRecord, EntityTracker, TrackerConfig};

/// A closed batch together with its diagnosis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClosedBatch {
    pub batch: Batch,
    pub report: AnalysisReport,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickOutcome {
    /// Records expired in this step, before grouping.
    pub completed: Vec<CompletedRecord>,
    pub closed: Vec<ClosedBatch>,
}

pub struct Engine {
    baseline: Baseline,
    tracker: EntityTracker,
    grouper: BatchGrouper,
}

impl Engine {
    pub fn new(baseline: Baseline, tracker: TrackerConfig) -> Result<Self> {
        if baseline.tolerance_s < 0.0 {
            return Err(anyhow!("tolerance must not be negative"));
        }
        let grouper = BatchGrouper::new(baseline.batch_capacity)?;
        Ok(Self {
            baseline,
            tracker: EntityTracker::new(tracker),
            grouper,
        })
    }

    pub fn from_config(cfg: &DwellConfig) -> Result<Self> {
        Self::new(cfg.baseline, cfg.tracker.clone())
    }

    pub fn tick(&mut self, detections: &[DetectionSample], now: f64) -> Result<TickOutcome> {
        let completed = self.tracker.tick(detections, now);
        self.route(completed)
    }

    /// Close the open batch now, even if short. `None` when it is empty.
    pub fn force_close(&mut self) -> Result<Option<ClosedBatch>> {
        match self.grouper.force_close() {
            Some(batch) => self.analyze(batch).map(Some),
            None => Ok(None),
        }
    }

    /// Teardown: expire every active entity at `now`, group the resulting
    /// records, then force-close whatever remains open.
    pub fn close(&mut self, now: f64) -> Result<TickOutcome> {
        let flushed = self.tracker.flush(now);
        let mut outcome = self.route(flushed)?;
        if let Some(last) = self.force_close()? {
            outcome.closed.push(last);
        }
        Ok(outcome)
    }

    /// Number the next batch after `last_sequence`, so a new run appending to
    /// an existing store does not reuse sequences.
    pub fn resume_after(&mut self, last_sequence: u64) {
        self.grouper.resume_after(last_sequence);
        log::info!("batch numbering resumes at #{}", self.grouper.next_sequence());
    }

    /// Discard tracker state and return the pending open batch, force-closed.
    /// Batch numbering continues from where it was.
    pub fn reset(&mut self) -> Result<Option<ClosedBatch>> {
        let discarded = self.tracker.clear();
        if discarded > 0 {
            log::warn!("reset discarded {} active entities without records", discarded);
        }
        self.force_close()
    }

    fn route(&mut self, completed: Vec<CompletedRecord>) -> Result<TickOutcome> {
        let mut closed = Vec::new();
        for record in &completed {
            if let Some(batch) = self.grouper.add(record.clone()) {
                closed.push(self.analyze(batch)?);
            }
        }
        Ok(TickOutcome { completed, closed })
    }

    fn analyze(&self, batch: Batch) -> Result<ClosedBatch> {
        let report = DelayAnalyzer::analyze(&batch, &self.baseline).map_err(|e| {
            log::warn!("analysis fault on batch {}: {}", batch.sequence, e);
            e
        })?;
        let verdict = match report.timing {
            Timing::Late => "late",
            Timing::Early => "early",
            Timing::OnTime => "on time",
        };
        log::info!(
            "batch #{} closed{}: {} records, {:.2}s total ({:+.2}s) -> {}",
            batch.sequence,
            if batch.forced { " (forced)" } else { "" },
            batch.len(),
            batch.aggregate_duration,
            report.aggregate_deviation,
            verdict
        );
        Ok(ClosedBatch { batch, report })
    }

    pub fn baseline(&self) -> &Baseline {
        &self.baseline
    }

    pub fn tracker(&self) -> &EntityTracker {
        &self.tracker
    }

    pub fn grouper(&self) -> &BatchGrouper {
        &self.grouper
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Region;
    use crate::Category;

    fn seen(categories: &[Category]) -> Vec<DetectionSample> {
        categories
            .iter()
            .map(|&c| DetectionSample::new(c, 0.8, Region::new(0, 0, 32, 32)))
            .collect()
    }

    fn engine() -> Engine {
        Engine::new(Baseline::default(), TrackerConfig::default()).unwrap()
    }

    #[test]
    fn full_batch_is_analyzed_on_the_closing_tick() {
        let mut e = engine();
        e.tick(&seen(&[Category::Red, Category::Blue, Category::Green]), 0.0)
            .unwrap();
        e.tick(&seen(&[Category::Red, Category::Green]), 5.0).unwrap();
        e.tick(&seen(&[Category::Green]), 6.0).unwrap();
        let out = e.tick(&[], 18.0).unwrap();
        assert_eq!(out.completed.len(), 1);
        assert_eq!(out.closed.len(), 1);
        let closed = &out.closed[0];
        assert_eq!(closed.batch.sequence, 1);
        let durations: Vec<f64> = closed.batch.records.iter().map(|r| r.duration).collect();
        assert_eq!(durations, vec![5.0, 6.0, 18.0]);
        assert_eq!(closed.report.aggregate_deviation, 14.0);
        assert_eq!(closed.report.timing, Timing::Late);
        assert_eq!(closed.report.causes[0].category, Category::Green);
    }

    #[test]
    fn close_flushes_active_entities_into_a_forced_batch() {
        let mut e = engine();
        e.tick(&seen(&[Category::Orange]), 1.0).unwrap();
        let out = e.close(3.0).unwrap();
        assert_eq!(out.completed.len(), 1);
        assert_eq!(out.closed.len(), 1);
        assert!(out.closed[0].batch.forced);
        assert_eq!(out.closed[0].batch.aggregate_duration, 2.0);
        assert_eq!(e.tracker().active_len(), 0);
        assert!(e.force_close().unwrap().is_none());
    }

    #[test]
    fn reset_returns_pending_batch_and_keeps_numbering() {
        let mut e = engine();
        e.tick(&seen(&[Category::Red]), 0.0).unwrap();
        e.tick(&seen(&[Category::White]), 1.0).unwrap();
        let pending = e.reset().unwrap().expect("pending batch");
        assert_eq!(pending.batch.sequence, 1);
        assert_eq!(pending.batch.len(), 1);
        assert_eq!(e.tracker().active_len(), 0);

        e.tick(&seen(&[Category::Red]), 5.0).unwrap();
        e.tick(&[], 6.0).unwrap();
        let next = e.force_close().unwrap().unwrap();
        assert_eq!(next.batch.sequence, 2);
    }

    #[test]
    fn rejects_negative_tolerance() {
        let baseline = Baseline {
            tolerance_s: -1.0,
            ..Baseline::default()
        };
        assert!(Engine::new(baseline, TrackerConfig::default()).is_err());
    }
}
