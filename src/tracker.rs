//! Entity tracker.
//!
//! Turns per-tick detections into presence intervals. State is keyed by
//! category: there is at most one active entity per category, and an entity
//! that goes one full tick without a confident detection is expired into a
//! [`CompletedRecord`].
//!
//! # Lifecycle
//!
//! - **Birth**: a confident detection arrives for a category with no active
//!   entity. `entry_time = last_seen_time = now`, and a fresh stabilization
//!   window is seeded with the guess.
//! - **Tracking**: a confident detection for an active category refreshes
//!   the region and `last_seen_time` and feeds the window.
//! - **Expiry**: at the end of a tick every entity not seen in that tick is
//!   removed. The record's exit time is the tick of absence, not the last
//!   sighting, so `duration = now - entry_time` includes one gap tick.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::detect::{DetectionSample, Region};
use crate::stabilizer::{CategoryStabilizer, StabilizerConfig, StableLabel};
use crate::Category;

pub const DEFAULT_ACCEPTANCE_THRESHOLD: f32 = 0.15;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Classifier confidence a sample must strictly exceed to count.
    pub acceptance_threshold: f32,
    /// Per-category overrides of `acceptance_threshold`.
    pub per_category: BTreeMap<Category, f32>,
    pub stabilizer: StabilizerConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: DEFAULT_ACCEPTANCE_THRESHOLD,
            per_category: BTreeMap::new(),
            stabilizer: StabilizerConfig::default(),
        }
    }
}

impl TrackerConfig {
    pub fn threshold_for(&self, category: Category) -> f32 {
        self.per_category
            .get(&category)
            .copied()
            .unwrap_or(self.acceptance_threshold)
    }
}

/// An object currently considered present.
#[derive(Clone, Debug)]
pub struct ActiveEntity {
    pub id: u64,
    pub category: Category,
    pub entry_time: f64,
    pub last_seen_time: f64,
    pub region: Region,
    pub seen_this_tick: bool,
    window: CategoryStabilizer,
}

impl ActiveEntity {
    fn new(id: u64, category: Category, region: Region, now: f64, cfg: StabilizerConfig) -> Self {
        let mut window = CategoryStabilizer::new(cfg);
        window.observe(Some(category));
        Self {
            id,
            category,
            entry_time: now,
            last_seen_time: now,
            region,
            seen_this_tick: true,
            window,
        }
    }

    fn refresh(&mut self, guess: Category, region: Region, now: f64) {
        self.region = region;
        self.last_seen_time = now;
        self.seen_this_tick = true;
        self.window.observe(Some(guess));
    }

    pub fn stable_label(&self) -> StableLabel {
        self.window.stable_label()
    }

    /// Dwell time for live display. While the entity is being seen the clock
    /// keeps running; once a tick misses it, the display freezes at the last
    /// sighting even though the eventual record will run to the absence tick.
    pub fn dwell_so_far(&self, now: f64) -> f64 {
        if self.seen_this_tick {
            now - self.entry_time
        } else {
            self.last_seen_time - self.entry_time
        }
    }

    fn complete(self, now: f64) -> CompletedRecord {
        CompletedRecord {
            entity_id: self.id,
            category: self.category,
            entry_time: self.entry_time,
            exit_time: now,
            duration: now - self.entry_time,
        }
    }
}

/// A finished presence interval. Immutable once produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletedRecord {
    pub entity_id: u64,
    pub category: Category,
    pub entry_time: f64,
    pub exit_time: f64,
    /// `exit_time - entry_time`, seconds.
    pub duration: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TrackerStats {
    pub ticks: u64,
    /// Unknown guesses, low confidence, or no usable region.
    pub samples_ignored: u64,
    /// Second confident sample for a category already matched in the same tick.
    pub duplicates_ignored: u64,
    pub entities_created: u64,
    pub records_emitted: u64,
}

pub struct EntityTracker {
    config: TrackerConfig,
    active: BTreeMap<Category, ActiveEntity>,
    totals: BTreeMap<Category, f64>,
    next_id: u64,
    stats: TrackerStats,
}

impl EntityTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            active: BTreeMap::new(),
            totals: BTreeMap::new(),
            next_id: 1,
            stats: TrackerStats::default(),
        }
    }

    /// Process one tick of detections observed at `now`.
    ///
    /// Returns the records of entities that expired in this tick, in category
    /// order.
    pub fn tick(&mut self, detections: &[DetectionSample], now: f64) -> Vec<CompletedRecord> {
        self.stats.ticks += 1;

        for entity in self.active.values_mut() {
            entity.seen_this_tick = false;
        }

        for sample in detections {
            let (Some(category), Some(region)) = (sample.category_guess, sample.usable_region())
            else {
                self.stats.samples_ignored += 1;
                continue;
            };
            let accepted = sample.confidence > self.config.threshold_for(category);
            if !accepted {
                self.stats.samples_ignored += 1;
                continue;
            }

            match self.active.get_mut(&category) {
                Some(entity) if entity.seen_this_tick => {
                    // one object per category: the first match in a tick wins
                    self.stats.duplicates_ignored += 1;
                    log::debug!(
                        "ignoring second {} detection in tick (entity #{})",
                        category,
                        entity.id
                    );
                }
                Some(entity) => entity.refresh(category, region, now),
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    self.stats.entities_created += 1;
                    let (cx, cy) = region.center();
                    log::debug!(
                        "entity #{} entered: {} at {:.3} centered ({}, {})",
                        id,
                        category,
                        now,
                        cx,
                        cy
                    );
                    self.active.insert(
                        category,
                        ActiveEntity::new(id, category, region, now, self.config.stabilizer),
                    );
                }
            }
        }

        let absent: Vec<Category> = self
            .active
            .iter()
            .filter(|(_, e)| !e.seen_this_tick)
            .map(|(c, _)| *c)
            .collect();
        absent
            .into_iter()
            .filter_map(|category| self.expire(category, now))
            .collect()
    }

    /// Expire every active entity at `now`. Used at teardown so that objects
    /// still in view are not lost.
    pub fn flush(&mut self, now: f64) -> Vec<CompletedRecord> {
        let all: Vec<Category> = self.active.keys().copied().collect();
        all.into_iter()
            .filter_map(|category| self.expire(category, now))
            .collect()
    }

    fn expire(&mut self, category: Category, now: f64) -> Option<CompletedRecord> {
        let entity = self.active.remove(&category)?;
        let record = entity.complete(now);
        *self.totals.entry(category).or_insert(0.0) += record.duration;
        self.stats.records_emitted += 1;
        log::debug!(
            "entity #{} exited: {} after {:.2}s",
            record.entity_id,
            category,
            record.duration
        );
        Some(record)
    }

    /// Drop all active entities without emitting records. Returns how many
    /// were discarded.
    pub fn clear(&mut self) -> usize {
        let n = self.active.len();
        self.active.clear();
        self.totals.clear();
        n
    }

    pub fn get(&self, category: Category) -> Option<&ActiveEntity> {
        self.active.get(&category)
    }

    pub fn active(&self) -> impl Iterator<Item = &ActiveEntity> {
        self.active.values()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn stable_label(&self, category: Category) -> StableLabel {
        self.active
            .get(&category)
            .map(ActiveEntity::stable_label)
            .unwrap_or(StableLabel::UNKNOWN)
    }

    pub fn dwell_so_far(&self, category: Category, now: f64) -> Option<f64> {
        self.active.get(&category).map(|e| e.dwell_so_far(now))
    }

    /// Cumulative dwell per category over all expirations so far.
    pub fn totals(&self) -> &BTreeMap<Category, f64> {
        &self.totals
    }

    pub fn stats(&self) -> TrackerStats {
        self.stats
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }
}

impl Default for EntityTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}
