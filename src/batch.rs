//! Batch grouper.
//!
//! Collects completed records into fixed-capacity batches in which every
//! category appears at most once. A record whose category is already in the
//! open batch is dropped, not queued for the next batch.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::tracker::CompletedRecord;
use crate::Category;

pub const DEFAULT_BATCH_CAPACITY: usize = 3;

/// A closed batch. Immutable once returned by the grouper.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// 1-based, strictly increasing, never reused.
    pub sequence: u64,
    pub records: Vec<CompletedRecord>,
    /// Sum of member durations, seconds.
    pub aggregate_duration: f64,
    pub capacity: usize,
    /// Closed before reaching capacity.
    pub forced: bool,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.records.iter().map(|r| r.category)
    }

    /// First category that appears twice, if any.
    pub fn duplicate_category(&self) -> Option<Category> {
        self.records.iter().enumerate().find_map(|(i, r)| {
            self.records[..i]
                .iter()
                .any(|earlier| earlier.category == r.category)
                .then_some(r.category)
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct GrouperSummary {
    pub closed_batches: u64,
    pub closed_records: u64,
    pub total_duration: f64,
    pub open_size: usize,
    pub dropped_duplicates: u64,
}

pub struct BatchGrouper {
    capacity: usize,
    open: Vec<CompletedRecord>,
    next_sequence: u64,
    summary: GrouperSummary,
}

impl BatchGrouper {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(anyhow!("batch capacity must be at least 1"));
        }
        if capacity > Category::ALL.len() {
            return Err(anyhow!(
                "batch capacity {} exceeds the number of categories ({})",
                capacity,
                Category::ALL.len()
            ));
        }
        Ok(Self {
            capacity,
            open: Vec::with_capacity(capacity),
            next_sequence: 1,
            summary: GrouperSummary::default(),
        })
    }

    /// Offer a record to the open batch. Returns the batch if this record
    /// filled it.
    pub fn add(&mut self, record: CompletedRecord) -> Option<Batch> {
        if self.open.iter().any(|r| r.category == record.category) {
            self.summary.dropped_duplicates += 1;
            log::debug!(
                "dropping {} record ({:.2}s): category already in open batch",
                record.category,
                record.duration
            );
            return None;
        }

        self.open.push(record);
        if self.open.len() < self.capacity {
            return None;
        }
        let batch = self.close(false);
        debug_assert!(batch.duplicate_category().is_none());
        Some(batch)
    }

    /// Close the open batch regardless of size. Nothing to close yields `None`.
    pub fn force_close(&mut self) -> Option<Batch> {
        if self.open.is_empty() {
            return None;
        }
        let forced = self.open.len() < self.capacity;
        Some(self.close(forced))
    }

    fn close(&mut self, forced: bool) -> Batch {
        let records = std::mem::replace(&mut self.open, Vec::with_capacity(self.capacity));
        let aggregate_duration = records.iter().map(|r| r.duration).sum();
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.summary.closed_batches += 1;
        self.summary.closed_records += records.len() as u64;
        self.summary.total_duration += aggregate_duration;

        Batch {
            sequence,
            records,
            aggregate_duration,
            capacity: self.capacity,
            forced,
        }
    }

    pub fn open_records(&self) -> &[CompletedRecord] {
        &self.open
    }

    pub fn open_categories(&self) -> Vec<Category> {
        self.open.iter().map(|r| r.category).collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sequence number the next closed batch will receive.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Continue numbering after `last`, typically the highest sequence a
    /// store already holds. Never moves numbering backwards.
    pub fn resume_after(&mut self, last: u64) {
        self.next_sequence = self.next_sequence.max(last.saturating_add(1));
    }

    pub fn summary(&self) -> GrouperSummary {
        GrouperSummary {
            open_size: self.open.len(),
            ..self.summary
        }
    }
}
