//! Category stabilizer.
//!
//! Smooths a noisy sequence of per-frame category guesses into one stable
//! label using a bounded majority window. The window is a fixed-capacity ring
//! buffer, so memory per tracked category is constant.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::Category;

pub const DEFAULT_MAX_HISTORY: usize = 8;
pub const DEFAULT_MIN_SAMPLES: usize = 2;
pub const DEFAULT_STABILITY_THRESHOLD: f32 = 0.6;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StabilizerConfig {
    /// Window length; oldest guesses are evicted first.
    pub max_history: usize,
    /// Guesses required before a non-unknown answer is possible.
    pub min_samples: usize,
    /// Fraction of the window the winning label must hold.
    pub stability_threshold: f32,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            min_samples: DEFAULT_MIN_SAMPLES,
            stability_threshold: DEFAULT_STABILITY_THRESHOLD,
        }
    }
}

/// Stabilizer answer. `category` is `None` when no label is stable; the
/// confidence is still the winning fraction so callers can see how close it was.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StableLabel {
    pub category: Option<Category>,
    pub confidence: f32,
}

impl StableLabel {
    pub const UNKNOWN: StableLabel = StableLabel {
        category: None,
        confidence: 0.0,
    };
}

#[derive(Clone, Debug)]
pub struct CategoryStabilizer {
    window: VecDeque<Option<Category>>,
    config: StabilizerConfig,
}

impl CategoryStabilizer {
    pub fn new(config: StabilizerConfig) -> Self {
        Self {
            window: VecDeque::with_capacity(config.max_history),
            config,
        }
    }

    pub fn observe(&mut self, guess: Option<Category>) {
        self.window.push_back(guess);
        while self.window.len() > self.config.max_history {
            self.window.pop_front();
        }
    }

    /// Majority label over the window.
    ///
    /// Unknown guesses occupy slots and count toward the denominator but are
    /// never a candidate. Ties go to the label seen first among the guesses
    /// still in the window.
    pub fn stable_label(&self) -> StableLabel {
        if self.window.len() < self.config.min_samples || self.window.is_empty() {
            return StableLabel::UNKNOWN;
        }

        // (label, count) in first-seen order
        let mut counts: Vec<(Category, usize)> = Vec::with_capacity(Category::ALL.len());
        for guess in self.window.iter().flatten() {
            match counts.iter_mut().find(|(c, _)| c == guess) {
                Some((_, n)) => *n += 1,
                None => counts.push((*guess, 1)),
            }
        }

        let mut best: Option<(Category, usize)> = None;
        for &(category, n) in &counts {
            if best.map_or(true, |(_, best_n)| n > best_n) {
                best = Some((category, n));
            }
        }

        let Some((category, n)) = best else {
            return StableLabel::UNKNOWN;
        };
        let fraction = n as f32 / self.window.len() as f32;
        if fraction >= self.config.stability_threshold {
            StableLabel {
                category: Some(category),
                confidence: fraction,
            }
        } else {
            StableLabel {
                category: None,
                confidence: fraction,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }

    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }
}

impl Default for CategoryStabilizer {
    fn default() -> Self {
        Self::new(StabilizerConfig::default())
    }
}
