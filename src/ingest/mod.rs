//! Tick sources.
//!
//! A source yields one `Tick` per captured frame: the frame's time in seconds
//! and the detection samples classified from it. Sources never consult the
//! wall clock; replaying a recorded session therefore reproduces its batches
//! exactly.

pub mod file;

pub use file::{JsonLinesSource, SourceStats};

use anyhow::Result;

use crate::detect::DetectionSample;

/// One frame's worth of detections.
#[derive(Clone, Debug, PartialEq)]
pub struct Tick {
    pub time_s: f64,
    pub detections: Vec<DetectionSample>,
}

pub trait TickSource {
    /// `Ok(None)` once the source is exhausted.
    fn next_tick(&mut self) -> Result<Option<Tick>>;
}
