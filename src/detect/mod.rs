mod sample;

pub use sample::{DetectionSample, Region};
