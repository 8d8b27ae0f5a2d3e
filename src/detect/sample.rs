use serde::{Deserialize, Serialize};

use crate::Category;

/// Pixel bounding box `(x1, y1) .. (x2, y2)` as produced by the detector.
/// The tracker treats it as opaque apart from the emptiness check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Region {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// A zero-area box carries no pixels to classify.
    pub fn is_empty(&self) -> bool {
        self.x2 <= self.x1 || self.y2 <= self.y1
    }

    pub fn center(&self) -> (i32, i32) {
        ((self.x1 + self.x2) / 2, (self.y1 + self.y2) / 2)
    }
}

impl From<[i32; 4]> for Region {
    fn from(b: [i32; 4]) -> Self {
        Region::new(b[0], b[1], b[2], b[3])
    }
}

/// One frame's evidence for a candidate object, after color classification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionSample {
    /// Classified category; `None` when the classifier could not decide.
    pub category_guess: Option<Category>,
    /// Classifier confidence, nominally 0..=1 (not range-checked).
    pub confidence: f32,
    /// Bounding region; `None` when the frame had no usable pixels.
    pub region: Option<Region>,
}

impl DetectionSample {
    pub fn new(category: Category, confidence: f32, region: Region) -> Self {
        Self {
            category_guess: Some(category),
            confidence,
            region: Some(region),
        }
    }

    pub fn unknown(confidence: f32, region: Option<Region>) -> Self {
        Self {
            category_guess: None,
            confidence,
            region,
        }
    }

    /// Region if present and non-empty.
    pub fn usable_region(&self) -> Option<Region> {
        self.region.filter(|r| !r.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_region_is_not_usable() {
        let sample = DetectionSample::new(Category::Red, 0.9, Region::new(10, 10, 10, 40));
        assert!(sample.usable_region().is_none());
    }

    #[test]
    fn missing_region_is_not_usable() {
        let sample = DetectionSample::unknown(0.9, None);
        assert!(sample.usable_region().is_none());
        assert!(sample.category_guess.is_none());
    }

    #[test]
    fn center_is_midpoint() {
        assert_eq!(Region::from([0, 0, 100, 50]).center(), (50, 25));
    }
}
