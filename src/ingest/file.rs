//! JSON-lines tick source.
//!
//! Each non-blank line is one frame:
//!
//! ```text
//! {"t": 12.5, "detections": [{"category": "red", "confidence": 0.42, "region": [0, 0, 64, 48]}]}
//! ```
//!
//! `category` may be missing or an unrecognised label; the sample is then an
//! unknown guess. `region` is optional, but the tracker ignores samples
//! without one. Frame times must not go backwards.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};

use super::{Tick, TickSource};
use crate::category::Category;
use crate::detect::{DetectionSample, Region};

#[derive(Debug, Deserialize)]
struct WireTick {
    t: f64,
    #[serde(default)]
    detections: Vec<WireDetection>,
}

#[derive(Debug, Deserialize)]
struct WireDetection {
    category: Option<String>,
    confidence: f32,
    region: Option<[i32; 4]>,
}

impl WireDetection {
    fn into_sample(self) -> DetectionSample {
        DetectionSample {
            category_guess: self.category.as_deref().and_then(Category::parse_guess),
            confidence: self.confidence,
            region: self.region.map(Region::from),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SourceStats {
    pub lines_read: u64,
    pub ticks: u64,
    pub detections: u64,
    pub unknown_guesses: u64,
}

pub struct JsonLinesSource {
    reader: Box<dyn BufRead>,
    origin: String,
    last_time: Option<f64>,
    stats: SourceStats,
}

impl JsonLinesSource {
    /// Open a local file, or standard input when `path` is `-`.
    pub fn open(path: &str) -> Result<Self> {
        if path == "-" {
            let stdin = std::io::stdin();
            return Ok(Self::from_reader(BufReader::new(stdin), "<stdin>"));
        }
        if path.trim().is_empty() || path.contains("://") {
            return Err(anyhow!("input must be a local file path or '-'"));
        }
        let file = File::open(path).map_err(|e| anyhow!("failed to open input {}: {}", path, e))?;
        log::info!("JsonLinesSource: reading {}", path);
        Ok(Self::from_reader(BufReader::new(file), path))
    }

    pub fn from_reader<R: BufRead + 'static>(reader: R, origin: &str) -> Self {
        Self {
            reader: Box::new(reader),
            origin: origin.to_string(),
            last_time: None,
            stats: SourceStats::default(),
        }
    }

    pub fn stats(&self) -> &SourceStats {
        &self.stats
    }

    fn parse_line(&mut self, line: &str) -> Result<Tick> {
        let lineno = self.stats.lines_read;
        let wire: WireTick = serde_json::from_str(line)
            .map_err(|e| anyhow!("{}:{}: invalid tick: {}", self.origin, lineno, e))?;
        if !wire.t.is_finite() {
            return Err(anyhow!("{}:{}: tick time must be finite", self.origin, lineno));
        }
        if let Some(last) = self.last_time {
            if wire.t < last {
                return Err(anyhow!(
                    "{}:{}: tick time {} goes backwards (previous {})",
                    self.origin,
                    lineno,
                    wire.t,
                    last
                ));
            }
        }
        self.last_time = Some(wire.t);

        let detections: Vec<DetectionSample> = wire
            .detections
            .into_iter()
            .map(WireDetection::into_sample)
            .collect();
        self.stats.ticks += 1;
        self.stats.detections += detections.len() as u64;
        self.stats.unknown_guesses += detections
            .iter()
            .filter(|d| d.category_guess.is_none())
            .count() as u64;

        Ok(Tick {
            time_s: wire.t,
            detections,
        })
    }
}

impl TickSource for JsonLinesSource {
    fn next_tick(&mut self) -> Result<Option<Tick>> {
        let mut line = String::new();
        loop {
            line.clear();
            let n = self
                .reader
                .read_line(&mut line)
                .map_err(|e| anyhow!("failed to read {}: {}", self.origin, e))?;
            if n == 0 {
                return Ok(None);
            }
            self.stats.lines_read += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return self.parse_line(trimmed).map(Some);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn source(text: &str) -> JsonLinesSource {
        JsonLinesSource::from_reader(Cursor::new(text.to_string()), "test")
    }

    #[test]
    fn parses_ticks_and_skips_blank_lines() {
        let mut src = source(
            r#"{"t":0.0,"detections":[{"category":"red","confidence":0.42,"region":[0,0,10,10]}]}

{"t":1.5,"detections":[]}
{"t":2.0}
"#,
        );
        let first = src.next_tick().unwrap().unwrap();
        assert_eq!(first.time_s, 0.0);
        assert_eq!(first.detections.len(), 1);
        assert_eq!(first.detections[0].category_guess, Some(Category::Red));
        assert_eq!(first.detections[0].region, Some(Region::new(0, 0, 10, 10)));

        let second = src.next_tick().unwrap().unwrap();
        assert_eq!(second.time_s, 1.5);
        assert!(second.detections.is_empty());

        let third = src.next_tick().unwrap().unwrap();
        assert_eq!(third.time_s, 2.0);
        assert!(src.next_tick().unwrap().is_none());
        assert_eq!(src.stats().ticks, 3);
        assert_eq!(src.stats().lines_read, 4);
    }

    #[test]
    fn unrecognised_labels_become_unknown_guesses() {
        let mut src = source(
            r#"{"t":0.0,"detections":[{"category":"purple","confidence":0.9},{"confidence":0.3}]}"#,
        );
        let tick = src.next_tick().unwrap().unwrap();
        assert!(tick.detections.iter().all(|d| d.category_guess.is_none()));
        assert!(tick.detections[0].region.is_none());
        assert_eq!(src.stats().unknown_guesses, 2);
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let mut src = source("{\"t\":0.0}\n\nnot json\n");
        src.next_tick().unwrap();
        let err = src.next_tick().unwrap_err();
        assert!(err.to_string().starts_with("test:3:"), "{}", err);
    }

    #[test]
    fn rejects_time_going_backwards() {
        let mut src = source("{\"t\":5.0}\n{\"t\":4.0}\n");
        src.next_tick().unwrap();
        let err = src.next_tick().unwrap_err();
        assert!(err.to_string().contains("goes backwards"));
    }

    #[test]
    fn open_rejects_urls() {
        assert!(JsonLinesSource::open("http://camera/feed").is_err());
        assert!(JsonLinesSource::open("").is_err());
    }
}
