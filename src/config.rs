use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::analysis::Baseline;
use crate::stabilizer::StabilizerConfig;
use crate::tracker::TrackerConfig;
use crate::Category;

const DEFAULT_DB_PATH: &str = "dwell.db";

#[derive(Debug, Deserialize, Default)]
struct DwellConfigFile {
    db_path: Option<String>,
    session_export: Option<PathBuf>,
    baseline: Option<BaselineConfigFile>,
    stabilizer: Option<StabilizerConfigFile>,
    tracker: Option<TrackerConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct BaselineConfigFile {
    expected_per_record_s: Option<f64>,
    expected_aggregate_s: Option<f64>,
    tolerance_s: Option<f64>,
    batch_capacity: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct StabilizerConfigFile {
    max_history: Option<usize>,
    min_samples: Option<usize>,
    stability_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct TrackerConfigFile {
    acceptance_threshold: Option<f32>,
    per_category: Option<BTreeMap<String, f32>>,
}

#[derive(Debug, Clone)]
pub struct DwellConfig {
    pub db_path: String,
    pub session_export: Option<PathBuf>,
    pub baseline: Baseline,
    pub tracker: TrackerConfig,
}

impl Default for DwellConfig {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            session_export: None,
            baseline: Baseline::default(),
            tracker: TrackerConfig::default(),
        }
    }
}

impl DwellConfig {
    /// Load from the file named by `DWELL_CONFIG` (if set), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("DWELL_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: DwellConfigFile) -> Result<Self> {
        let defaults = Self::default();
        let db_path = file.db_path.unwrap_or(defaults.db_path);

        let baseline = match file.baseline {
            Some(b) => Baseline {
                expected_per_record_s: b
                    .expected_per_record_s
                    .unwrap_or(defaults.baseline.expected_per_record_s),
                expected_aggregate_s: b
                    .expected_aggregate_s
                    .unwrap_or(defaults.baseline.expected_aggregate_s),
                tolerance_s: b.tolerance_s.unwrap_or(defaults.baseline.tolerance_s),
                batch_capacity: b
                    .batch_capacity
                    .unwrap_or(defaults.baseline.batch_capacity),
            },
            None => defaults.baseline,
        };

        let stabilizer_defaults = defaults.tracker.stabilizer;
        let stabilizer = match file.stabilizer {
            Some(s) => StabilizerConfig {
                max_history: s.max_history.unwrap_or(stabilizer_defaults.max_history),
                min_samples: s.min_samples.unwrap_or(stabilizer_defaults.min_samples),
                stability_threshold: s
                    .stability_threshold
                    .unwrap_or(stabilizer_defaults.stability_threshold),
            },
            None => stabilizer_defaults,
        };

        let mut tracker = TrackerConfig {
            stabilizer,
            ..defaults.tracker
        };
        if let Some(t) = file.tracker {
            if let Some(threshold) = t.acceptance_threshold {
                tracker.acceptance_threshold = threshold;
            }
            for (label, threshold) in t.per_category.unwrap_or_default() {
                let category: Category = label
                    .parse()
                    .map_err(|e| anyhow!("invalid tracker.per_category key: {}", e))?;
                tracker.per_category.insert(category, threshold);
            }
        }

        Ok(Self {
            db_path,
            session_export: file.session_export,
            baseline,
            tracker,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("DWELL_DB_PATH") {
            if !path.trim().is_empty() {
                self.db_path = path;
            }
        }
        if let Ok(path) = std::env::var("DWELL_SESSION_EXPORT") {
            if !path.trim().is_empty() {
                self.session_export = Some(PathBuf::from(path));
            }
        }
        if let Some(capacity) = env_number::<usize>("DWELL_BATCH_CAPACITY")? {
            self.baseline.batch_capacity = capacity;
        }
        if let Some(tolerance) = env_number::<f64>("DWELL_TOLERANCE_SECS")? {
            self.baseline.tolerance_s = tolerance;
        }
        if let Some(expected) = env_number::<f64>("DWELL_EXPECTED_RECORD_SECS")? {
            self.baseline.expected_per_record_s = expected;
        }
        if let Some(expected) = env_number::<f64>("DWELL_EXPECTED_BATCH_SECS")? {
            self.baseline.expected_aggregate_s = expected;
        }
        if let Some(threshold) = env_number::<f32>("DWELL_ACCEPTANCE_THRESHOLD")? {
            self.tracker.acceptance_threshold = threshold;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let capacity = self.baseline.batch_capacity;
        if capacity == 0 || capacity > Category::ALL.len() {
            return Err(anyhow!(
                "batch_capacity must be between 1 and {}",
                Category::ALL.len()
            ));
        }
        if self.baseline.tolerance_s.is_nan() || self.baseline.tolerance_s < 0.0 {
            return Err(anyhow!("tolerance_s must be a non-negative number"));
        }
        let s = &self.tracker.stabilizer;
        if s.min_samples == 0 || s.max_history < s.min_samples {
            return Err(anyhow!(
                "stabilizer requires max_history >= min_samples >= 1"
            ));
        }
        if !(0.0..=1.0).contains(&s.stability_threshold) || s.stability_threshold == 0.0 {
            return Err(anyhow!("stability_threshold must be in (0, 1]"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<DwellConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path.extension().and_then(|ext| ext.to_str()) == Some("toml");
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn env_number<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} must be a number", key)),
        _ => Ok(None),
    }
}
