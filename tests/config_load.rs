use std::io::Write;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use dwell_kernel::{Category, DwellConfig};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "DWELL_CONFIG",
        "DWELL_DB_PATH",
        "DWELL_SESSION_EXPORT",
        "DWELL_BATCH_CAPACITY",
        "DWELL_TOLERANCE_SECS",
        "DWELL_EXPECTED_RECORD_SECS",
        "DWELL_EXPECTED_BATCH_SECS",
        "DWELL_ACCEPTANCE_THRESHOLD",
    ] {
        std::env::remove_var(key);
    }
}

fn temp_config(suffix: &str, body: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp config");
    file.write_all(body.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = DwellConfig::load().expect("load defaults");
    assert_eq!(cfg.db_path, "dwell.db");
    assert!(cfg.session_export.is_none());
    assert_eq!(cfg.baseline.batch_capacity, 3);
    assert_eq!(cfg.baseline.expected_per_record_s, 5.0);
    assert_eq!(cfg.baseline.expected_aggregate_s, 15.0);
    assert_eq!(cfg.baseline.tolerance_s, 5.0);
    assert_eq!(cfg.tracker.acceptance_threshold, 0.15);
    assert_eq!(cfg.tracker.stabilizer.max_history, 8);
    assert_eq!(cfg.tracker.stabilizer.min_samples, 2);
}

#[test]
fn loads_toml_file_with_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = temp_config(
        ".toml",
        r#"
db_path = "line3.db"

[baseline]
expected_per_record_s = 8.0
expected_aggregate_s = 24.0
batch_capacity = 4

[stabilizer]
max_history = 12

[tracker]
acceptance_threshold = 0.3

[tracker.per_category]
white = 0.5
"#,
    );

    std::env::set_var("DWELL_CONFIG", file.path());
    std::env::set_var("DWELL_TOLERANCE_SECS", "2.5");
    std::env::set_var("DWELL_SESSION_EXPORT", "/tmp/session.json");

    let cfg = DwellConfig::load().expect("load config");
    assert_eq!(cfg.db_path, "line3.db");
    assert_eq!(cfg.baseline.expected_per_record_s, 8.0);
    assert_eq!(cfg.baseline.expected_aggregate_s, 24.0);
    assert_eq!(cfg.baseline.batch_capacity, 4);
    assert_eq!(cfg.baseline.tolerance_s, 2.5);
    assert_eq!(cfg.tracker.stabilizer.max_history, 12);
    assert_eq!(cfg.tracker.stabilizer.min_samples, 2);
    assert_eq!(cfg.tracker.threshold_for(Category::White), 0.5);
    assert_eq!(cfg.tracker.threshold_for(Category::Red), 0.3);
    assert_eq!(
        cfg.session_export.as_deref(),
        Some(std::path::Path::new("/tmp/session.json"))
    );

    clear_env();
}

#[test]
fn loads_json_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = temp_config(
        ".json",
        r#"{"db_path": "json.db", "baseline": {"tolerance_s": 1.0}}"#,
    );
    let cfg = DwellConfig::load_from(Some(file.path())).expect("load config");
    assert_eq!(cfg.db_path, "json.db");
    assert_eq!(cfg.baseline.tolerance_s, 1.0);
    assert_eq!(cfg.baseline.batch_capacity, 3);
}

#[test]
fn rejects_out_of_range_capacity() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("DWELL_BATCH_CAPACITY", "7");
    assert!(DwellConfig::load().is_err());
    std::env::set_var("DWELL_BATCH_CAPACITY", "0");
    assert!(DwellConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("DWELL_TOLERANCE_SECS", "-1");
    assert!(DwellConfig::load().is_err());
    clear_env();

    std::env::set_var("DWELL_ACCEPTANCE_THRESHOLD", "lots");
    assert!(DwellConfig::load().is_err());
    clear_env();

    let bad_key = temp_config(".toml", "[tracker.per_category]\npurple = 0.2\n");
    assert!(DwellConfig::load_from(Some(bad_key.path())).is_err());

    let bad_stabilizer = temp_config(
        ".toml",
        "[stabilizer]\nmax_history = 1\nmin_samples = 2\n",
    );
    assert!(DwellConfig::load_from(Some(bad_stabilizer.path())).is_err());

    assert!(DwellConfig::load_from(Some(std::path::Path::new("/nonexistent/dwell.toml"))).is_err());
}
