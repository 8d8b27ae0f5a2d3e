use dwell_kernel::{
    Baseline, Category, ClosedBatch, DetectionSample, Engine, Region, ReportStore,
    SqliteReportStore, TrackerConfig,
};

fn closed_batches() -> Vec<ClosedBatch> {
    use Category::*;
    let mut e = Engine::new(Baseline::default(), TrackerConfig::default()).unwrap();
    let schedule: &[(f64, &[Category])] = &[
        (0.0, &[Red, Blue, Green]),
        (4.0, &[Red]),
        (8.0, &[]),
        (9.0, &[White, Yellow]),
        (10.0, &[]),
    ];
    let mut closed = Vec::new();
    for &(t, present) in schedule {
        let detections: Vec<DetectionSample> = present
            .iter()
            .map(|&c| DetectionSample::new(c, 0.7, Region::new(0, 0, 16, 16)))
            .collect();
        closed.extend(e.tick(&detections, t).unwrap().closed);
    }
    closed.extend(e.close(10.0).unwrap().closed);
    closed
}

#[test]
fn persisted_batches_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("dwell.db");
    let db_path = db_path.to_str().unwrap();

    let batches = closed_batches();
    assert_eq!(batches.len(), 2);
    {
        let mut store = SqliteReportStore::open(db_path).unwrap();
        for closed in &batches {
            store.append(closed).unwrap();
        }
    }

    let mut store = SqliteReportStore::open(db_path).unwrap();
    assert_eq!(store.count().unwrap(), 2);

    let first = store.by_sequence(1).unwrap().expect("batch 1");
    assert_eq!(first.closed, batches[0]);
    assert!(!first.closed.batch.forced);

    let recent = store.recent(10).unwrap();
    assert_eq!(recent[0].closed.batch.sequence, 2);
    assert!(recent[0].closed.batch.forced);

    // red stays 8s, in the first batch only
    assert_eq!(store.average_duration(Category::Red).unwrap(), 8.0);
    assert_eq!(store.average_duration(Category::White).unwrap(), 1.0);
    assert_eq!(store.average_duration(Category::Orange).unwrap(), 0.0);
}

/// One short run: a single object, closed at teardown into a forced batch.
fn one_batch_run(store: &mut SqliteReportStore, category: Category) -> u64 {
    let mut e = Engine::new(Baseline::default(), TrackerConfig::default()).unwrap();
    if let Some(last) = store.last_sequence().unwrap() {
        e.resume_after(last);
    }
    let seen = [DetectionSample::new(category, 0.7, Region::new(0, 0, 16, 16))];
    e.tick(&seen, 0.0).unwrap();
    let closed = e.close(2.0).unwrap().closed;
    assert_eq!(closed.len(), 1);
    store.append(&closed[0]).unwrap();
    closed[0].batch.sequence
}

#[test]
fn later_runs_continue_numbering_in_the_same_database() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("dwell.db");
    let db_path = db_path.to_str().unwrap();

    let first = {
        let mut store = SqliteReportStore::open(db_path).unwrap();
        one_batch_run(&mut store, Category::Red)
    };
    let mut store = SqliteReportStore::open(db_path).unwrap();
    let second = one_batch_run(&mut store, Category::Blue);

    assert_eq!((first, second), (1, 2));
    assert_eq!(store.count().unwrap(), 2);
    let red = store.by_sequence(1).unwrap().expect("first run");
    let blue = store.by_sequence(2).unwrap().expect("second run");
    assert_eq!(red.closed.batch.records[0].category, Category::Red);
    assert_eq!(blue.closed.batch.records[0].category, Category::Blue);
}

#[test]
fn stored_batch_serializes_flat() {
    let mut store = SqliteReportStore::open_in_memory().unwrap();
    let batches = closed_batches();
    store.append(&batches[0]).unwrap();
    let stored = store.recent(1).unwrap();
    let json = serde_json::to_value(&stored).unwrap();
    assert_eq!(json[0]["id"], 1);
    assert_eq!(json[0]["batch"]["sequence"], 1);
    assert_eq!(json[0]["report"]["timing"], "on_time");
}
