//! dwelld - dwell-time batch analysis daemon
//!
//! This daemon:
//! 1. Reads detection ticks from a JSON-lines source (file or stdin)
//! 2. Tracks per-category dwell and groups completed stays into batches
//! 3. Analyzes every closed batch against the configured baseline
//! 4. Persists closed batches to SQLite and optionally a session JSON file
//! 5. On end of input or Ctrl-C, flushes active entities and closes the last batch

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::mpsc;

use dwell_kernel::{
    now_s, render_text, ClosedBatch, DwellConfig, Engine, InMemoryReportStore, JsonLinesSource,
    ReportStore, SessionExport, SqliteReportStore, TickSource,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON-lines tick input, or '-' for stdin.
    #[arg(long, default_value = "-")]
    input: String,
    /// Path to a TOML or JSON config file.
    #[arg(long, env = "DWELL_CONFIG")]
    config: Option<PathBuf>,
    /// Override the report database path.
    #[arg(long)]
    db_path: Option<String>,
    /// Rewrite this JSON file with every closed batch.
    #[arg(long)]
    session_export: Option<PathBuf>,
    /// Keep reports in memory only.
    #[arg(long)]
    dry_run: bool,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = DwellConfig::load_from(args.config.as_deref())?;
    if let Some(db_path) = args.db_path {
        cfg.db_path = db_path;
    }
    if args.session_export.is_some() {
        cfg.session_export = args.session_export;
    }

    let mut engine = Engine::from_config(&cfg)?;
    let mut store: Box<dyn ReportStore> = if args.dry_run {
        log::info!("dry run: reports kept in memory");
        Box::new(InMemoryReportStore::default())
    } else {
        Box::new(SqliteReportStore::open(&cfg.db_path)?)
    };
    if let Some(last) = store.last_sequence()? {
        engine.resume_after(last);
    }
    let mut session = SessionExport::new(now_s()?);
    let mut source = JsonLinesSource::open(&args.input)?;

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    log::info!(
        "dwelld running. capacity={} expected={:.1}s/record {:.1}s/batch tolerance={:.1}s",
        cfg.baseline.batch_capacity,
        cfg.baseline.expected_per_record_s,
        cfg.baseline.expected_aggregate_s,
        cfg.baseline.tolerance_s
    );
    if !args.dry_run {
        log::info!("writing reports to {}", cfg.db_path);
    }

    let mode = ui::UiMode::parse(Some(args.ui.as_str()));
    let mut progress = ui::ReplayProgress::new(
        mode,
        std::io::stderr().is_terminal(),
        !std::io::stdout().is_terminal(),
        &args.input,
    );
    let mut sink = Sink {
        store: store.as_mut(),
        session: &mut session,
        export_path: cfg.session_export.as_deref(),
        closed: 0,
    };

    let mut last_time = 0.0;
    loop {
        if rx.try_recv().is_ok() {
            log::info!("shutdown signal received, closing session...");
            break;
        }
        let Some(tick) = source.next_tick()? else {
            break;
        };
        last_time = tick.time_s;
        let outcome = engine.tick(&tick.detections, tick.time_s)?;
        progress.on_tick(
            tick.time_s,
            engine.tracker().active_len(),
            engine.grouper().open_records().len(),
            outcome.closed.len(),
        );
        for closed in outcome.closed {
            progress.suspend(|| println!("{}", render_text(&closed.batch, &closed.report)));
            sink.accept(closed);
        }
    }

    let outcome = engine.close(last_time)?;
    for closed in outcome.closed {
        progress.suspend(|| println!("{}", render_text(&closed.batch, &closed.report)));
        sink.accept(closed);
    }
    let closed_total = sink.closed;
    progress.finish(closed_total);

    let stats = engine.tracker().stats();
    let summary = engine.grouper().summary();
    log::info!(
        "session done: ticks={} entities={} records={} batches={} dropped_duplicates={} ignored_samples={}",
        stats.ticks,
        stats.entities_created,
        stats.records_emitted,
        summary.closed_batches,
        summary.dropped_duplicates,
        stats.samples_ignored + stats.duplicates_ignored
    );
    for (category, total) in engine.tracker().totals() {
        log::info!("total dwell {} ({}): {:.2}s", category, category.face_name(), total);
    }
    log::info!("{} batches stored", store.count()?);
    Ok(())
}

struct Sink<'a> {
    store: &'a mut dyn ReportStore,
    session: &'a mut SessionExport,
    export_path: Option<&'a std::path::Path>,
    closed: u64,
}

impl Sink<'_> {
    fn accept(&mut self, closed: ClosedBatch) {
        self.closed += 1;
        if let Err(e) = self.store.append(&closed) {
            log::error!("failed to persist batch {}: {}", closed.batch.sequence, e);
        }
        self.session.push(closed);
        if let Some(path) = self.export_path {
            if let Err(e) = self.session.write_to(path) {
                log::error!("{}", e);
            }
        }
    }
}
