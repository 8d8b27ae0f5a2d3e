//! dwell_report - query stored batch reports

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use dwell_kernel::{render_text, Category, DwellConfig, ReportStore, SqliteReportStore};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the report database. Defaults to the configured db_path.
    #[arg(long)]
    db_path: Option<String>,
    /// Print the text rendering instead of JSON.
    #[arg(long)]
    text: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Most recent batches, newest first.
    Recent {
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// One batch by sequence number.
    Show { sequence: u64 },
    /// Mean dwell of one category across all stored batches.
    Average { category: String },
    /// Every stored batch, newest first.
    All,
}

#[derive(Serialize)]
struct AverageOutput<'a> {
    category: Category,
    face: &'a str,
    average_duration_s: f64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let db_path = match args.db_path {
        Some(path) => path,
        None => DwellConfig::load()?.db_path,
    };
    if !std::path::Path::new(&db_path).exists() {
        return Err(anyhow!("report database {} does not exist", db_path));
    }
    let mut store = SqliteReportStore::open(&db_path)?;

    let batches = match args.command {
        Command::Recent { limit } => store.recent(limit)?,
        Command::All => {
            let n = store.count()?;
            store.recent(n)?
        }
        Command::Show { sequence } => match store.by_sequence(sequence)? {
            Some(batch) => vec![batch],
            None => return Err(anyhow!("batch {} not found", sequence)),
        },
        Command::Average { category } => {
            let category: Category = category.parse()?;
            let out = AverageOutput {
                category,
                face: category.face_name(),
                average_duration_s: store.average_duration(category)?,
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
            return Ok(());
        }
    };

    if args.text {
        for stored in &batches {
            println!("{}", render_text(&stored.closed.batch, &stored.closed.report));
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&batches)?);
    }
    Ok(())
}
