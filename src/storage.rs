use anyhow::{anyhow, Result};
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::engine::ClosedBatch;
use crate::{now_s, Category};

/// A persisted batch as read back from a store.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StoredBatch {
    pub id: i64,
    pub created_at: i64,
    #[serde(flatten)]
    pub closed: ClosedBatch,
}

/// Durable sink for closed batches and their reports.
pub trait ReportStore {
    /// Persist one closed batch. Returns the store's row id.
    fn append(&mut self, closed: &ClosedBatch) -> Result<i64>;

    /// Newest first.
    fn recent(&mut self, limit: usize) -> Result<Vec<StoredBatch>>;

    fn by_sequence(&mut self, sequence: u64) -> Result<Option<StoredBatch>>;

    /// Mean record duration for a category across all stored batches.
    /// Zero when the category has never been recorded.
    fn average_duration(&mut self, category: Category) -> Result<f64>;

    fn count(&mut self) -> Result<usize>;

    /// Highest stored batch sequence, `None` for an empty store.
    fn last_sequence(&mut self) -> Result<Option<u64>>;
}

pub struct SqliteReportStore {
    conn: Connection,
}

impl SqliteReportStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS batches (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              sequence INTEGER NOT NULL UNIQUE,
              created_at INTEGER NOT NULL,
              aggregate_s REAL NOT NULL,
              forced INTEGER NOT NULL,
              timing TEXT NOT NULL,
              aggregate_deviation_s REAL NOT NULL,
              batch_json TEXT NOT NULL,
              report_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS records (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              batch_id INTEGER NOT NULL REFERENCES batches(id),
              position INTEGER NOT NULL,
              category TEXT NOT NULL,
              face TEXT NOT NULL,
              duration_s REAL NOT NULL,
              entry_s REAL NOT NULL,
              exit_s REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_batches_created ON batches(created_at);
            CREATE INDEX IF NOT EXISTS idx_records_category ON records(category);
            "#,
        )?;
        Ok(())
    }

    fn load_rows(&self, sql: &str, param: i64) -> Result<Vec<StoredBatch>> {
        let rows = {
            let mut stmt = self.conn.prepare(sql)?;
            let mut rows = stmt.query(params![param])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let id: i64 = row.get(0)?;
                let created_at: i64 = row.get(1)?;
                let batch_json: String = row.get(2)?;
                let report_json: String = row.get(3)?;
                out.push((id, created_at, batch_json, report_json));
            }
            out
        };

        rows.into_iter()
            .map(|(id, created_at, batch_json, report_json)| {
                Ok(StoredBatch {
                    id,
                    created_at,
                    closed: ClosedBatch {
                        batch: serde_json::from_str(&batch_json)?,
                        report: serde_json::from_str(&report_json)?,
                    },
                })
            })
            .collect()
    }
}

impl ReportStore for SqliteReportStore {
    fn append(&mut self, closed: &ClosedBatch) -> Result<i64> {
        let sequence = i64::try_from(closed.batch.sequence)
            .map_err(|_| anyhow!("batch sequence exceeds i64 range"))?;
        let created_at = now_s()? as i64;
        let batch_json = serde_json::to_string(&closed.batch)?;
        let report_json = serde_json::to_string(&closed.report)?;

        let tx = self.conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO batches(sequence, created_at, aggregate_s, forced, timing,
                                aggregate_deviation_s, batch_json, report_json)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                sequence,
                created_at,
                closed.batch.aggregate_duration,
                closed.batch.forced,
                closed.report.timing.as_str(),
                closed.report.aggregate_deviation,
                batch_json,
                report_json
            ],
        )?;
        let batch_id = tx.last_insert_rowid();

        for (position, record) in closed.batch.records.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO records(batch_id, position, category, face, duration_s, entry_s, exit_s)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    batch_id,
                    position as i64,
                    record.category.as_str(),
                    record.category.face_name(),
                    record.duration,
                    record.entry_time,
                    record.exit_time
                ],
            )?;
        }
        tx.commit()?;
        Ok(batch_id)
    }

    fn recent(&mut self, limit: usize) -> Result<Vec<StoredBatch>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.load_rows(
            "SELECT id, created_at, batch_json, report_json FROM batches ORDER BY sequence DESC LIMIT ?1",
            limit,
        )
    }

    fn by_sequence(&mut self, sequence: u64) -> Result<Option<StoredBatch>> {
        let Ok(sequence) = i64::try_from(sequence) else {
            return Ok(None);
        };
        Ok(self
            .load_rows(
                "SELECT id, created_at, batch_json, report_json FROM batches WHERE sequence = ?1",
                sequence,
            )?
            .into_iter()
            .next())
    }

    fn average_duration(&mut self, category: Category) -> Result<f64> {
        // AVG over no rows yields a single NULL row
        let avg: Option<f64> = self.conn.query_row(
            "SELECT AVG(duration_s) FROM records WHERE category = ?1",
            params![category.as_str()],
            |row| row.get(0),
        )?;
        Ok(avg.unwrap_or(0.0))
    }

    fn count(&mut self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM batches", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    fn last_sequence(&mut self) -> Result<Option<u64>> {
        let max: Option<i64> = self
            .conn
            .query_row("SELECT MAX(sequence) FROM batches", [], |row| row.get(0))?;
        max.map(|n| u64::try_from(n).map_err(|_| anyhow!("negative batch sequence {}", n)))
            .transpose()
    }
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryReportStore {
    batches: Vec<StoredBatch>,
}

impl ReportStore for InMemoryReportStore {
    fn append(&mut self, closed: &ClosedBatch) -> Result<i64> {
        if self
            .batches
            .iter()
            .any(|b| b.closed.batch.sequence == closed.batch.sequence)
        {
            return Err(anyhow!(
                "batch sequence {} already stored",
                closed.batch.sequence
            ));
        }
        let id = self.batches.len() as i64 + 1;
        self.batches.push(StoredBatch {
            id,
            created_at: now_s()? as i64,
            closed: closed.clone(),
        });
        Ok(id)
    }

    fn recent(&mut self, limit: usize) -> Result<Vec<StoredBatch>> {
        let mut out: Vec<StoredBatch> = self.batches.clone();
        out.sort_by(|a, b| b.closed.batch.sequence.cmp(&a.closed.batch.sequence));
        out.truncate(limit);
        Ok(out)
    }

    fn by_sequence(&mut self, sequence: u64) -> Result<Option<StoredBatch>> {
        Ok(self
            .batches
            .iter()
            .find(|b| b.closed.batch.sequence == sequence)
            .cloned())
    }

    fn average_duration(&mut self, category: Category) -> Result<f64> {
        let durations: Vec<f64> = self
            .batches
            .iter()
            .flat_map(|b| b.closed.batch.records.iter())
            .filter(|r| r.category == category)
            .map(|r| r.duration)
            .collect();
        if durations.is_empty() {
            return Ok(0.0);
        }
        Ok(durations.iter().sum::<f64>() / durations.len() as f64)
    }

    fn count(&mut self) -> Result<usize> {
        Ok(self.batches.len())
    }

    fn last_sequence(&mut self) -> Result<Option<u64>> {
        Ok(self.batches.iter().map(|b| b.closed.batch.sequence).max())
    }
}
