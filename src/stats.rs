use crate::app_dirs::AppDirs;
use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Level and streak saved after each graded answer, used to resume the next session.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub level: f64,
    pub streak: u32,
    pub recorded_at: DateTime<Local>,
}

/// One answered question, as kept in the history and exported to CSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerRecord {
    pub recorded_at: DateTime<Local>,
    pub phase: String,
    pub question_level: f64,
    pub prompt: String,
    pub response: String,
    pub time_taken_secs: f64,
    pub level_after: f64,
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS snapshots (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        level REAL NOT NULL,
        streak INTEGER NOT NULL,
        recorded_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS answers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        recorded_at TEXT NOT NULL,
        phase TEXT NOT NULL,
        question_level REAL NOT NULL,
        prompt TEXT NOT NULL,
        response TEXT NOT NULL,
        time_taken_secs REAL NOT NULL,
        level_after REAL NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_answers_recorded_at ON answers(recorded_at);
"#;

fn parse_timestamp(raw: &str, column: usize) -> rusqlite::Result<DateTime<Local>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Local))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e)))
}

fn answer_from_row(row: &Row<'_>) -> rusqlite::Result<AnswerRecord> {
    let recorded_at: String = row.get(0)?;
    Ok(AnswerRecord {
        recorded_at: parse_timestamp(&recorded_at, 0)?,
        phase: row.get(1)?,
        question_level: row.get(2)?,
        prompt: row.get(3)?,
        response: row.get(4)?,
        time_taken_secs: row.get(5)?,
        level_after: row.get(6)?,
    })
}

/// Learner progress stored in SQLite.
#[derive(Debug)]
pub struct ProgressDb {
    conn: Connection,
}

impl ProgressDb {
    /// Open (or create) the database at `path`, creating parent directories as needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    /// Database under the state directory.
    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path())
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    pub fn default_path() -> PathBuf {
        AppDirs::db_path().unwrap_or_else(|| PathBuf::from("rungs_progress.db"))
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn save_snapshot(&self, level: f64, streak: u32) -> Result<()> {
        self.conn.execute(
            "INSERT INTO snapshots (level, streak, recorded_at) VALUES (?1, ?2, ?3)",
            params![level, streak, Local::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn latest_snapshot(&self) -> Result<Option<Snapshot>> {
        let snapshot = self
            .conn
            .query_row(
                "SELECT level, streak, recorded_at FROM snapshots ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    let recorded_at: String = row.get(2)?;
                    Ok(Snapshot {
                        level: row.get(0)?,
                        streak: row.get(1)?,
                        recorded_at: parse_timestamp(&recorded_at, 2)?,
                    })
                },
            )
            .optional()?;
        Ok(snapshot)
    }

    pub fn record_answer(&self, answer: &AnswerRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO answers
            (recorded_at, phase, question_level, prompt, response, time_taken_secs, level_after)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                answer.recorded_at.to_rfc3339(),
                answer.phase,
                answer.question_level,
                answer.prompt,
                answer.response,
                answer.time_taken_secs,
                answer.level_after,
            ],
        )?;
        Ok(())
    }

    /// Newest first.
    pub fn recent_answers(&self, limit: usize) -> Result<Vec<AnswerRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT recorded_at, phase, question_level, prompt, response, time_taken_secs, level_after
            FROM answers
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map([limit], answer_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn answer_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM answers", [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }

    pub fn clear_all(&self) -> Result<()> {
        self.conn
            .execute_batch("DELETE FROM answers; DELETE FROM snapshots;")?;
        Ok(())
    }

    /// Write the whole answer history, oldest first, as CSV. Returns the number of rows.
    pub fn export_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT recorded_at, phase, question_level, prompt, response, time_taken_secs, level_after
            FROM answers
            ORDER BY id ASC
            "#,
        )?;
        let mut csv = csv::Writer::from_writer(writer);
        let mut written = 0;
        for answer in stmt.query_map([], answer_from_row)? {
            csv.serialize(answer?)?;
            written += 1;
        }
        csv.flush()?;
        tracing::info!(rows = written, "exported answer history");
        Ok(written)
    }
}
