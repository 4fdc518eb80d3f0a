//! Core StoryStore implementation

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StoreError;
use crate::record::{NewStory, StoryRecord};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS stories (
    id          TEXT PRIMARY KEY,
    title       TEXT NOT NULL,
    text        TEXT NOT NULL,
    questions   TEXT NOT NULL,
    llm_model   TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
";

/// SQLite-backed store for finished stories
///
/// The connection sits behind a mutex so a store handle can be shared
/// by reference across await points on a multithreaded runtime.
/// Sessions are sequential, so the lock is never contended.
pub struct StoryStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl StoryStore {
    /// Open or create a store at the given database path
    ///
    /// Creates the parent directory and schema if missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&db_path)?;
        conn.execute_batch(SCHEMA)?;
        debug!(?db_path, "Opened story store");

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Persist a finished story, assigning its id and timestamp
    ///
    /// Records are immutable once created; there is no update or delete.
    pub fn create(&self, story: NewStory) -> Result<StoryRecord, StoreError> {
        let id = Uuid::now_v7().to_string();
        let created_at = Utc::now();
        let questions_json = serde_json::to_string(&story.questions)?;

        self.conn().execute(
            "INSERT INTO stories (id, title, text, questions, llm_model, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                story.title,
                story.text,
                questions_json,
                story.llm_model,
                created_at.to_rfc3339(),
            ],
        )?;

        info!(%id, model = %story.llm_model, "Persisted story");
        Ok(StoryRecord {
            id,
            title: story.title,
            text: story.text,
            questions: story.questions,
            llm_model: story.llm_model,
            created_at,
        })
    }

    /// Fetch a single story by id
    pub fn get(&self, id: &str) -> Result<StoryRecord, StoreError> {
        let row = self
            .conn()
            .query_row(
                "SELECT id, title, text, questions, llm_model, created_at
                 FROM stories WHERE id = ?1",
                params![id],
                raw_row,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(id.to_string()),
                other => StoreError::Sqlite(other),
            })?;

        into_record(row)
    }

    /// List stories in insertion order with offset/limit pagination
    pub fn list(&self, offset: usize, limit: usize) -> Result<Vec<StoryRecord>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, title, text, questions, llm_model, created_at
             FROM stories ORDER BY created_at ASC, id ASC LIMIT ?1 OFFSET ?2",
        )?;

        let rows = stmt.query_map(params![limit as i64, offset as i64], raw_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(into_record(row?)?);
        }
        Ok(records)
    }

    /// Path of the underlying database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

/// Raw column values before JSON/timestamp decoding
type RawRow = (String, String, String, String, String, String);

fn raw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn into_record(row: RawRow) -> Result<StoryRecord, StoreError> {
    let (id, title, text, questions_json, llm_model, created_at) = row;
    Ok(StoryRecord {
        id,
        title,
        text,
        questions: serde_json::from_str(&questions_json)?,
        llm_model,
        created_at: DateTime::parse_from_rfc3339(&created_at)?.with_timezone(&Utc),
    })
}
