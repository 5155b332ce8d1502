//! SQLite-backed document store.
//!
//! Documents live in one table with a category column; the engine only ever
//! sees the rows tagged `agent`. Run logs are append-only in their own
//! table. Timestamps are stored as RFC 3339 text.

use async_trait::async_trait;
use bizflow_core::error::{BizflowError, Result};
use bizflow_core::traits::DocumentStore;
use bizflow_core::types::{AgentRecord, LogEntry};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn store_err(e: impl std::fmt::Display) -> BizflowError {
    BizflowError::Store(e.to_string())
}

impl SqliteStore {
    /// Open or create the document database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(store_err)?;
        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        tracing::debug!("💾 Document store ready at {}", path.display());
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                category TEXT NOT NULL DEFAULT 'document',
                content TEXT NOT NULL DEFAULT '',
                period INTEGER,                  -- milliseconds between runs
                is_started INTEGER NOT NULL DEFAULT 0,
                is_running INTEGER NOT NULL DEFAULT 0,
                last_run_at TEXT,
                next_run_at TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS agent_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                agent_id TEXT NOT NULL,
                log_text TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (agent_id) REFERENCES documents(id) ON DELETE CASCADE
            );
         ",
        )
        .map_err(store_err)?;
        Ok(())
    }

    /// Insert or replace an agent-tagged document.
    pub fn insert_document(&self, record: &AgentRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO documents
             (id, name, category, content, period, is_started, is_running,
              last_run_at, next_run_at, created_at)
             VALUES (?1, ?2, 'agent', ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                record.id,
                record.name,
                record.content,
                record.period,
                record.is_started as i32,
                record.is_running as i32,
                record.last_run_at.map(|t| t.to_rfc3339()),
                record.next_run_at.map(|t| t.to_rfc3339()),
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    pub fn delete_document(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM documents WHERE id = ?1", [id])
            .map_err(store_err)?;
        Ok(())
    }

    /// Recent log lines for one agent, newest last.
    pub fn agent_logs(&self, id: &str, limit: usize) -> Vec<LogEntry> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = match conn.prepare(
            "SELECT id, agent_id, log_text, created_at FROM agent_logs
             WHERE agent_id = ?1 ORDER BY id DESC LIMIT ?2",
        ) {
            Ok(stmt) => stmt,
            Err(_) => return Vec::new(),
        };
        let mut rows: Vec<LogEntry> = stmt
            .query_map(rusqlite::params![id, limit as i64], |row| {
                Ok(LogEntry {
                    id: row.get(0)?,
                    agent_id: row.get(1)?,
                    text: row.get(2)?,
                    created_at: parse_ts(row.get::<_, String>(3)?),
                })
            })
            .ok()
            .map(|r| r.filter_map(|e| e.ok()).collect())
            .unwrap_or_default();
        rows.reverse();
        rows
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<AgentRecord> {
        Ok(AgentRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            content: row.get(2)?,
            period: row.get(3)?,
            is_started: row.get::<_, i32>(4)? != 0,
            is_running: row.get::<_, i32>(5)? != 0,
            last_run_at: row.get::<_, Option<String>>(6)?.map(parse_ts),
            next_run_at: row.get::<_, Option<String>>(7)?.map(parse_ts),
        })
    }

    fn update_flag(&self, id: &str, column: &str, value: bool) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                &format!("UPDATE documents SET {column} = ?1 WHERE id = ?2"),
                rusqlite::params![value as i32, id],
            )
            .map_err(store_err)?;
        if changed == 0 {
            return Err(BizflowError::Store(format!("No document {id}")));
        }
        Ok(())
    }
}

fn parse_ts(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

const SELECT_RECORD: &str = "SELECT id, name, content, period, is_started, is_running,
                             last_run_at, next_run_at FROM documents";

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn list_agent_documents(&self) -> Result<Vec<AgentRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!("{SELECT_RECORD} WHERE category = 'agent' ORDER BY created_at"))
            .map_err(store_err)?;
        let records = stmt
            .query_map([], Self::row_to_record)
            .map_err(store_err)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(records)
    }

    async fn get_document(&self, id: &str) -> Result<Option<AgentRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!("{SELECT_RECORD} WHERE id = ?1"))
            .map_err(store_err)?;
        let record = stmt
            .query_map([id], Self::row_to_record)
            .map_err(store_err)?
            .filter_map(|r| r.ok())
            .next();
        Ok(record)
    }

    async fn set_running(&self, id: &str, running: bool) -> Result<()> {
        self.update_flag(id, "is_running", running)
    }

    async fn set_started(&self, id: &str, started: bool) -> Result<()> {
        self.update_flag(id, "is_started", started)
    }

    async fn set_last_run_at(&self, id: &str) -> Result<DateTime<Utc>> {
        let now = Utc::now();
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE documents SET last_run_at = ?1 WHERE id = ?2",
                rusqlite::params![now.to_rfc3339(), id],
            )
            .map_err(store_err)?;
        if changed == 0 {
            return Err(BizflowError::Store(format!("No document {id}")));
        }
        Ok(now)
    }

    async fn set_next_run_at(&self, id: &str) -> Result<DateTime<Utc>> {
        let conn = self.conn.lock().unwrap();
        let (last_run, period): (Option<String>, Option<i64>) = conn
            .query_row(
                "SELECT last_run_at, period FROM documents WHERE id = ?1",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|_| BizflowError::Store(format!("No document {id}")))?;

        let last = last_run.map(parse_ts).unwrap_or_else(Utc::now);
        let next = last + chrono::Duration::milliseconds(period.unwrap_or(0));
        conn.execute(
            "UPDATE documents SET next_run_at = ?1 WHERE id = ?2",
            rusqlite::params![next.to_rfc3339(), id],
        )
        .map_err(store_err)?;
        Ok(next)
    }

    async fn append_log(&self, id: &str, text: &str) -> Result<Option<LogEntry>> {
        let conn = self.conn.lock().unwrap();
        let exists: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM documents WHERE id = ?1",
                [id],
                |row| row.get::<_, i64>(0),
            )
            .map_err(store_err)?
            > 0;
        if !exists {
            return Ok(None);
        }

        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO agent_logs (agent_id, log_text, created_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![id, text, created_at.to_rfc3339()],
        )
        .map_err(store_err)?;
        Ok(Some(LogEntry {
            id: conn.last_insert_rowid(),
            agent_id: id.to_string(),
            text: text.to_string(),
            created_at,
        }))
    }
}
