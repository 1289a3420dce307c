//! SQLite session backend.
//!
//! All sessions of a project share one `sessions.db`. Rows keep their SQLite
//! rowid across upserts, so ordering by rowid yields insertion order.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::backend::{BackendType, SessionBackend};
use crate::models::{Message, Note, Session, Task};
use crate::{Error, Result};

/// Database file name inside the project data directory.
pub const DB_FILE: &str = "sessions.db";

pub struct SqliteBackend {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open (or create) the database inside `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(DB_FILE);
        let conn = Connection::open(&path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::init_schema(&conn)?;
        Ok(Self {
            path: Some(path),
            conn: Mutex::new(conn),
        })
    }

    /// Open a throwaway in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            path: None,
            conn: Mutex::new(conn),
        })
    }

    /// Path of the database file, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                name TEXT PRIMARY KEY,
                complete INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS tasks (
                session TEXT NOT NULL,
                id TEXT NOT NULL,
                content TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'remaining',
                iteration INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (session, id)
            );

            CREATE TABLE IF NOT EXISTS notes (
                session TEXT NOT NULL,
                id TEXT NOT NULL,
                content TEXT NOT NULL,
                note_type TEXT NOT NULL,
                iteration INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (session, id)
            );

            CREATE TABLE IF NOT EXISTS messages (
                session TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                read INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                PRIMARY KEY (session, id)
            );
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Other("SQLite connection lock poisoned".to_string()))
    }

    fn touch_session(conn: &Connection, session: &str) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO sessions (name, complete) VALUES (?1, 0)",
            [session],
        )?;
        Ok(())
    }
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Other(format!("Invalid timestamp '{}': {}", value, e)))
}

impl SessionBackend for SqliteBackend {
    fn load(&self, session: &str) -> Result<Option<Session>> {
        let conn = self.conn()?;

        let complete: Option<bool> = conn
            .query_row(
                "SELECT complete FROM sessions WHERE name = ?1",
                [session],
                |row| row.get(0),
            )
            .optional()?;
        let Some(complete) = complete else {
            return Ok(None);
        };

        let mut loaded = Session::new(session);
        loaded.complete = complete;

        let mut stmt = conn.prepare(
            "SELECT id, content, status, iteration, created_at, updated_at
             FROM tasks WHERE session = ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map([session], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;
        for row in rows {
            let (id, content, status, iteration, created_at, updated_at) = row?;
            loaded.tasks.push(Task {
                id,
                content,
                status: status.parse()?,
                iteration,
                created_at: parse_time(&created_at)?,
                updated_at: parse_time(&updated_at)?,
            });
        }

        let mut stmt = conn.prepare(
            "SELECT id, content, note_type, iteration, created_at
             FROM notes WHERE session = ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map([session], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;
        for row in rows {
            let (id, content, note_type, iteration, created_at) = row?;
            loaded.notes.push(Note {
                id,
                content,
                note_type: note_type.parse()?,
                iteration,
                created_at: parse_time(&created_at)?,
            });
        }

        let mut stmt = conn.prepare(
            "SELECT id, body, read, created_at
             FROM messages WHERE session = ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map([session], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        for row in rows {
            let (id, body, read, created_at) = row?;
            loaded.messages.push(Message {
                id,
                body,
                read,
                created_at: parse_time(&created_at)?,
            });
        }

        Ok(Some(loaded))
    }

    fn save_task(&self, session: &str, task: &Task) -> Result<()> {
        let conn = self.conn()?;
        Self::touch_session(&conn, session)?;
        conn.execute(
            "INSERT INTO tasks (session, id, content, status, iteration, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(session, id) DO UPDATE SET
                status = excluded.status,
                iteration = excluded.iteration,
                updated_at = excluded.updated_at",
            params![
                session,
                task.id,
                task.content,
                task.status.as_str(),
                task.iteration,
                task.created_at.to_rfc3339(),
                task.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn save_note(&self, session: &str, note: &Note) -> Result<()> {
        let conn = self.conn()?;
        Self::touch_session(&conn, session)?;
        conn.execute(
            "INSERT INTO notes (session, id, content, note_type, iteration, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session,
                note.id,
                note.content,
                note.note_type.as_str(),
                note.iteration,
                note.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn save_message(&self, session: &str, message: &Message) -> Result<()> {
        let conn = self.conn()?;
        Self::touch_session(&conn, session)?;
        conn.execute(
            "INSERT INTO messages (session, id, body, read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(session, id) DO UPDATE SET read = excluded.read",
            params![
                session,
                message.id,
                message.body,
                message.read,
                message.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn set_complete(&self, session: &str, complete: bool) -> Result<()> {
        let conn = self.conn()?;
        Self::touch_session(&conn, session)?;
        conn.execute(
            "UPDATE sessions SET complete = ?2 WHERE name = ?1",
            params![session, complete],
        )?;
        Ok(())
    }

    fn clear(&self, session: &str) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for table in ["tasks", "notes", "messages"] {
            tx.execute(&format!("DELETE FROM {} WHERE session = ?1", table), [session])?;
        }
        tx.execute("DELETE FROM sessions WHERE name = ?1", [session])?;
        tx.commit()?;
        Ok(())
    }

    fn list_sessions(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT name FROM sessions ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Sqlite
    }
}
