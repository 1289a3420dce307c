//! Storage backend trait and implementations.
//!
//! The [`SessionStore`](super::SessionStore) keeps every session in memory and
//! writes each mutation through to a backend:
//! - `MemoryBackend` - Nothing is persisted (process lifetime only)
//! - `SqliteBackend` - A single `sessions.db` under the project data directory

use crate::Result;
use crate::models::{Message, Note, Session, Task};

/// Trait for backends that persist session data.
///
/// Backends are only called while the owning session's lock is held, so a
/// backend never sees two concurrent writes for the same session.
pub trait SessionBackend: Send + Sync {
    /// Load a previously persisted session, if any.
    fn load(&self, session: &str) -> Result<Option<Session>>;

    /// Insert or replace a task.
    fn save_task(&self, session: &str, task: &Task) -> Result<()>;

    /// Append a note.
    fn save_note(&self, session: &str, note: &Note) -> Result<()>;

    /// Insert or replace an inbox message.
    fn save_message(&self, session: &str, message: &Message) -> Result<()>;

    /// Persist the session's completion flag.
    fn set_complete(&self, session: &str, complete: bool) -> Result<()>;

    /// Remove every trace of a session.
    fn clear(&self, session: &str) -> Result<()>;

    /// Names of all persisted sessions.
    fn list_sessions(&self) -> Result<Vec<String>>;

    /// Get the backend type.
    fn backend_type(&self) -> BackendType;
}

/// Available storage backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// In-memory only
    Memory,
    /// SQLite database file
    Sqlite,
}

impl BackendType {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Sqlite => "sqlite",
        }
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Backend that persists nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryBackend;

impl SessionBackend for MemoryBackend {
    fn load(&self, _session: &str) -> Result<Option<Session>> {
        Ok(None)
    }

    fn save_task(&self, _session: &str, _task: &Task) -> Result<()> {
        Ok(())
    }

    fn save_note(&self, _session: &str, _note: &Note) -> Result<()> {
        Ok(())
    }

    fn save_message(&self, _session: &str, _message: &Message) -> Result<()> {
        Ok(())
    }

    fn set_complete(&self, _session: &str, _complete: bool) -> Result<()> {
        Ok(())
    }

    fn clear(&self, _session: &str) -> Result<()> {
        Ok(())
    }

    fn list_sessions(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Memory
    }
}
