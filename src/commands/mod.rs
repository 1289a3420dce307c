//! Command implementations for the Lookout CLI.
//!
//! Each command opens the project's session store, performs one operation and
//! returns a value implementing [`Output`], which `main` prints as JSON or as
//! human-readable text.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::config::Settings;
use crate::mcp::tools;
use crate::models::{Message, Note, SessionSummary, Task, TaskBuckets, TaskStatus};
use crate::storage::{SessionStore, SqliteBackend};
use crate::Result;

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn json_of<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!(r#"{{"error": "{}"}}"#, e))
}

/// Abbreviated id for human output.
fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// The SQLite store in the project data directory. CLI commands always use it
/// so state can be inspected and seeded between runs.
pub fn open_store(settings: &Settings) -> Result<Arc<SessionStore>> {
    let backend = SqliteBackend::open(&settings.project_dir)?;
    Ok(Arc::new(SessionStore::new(Box::new(backend))))
}

/// The store `serve` uses: SQLite when persisting, memory otherwise.
pub fn open_serve_store(settings: &Settings) -> Result<Arc<SessionStore>> {
    if settings.persist.value {
        open_store(settings)
    } else {
        Ok(Arc::new(SessionStore::in_memory()))
    }
}

// === Tasks ===

impl Output for Task {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        format!(
            "[{}] {} ({}, iteration {})",
            short_id(&self.id),
            self.content,
            self.status,
            self.iteration
        )
    }
}

pub fn task_add(
    store: &SessionStore,
    session: &str,
    content: &str,
    status: Option<&str>,
    iteration: u32,
) -> Result<Task> {
    store.task_add(session, content, status, iteration)
}

pub fn task_status(
    store: &SessionStore,
    session: &str,
    id: &str,
    status: &str,
    iteration: u32,
) -> Result<Task> {
    store.task_status(session, id, status, iteration)
}

impl Output for TaskBuckets {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        if self.total() == 0 {
            return "No tasks.".to_string();
        }
        let mut lines = Vec::new();
        for status in TaskStatus::ALL {
            let tasks = self.bucket(status);
            if tasks.is_empty() {
                continue;
            }
            lines.push(format!("{} ({}):", status, tasks.len()));
            for task in tasks {
                lines.push(format!("  [{}] {}", short_id(&task.id), task.content));
            }
        }
        lines.join("\n")
    }
}

pub fn task_list(store: &SessionStore, session: &str) -> Result<TaskBuckets> {
    store.task_list(session)
}

// === Notes ===

impl Output for Note {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        format!(
            "[{}] {}: {}",
            short_id(&self.id),
            self.note_type,
            self.content
        )
    }
}

pub fn note_add(
    store: &SessionStore,
    session: &str,
    content: &str,
    note_type: &str,
    iteration: u32,
) -> Result<Note> {
    store.note_add(session, content, note_type, iteration)
}

#[derive(Serialize)]
pub struct NoteList {
    pub notes: Vec<Note>,
}

impl Output for NoteList {
    fn to_json(&self) -> String {
        json_of(&self.notes)
    }

    fn to_human(&self) -> String {
        if self.notes.is_empty() {
            return "No notes.".to_string();
        }
        self.notes
            .iter()
            .map(|n| format!("{} (iteration {})", n.to_human(), n.iteration))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn note_list(store: &SessionStore, session: &str, note_type: Option<&str>) -> Result<NoteList> {
    Ok(NoteList {
        notes: store.note_list(session, note_type)?,
    })
}

// === Inbox ===

impl Output for Message {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        let marker = if self.read { " " } else { "*" };
        format!("{}[{}] {}", marker, short_id(&self.id), self.body)
    }
}

pub fn inbox_send(store: &SessionStore, session: &str, body: &str) -> Result<Message> {
    store.inbox_send(session, body)
}

#[derive(Serialize)]
pub struct InboxList {
    pub messages: Vec<Message>,
}

impl Output for InboxList {
    fn to_json(&self) -> String {
        json_of(&self.messages)
    }

    fn to_human(&self) -> String {
        if self.messages.is_empty() {
            return "No unread messages.".to_string();
        }
        self.messages
            .iter()
            .map(Output::to_human)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn inbox_list(store: &SessionStore, session: &str) -> Result<InboxList> {
    Ok(InboxList {
        messages: store.inbox_list(session)?,
    })
}

pub fn inbox_mark_read(store: &SessionStore, session: &str, id: &str) -> Result<Message> {
    store.inbox_mark_read(session, id)
}

// === Sessions ===

#[derive(Serialize)]
pub struct SessionCompleted {
    pub session: String,
    pub complete: bool,
}

impl Output for SessionCompleted {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        format!("Session '{}' marked complete.", self.session)
    }
}

pub fn session_complete(store: &SessionStore, session: &str) -> Result<SessionCompleted> {
    store.session_complete(session)?;
    Ok(SessionCompleted {
        session: session.to_string(),
        complete: true,
    })
}

impl Output for SessionSummary {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Session '{}'{}",
            self.name,
            if self.complete { " (complete)" } else { "" }
        )];
        lines.push(format!(
            "  tasks: {} remaining, {} in progress, {} completed, {} blocked",
            self.remaining, self.in_progress, self.completed, self.blocked
        ));
        lines.push(format!("  notes: {}", self.notes));
        lines.push(format!("  unread messages: {}", self.unread));
        lines.join("\n")
    }
}

pub fn session_status(store: &SessionStore, session: &str) -> Result<SessionSummary> {
    store.summary(session)
}

#[derive(Serialize)]
pub struct SessionCleared {
    pub session: String,
    pub cleared: bool,
}

impl Output for SessionCleared {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        format!("Session '{}' cleared.", self.session)
    }
}

pub fn session_clear(store: &SessionStore, session: &str) -> Result<SessionCleared> {
    store.clear_session(session)?;
    Ok(SessionCleared {
        session: session.to_string(),
        cleared: true,
    })
}

#[derive(Serialize)]
pub struct SessionList {
    pub sessions: Vec<String>,
}

impl Output for SessionList {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        if self.sessions.is_empty() {
            return "No sessions.".to_string();
        }
        self.sessions.join("\n")
    }
}

pub fn session_list(store: &SessionStore) -> Result<SessionList> {
    Ok(SessionList {
        sessions: store.list_sessions()?,
    })
}

// === MCP ===

pub struct Manifest {
    pub manifest: Value,
}

impl Output for Manifest {
    fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.manifest).unwrap_or_else(|_| self.manifest.to_string())
    }

    fn to_human(&self) -> String {
        tools::get_tools()
            .iter()
            .map(|t| {
                let marker = if t.synchronous { " (waits for human)" } else { "" };
                format!("{:<18} {}{}", t.name, t.description, marker)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn mcp_manifest() -> Manifest {
    Manifest {
        manifest: tools::manifest(),
    }
}

// === Serve ===

/// Printed once the server is listening.
#[derive(Serialize)]
pub struct ServeStarted {
    pub session: String,
    pub port: u16,
    pub url: String,
}

impl Output for ServeStarted {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Session '{}' listening at {}\nPress Ctrl+C to stop",
            self.session, self.url
        )
    }
}
