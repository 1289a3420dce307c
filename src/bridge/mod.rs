//! Adapter between untyped tool-call arguments and the session store.
//!
//! The protocol layer hands over a JSON object of named parameters. The
//! bridge pulls the required fields out of it, rejects missing or
//! wrongly-typed ones with [`Error::MissingParameter`] before the store is
//! touched, and turns store results into JSON payloads.

use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::storage::SessionStore;
use crate::{Error, Result};

/// Tools served directly from the session store.
pub const STORE_TOOLS: [&str; 8] = [
    "task_add",
    "task_status",
    "task_list",
    "note_add",
    "note_list",
    "inbox_list",
    "inbox_mark_read",
    "session_complete",
];

/// Stateless translator bound to one session of a shared store.
#[derive(Clone)]
pub struct ToolBridge {
    store: Arc<SessionStore>,
    session: String,
}

impl ToolBridge {
    pub fn new(store: Arc<SessionStore>, session: impl Into<String>) -> Self {
        Self {
            store,
            session: session.into(),
        }
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Whether `tool` is one of the store-backed tools.
    pub fn handles(tool: &str) -> bool {
        STORE_TOOLS.contains(&tool)
    }

    /// Execute a store-backed tool.
    pub fn call(&self, tool: &str, args: &Map<String, Value>) -> Result<Value> {
        let session = self.session.as_str();
        match tool {
            "task_add" => {
                let content = required_str(args, "content")?;
                let status = optional_str(args, "status")?;
                let iteration = required_iteration(args)?;
                let task = self.store.task_add(session, content, status, iteration)?;
                Ok(serde_json::to_value(task)?)
            }
            "task_status" => {
                let id = required_str(args, "id")?;
                let status = required_str(args, "status")?;
                let iteration = required_iteration(args)?;
                self.store.task_status(session, id, status, iteration)?;
                Ok(json!({ "status": "updated" }))
            }
            "task_list" => Ok(serde_json::to_value(self.store.task_list(session)?)?),
            "note_add" => {
                let content = required_str(args, "content")?;
                let note_type = required_str(args, "type")?;
                let iteration = required_iteration(args)?;
                let note = self.store.note_add(session, content, note_type, iteration)?;
                Ok(serde_json::to_value(note)?)
            }
            "note_list" => {
                let filter = optional_str(args, "type")?;
                Ok(serde_json::to_value(self.store.note_list(session, filter)?)?)
            }
            "inbox_list" => Ok(serde_json::to_value(self.store.inbox_list(session)?)?),
            "inbox_mark_read" => {
                let id = required_str(args, "id")?;
                self.store.inbox_mark_read(session, id)?;
                Ok(json!({ "status": "marked_read" }))
            }
            "session_complete" => {
                self.store.session_complete(session)?;
                Ok(json!({ "status": "session_complete" }))
            }
            other => Err(Error::NotFound(format!("Unknown tool: {}", other))),
        }
    }
}

fn required_str<'a>(args: &'a Map<String, Value>, field: &str) -> Result<&'a str> {
    args.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MissingParameter(field.to_string()))
}

/// A present-but-null value counts as absent.
fn optional_str<'a>(args: &'a Map<String, Value>, field: &str) -> Result<Option<&'a str>> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(Error::MissingParameter(field.to_string())),
    }
}

fn required_iteration(args: &Map<String, Value>) -> Result<u32> {
    args.get("iteration")
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| Error::MissingParameter("iteration".to_string()))
}
