//! Data models for Lookout entities.
//!
//! This module defines the session-scoped data structures:
//! - `Task` - Work items the agent tracks across iterations
//! - `Note` - Append-only learnings, decisions, and tips
//! - `Message` - Human-to-agent inbox messages
//! - `Session` - The aggregate owning all of the above
//!
//! The structured question/answer types used by the synchronous tools live in
//! [`interaction`].

pub mod interaction;

pub use interaction::{Answer, Question, QuestionOption};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Task status in the workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Remaining,
    InProgress,
    Completed,
    Blocked,
}

impl TaskStatus {
    /// Every status, in display order.
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Remaining,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Blocked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Remaining => "remaining",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remaining" => Ok(TaskStatus::Remaining),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "blocked" => Ok(TaskStatus::Blocked),
            _ => Err(Error::Validation(format!(
                "invalid task status '{}' (expected remaining, in_progress, completed, or blocked)",
                s
            ))),
        }
    }
}

/// Kind of note recorded by the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteType {
    Learning,
    Stuck,
    Tip,
    Decision,
}

impl NoteType {
    pub const ALL: [NoteType; 4] = [
        NoteType::Learning,
        NoteType::Stuck,
        NoteType::Tip,
        NoteType::Decision,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NoteType::Learning => "learning",
            NoteType::Stuck => "stuck",
            NoteType::Tip => "tip",
            NoteType::Decision => "decision",
        }
    }
}

impl fmt::Display for NoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NoteType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "learning" => Ok(NoteType::Learning),
            "stuck" => Ok(NoteType::Stuck),
            "tip" => Ok(NoteType::Tip),
            "decision" => Ok(NoteType::Decision),
            _ => Err(Error::Validation(format!(
                "invalid note type '{}' (expected learning, stuck, tip, or decision)",
                s
            ))),
        }
    }
}

/// A work item tracked within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier (32 lowercase hex characters)
    pub id: String,

    /// What needs doing; immutable after creation
    pub content: String,

    /// Current status
    #[serde(default)]
    pub status: TaskStatus,

    /// Agent iteration that last touched this task
    pub iteration: u32,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new task with the given ID and content.
    pub fn new(id: String, content: String, status: TaskStatus, iteration: u32) -> Self {
        let now = Utc::now();
        Self {
            id,
            content,
            status,
            iteration,
            created_at: now,
            updated_at: now,
        }
    }
}

/// An append-only note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub note_type: NoteType,
    pub iteration: u32,
    pub created_at: DateTime<Utc>,
}

impl Note {
    pub fn new(id: String, content: String, note_type: NoteType, iteration: u32) -> Self {
        Self {
            id,
            content,
            note_type,
            iteration,
            created_at: Utc::now(),
        }
    }
}

/// A human-to-agent inbox message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub body: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(id: String, body: String) -> Self {
        Self {
            id,
            body,
            read: false,
            created_at: Utc::now(),
        }
    }
}

/// The owning aggregate for one collaboration session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub name: String,
    /// Tasks in creation order
    pub tasks: Vec<Task>,
    /// Notes in insertion order
    pub notes: Vec<Note>,
    /// Inbox messages in insertion order
    pub messages: Vec<Message>,
    /// Set once the agent signals that no further iterations are needed
    #[serde(default)]
    pub complete: bool,
}

impl Session {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Whether any entity in this session already uses `id`.
    pub fn contains_id(&self, id: &str) -> bool {
        self.tasks.iter().any(|t| t.id == id)
            || self.notes.iter().any(|n| n.id == id)
            || self.messages.iter().any(|m| m.id == id)
    }

    pub fn unread_count(&self) -> usize {
        self.messages.iter().filter(|m| !m.read).count()
    }
}

/// Tasks grouped by status, each bucket in creation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskBuckets {
    pub remaining: Vec<Task>,
    pub in_progress: Vec<Task>,
    pub completed: Vec<Task>,
    pub blocked: Vec<Task>,
}

impl TaskBuckets {
    /// Group tasks by status, preserving the input order within each bucket.
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut buckets = Self::default();
        for task in tasks {
            buckets.bucket_mut(task.status).push(task.clone());
        }
        buckets
    }

    pub fn bucket(&self, status: TaskStatus) -> &[Task] {
        match status {
            TaskStatus::Remaining => &self.remaining,
            TaskStatus::InProgress => &self.in_progress,
            TaskStatus::Completed => &self.completed,
            TaskStatus::Blocked => &self.blocked,
        }
    }

    fn bucket_mut(&mut self, status: TaskStatus) -> &mut Vec<Task> {
        match status {
            TaskStatus::Remaining => &mut self.remaining,
            TaskStatus::InProgress => &mut self.in_progress,
            TaskStatus::Completed => &mut self.completed,
            TaskStatus::Blocked => &mut self.blocked,
        }
    }

    pub fn total(&self) -> usize {
        self.remaining.len() + self.in_progress.len() + self.completed.len() + self.blocked.len()
    }
}

/// Counts reported by `session status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub name: String,
    pub remaining: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub blocked: usize,
    pub notes: usize,
    pub unread: usize,
    pub complete: bool,
}

impl SessionSummary {
    pub fn of(session: &Session) -> Self {
        let count = |status: TaskStatus| session.tasks.iter().filter(|t| t.status == status).count();
        Self {
            name: session.name.clone(),
            remaining: count(TaskStatus::Remaining),
            in_progress: count(TaskStatus::InProgress),
            completed: count(TaskStatus::Completed),
            blocked: count(TaskStatus::Blocked),
            notes: session.notes.len(),
            unread: session.unread_count(),
            complete: session.complete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_parse_round_trip() {
        for status in TaskStatus::ALL {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_task_status_rejects_unknown() {
        let err = "done".parse::<TaskStatus>().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_task_status_serde_snake_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn test_note_type_rejects_unknown() {
        assert!(matches!(
            "idea".parse::<NoteType>(),
            Err(Error::Validation(_))
        ));
        assert_eq!("tip".parse::<NoteType>().unwrap(), NoteType::Tip);
    }

    #[test]
    fn test_note_serializes_type_field() {
        let note = Note::new("n1".into(), "hi".into(), NoteType::Decision, 3);
        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["type"], "decision");
        assert_eq!(value["iteration"], 3);
    }

    #[test]
    fn test_buckets_preserve_creation_order() {
        let a = Task::new("a".into(), "A".into(), TaskStatus::Remaining, 1);
        let b = Task::new("b".into(), "B".into(), TaskStatus::Blocked, 1);
        let c = Task::new("c".into(), "C".into(), TaskStatus::Remaining, 1);
        let buckets = TaskBuckets::from_tasks([&a, &b, &c]);

        let ids: Vec<_> = buckets.remaining.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
        assert_eq!(buckets.bucket(TaskStatus::Blocked).len(), 1);
        assert!(buckets.in_progress.is_empty());
        assert_eq!(buckets.total(), 3);
    }

    #[test]
    fn test_session_summary_counts() {
        let mut session = Session::new("demo");
        session
            .tasks
            .push(Task::new("a".into(), "A".into(), TaskStatus::Completed, 1));
        session.messages.push(Message::new("m".into(), "hello".into()));
        let summary = SessionSummary::of(&session);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.unread, 1);
        assert!(!summary.complete);
    }
}
