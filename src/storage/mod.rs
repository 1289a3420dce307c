//! Storage layer for Lookout sessions.
//!
//! [`SessionStore`] is the in-process home of every session's tasks, notes,
//! and inbox. Each session sits behind its own mutex, so operations on one
//! session are serialized while different sessions never block each other.
//! Every mutation is written through to a [`SessionBackend`].
//!
//! ## Storage Backends
//!
//! - **Memory** (default for an embedded bridge): nothing outlives the process
//! - **SQLite**: `<data-dir>/<project-hash>/sessions.db`

pub mod backend;
pub mod prefix;
pub mod sqlite;

pub use backend::{BackendType, MemoryBackend, SessionBackend};
pub use prefix::{MIN_PREFIX_LEN, PrefixMatch, match_prefix, resolve_prefix};
pub use sqlite::SqliteBackend;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::models::{
    Message, Note, NoteType, Session, SessionSummary, Task, TaskBuckets, TaskStatus,
};
use crate::{Error, Result};

type SharedSession = Arc<Mutex<Session>>;

/// Concurrency-safe repository of session state.
pub struct SessionStore {
    backend: Box<dyn SessionBackend>,
    sessions: RwLock<HashMap<String, SharedSession>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl SessionStore {
    pub fn new(backend: Box<dyn SessionBackend>) -> Self {
        Self {
            backend,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// A store that persists nothing.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryBackend))
    }

    pub fn backend_type(&self) -> BackendType {
        self.backend.backend_type()
    }

    /// Fetch (hydrating from the backend if needed) the shared handle for a session.
    fn session(&self, name: &str) -> Result<SharedSession> {
        if name.trim().is_empty() {
            return Err(Error::Validation("session name must not be empty".to_string()));
        }

        if let Some(existing) = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(Arc::clone(existing));
        }

        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = sessions.get(name) {
            return Ok(Arc::clone(existing));
        }
        let loaded = self
            .backend
            .load(name)?
            .unwrap_or_else(|| Session::new(name));
        let shared = Arc::new(Mutex::new(loaded));
        sessions.insert(name.to_string(), Arc::clone(&shared));
        Ok(shared)
    }

    /// Run `f` with exclusive access to a session.
    ///
    /// A SQLite-backed session is re-read first: other processes (the CLI
    /// next to a running `serve --persist`) write to the same database.
    fn with_session<T>(&self, name: &str, f: impl FnOnce(&mut Session) -> Result<T>) -> Result<T> {
        let shared = self.session(name)?;
        let mut guard: MutexGuard<'_, Session> =
            shared.lock().unwrap_or_else(PoisonError::into_inner);
        if self.backend.backend_type() == BackendType::Sqlite {
            *guard = self
                .backend
                .load(name)?
                .unwrap_or_else(|| Session::new(name));
        }
        f(&mut guard)
    }

    // === Task Operations ===

    /// Create a new task. Status defaults to `remaining` when omitted or empty.
    pub fn task_add(
        &self,
        session: &str,
        content: &str,
        status: Option<&str>,
        iteration: u32,
    ) -> Result<Task> {
        if content.trim().is_empty() {
            return Err(Error::Validation("task content must not be empty".to_string()));
        }
        let status = match status.map(str::trim) {
            None | Some("") => TaskStatus::default(),
            Some(s) => s.parse()?,
        };

        self.with_session(session, |s| {
            let id = generate_id(|candidate| s.contains_id(candidate));
            let task = Task::new(id, content.to_string(), status, iteration);
            self.backend.save_task(&s.name, &task)?;
            s.tasks.push(task.clone());
            tracing::debug!(session = %s.name, id = %task.id, "task added");
            Ok(task)
        })
    }

    /// Update the status (and iteration) of the task addressed by `id_or_prefix`.
    pub fn task_status(
        &self,
        session: &str,
        id_or_prefix: &str,
        status: &str,
        iteration: u32,
    ) -> Result<Task> {
        let status: TaskStatus = status.trim().parse()?;

        self.with_session(session, |s| {
            let index = resolve_prefix(id_or_prefix, s.tasks.iter().map(|t| t.id.as_str()), "Task")?;
            let mut updated = s.tasks[index].clone();
            updated.status = status;
            updated.iteration = iteration;
            updated.updated_at = Utc::now();
            self.backend.save_task(&s.name, &updated)?;
            s.tasks[index] = updated.clone();
            Ok(updated)
        })
    }

    /// All tasks grouped by status. Never fails for a valid session name.
    pub fn task_list(&self, session: &str) -> Result<TaskBuckets> {
        self.with_session(session, |s| Ok(TaskBuckets::from_tasks(&s.tasks)))
    }

    // === Note Operations ===

    pub fn note_add(
        &self,
        session: &str,
        content: &str,
        note_type: &str,
        iteration: u32,
    ) -> Result<Note> {
        if content.trim().is_empty() {
            return Err(Error::Validation("note content must not be empty".to_string()));
        }
        let note_type: NoteType = note_type.trim().parse()?;

        self.with_session(session, |s| {
            let id = generate_id(|candidate| s.contains_id(candidate));
            let note = Note::new(id, content.to_string(), note_type, iteration);
            self.backend.save_note(&s.name, &note)?;
            s.notes.push(note.clone());
            Ok(note)
        })
    }

    /// Notes in insertion order, optionally restricted to one type.
    pub fn note_list(&self, session: &str, type_filter: Option<&str>) -> Result<Vec<Note>> {
        let filter = match type_filter.map(str::trim) {
            None | Some("") => None,
            Some(t) => Some(t.parse::<NoteType>()?),
        };
        self.with_session(session, |s| {
            Ok(s.notes
                .iter()
                .filter(|n| filter.is_none_or(|t| n.note_type == t))
                .cloned()
                .collect())
        })
    }

    // === Inbox Operations ===

    /// Post a human-to-agent message.
    pub fn inbox_send(&self, session: &str, body: &str) -> Result<Message> {
        if body.trim().is_empty() {
            return Err(Error::Validation("message body must not be empty".to_string()));
        }
        self.with_session(session, |s| {
            let id = generate_id(|candidate| s.contains_id(candidate));
            let message = Message::new(id, body.to_string());
            self.backend.save_message(&s.name, &message)?;
            s.messages.push(message.clone());
            Ok(message)
        })
    }

    /// Unread messages in insertion order.
    pub fn inbox_list(&self, session: &str) -> Result<Vec<Message>> {
        self.with_session(session, |s| {
            Ok(s.messages.iter().filter(|m| !m.read).cloned().collect())
        })
    }

    /// Mark a message read. Marking an already-read message succeeds.
    pub fn inbox_mark_read(&self, session: &str, id_or_prefix: &str) -> Result<Message> {
        self.with_session(session, |s| {
            let index = resolve_prefix(
                id_or_prefix,
                s.messages.iter().map(|m| m.id.as_str()),
                "Message",
            )?;
            if !s.messages[index].read {
                let mut updated = s.messages[index].clone();
                updated.read = true;
                self.backend.save_message(&s.name, &updated)?;
                s.messages[index] = updated;
            }
            Ok(s.messages[index].clone())
        })
    }

    // === Session Operations ===

    /// Signal that no further agent iterations are needed.
    pub fn session_complete(&self, session: &str) -> Result<()> {
        self.with_session(session, |s| {
            if !s.complete {
                self.backend.set_complete(&s.name, true)?;
                s.complete = true;
                tracing::info!(session = %s.name, "session marked complete");
            }
            Ok(())
        })
    }

    pub fn is_complete(&self, session: &str) -> Result<bool> {
        self.with_session(session, |s| Ok(s.complete))
    }

    pub fn summary(&self, session: &str) -> Result<SessionSummary> {
        self.with_session(session, |s| Ok(SessionSummary::of(s)))
    }

    /// Drop all state of a session, in memory and in the backend.
    pub fn clear_session(&self, session: &str) -> Result<()> {
        let shared = self.session(session)?;
        let mut guard = shared.lock().unwrap_or_else(PoisonError::into_inner);
        self.backend.clear(session)?;
        *guard = Session::new(session);
        Ok(())
    }

    /// Names of every known session (persisted or live), sorted.
    pub fn list_sessions(&self) -> Result<Vec<String>> {
        let mut names = self.backend.list_sessions()?;
        {
            let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
            for (name, shared) in sessions.iter() {
                let live = shared.lock().unwrap_or_else(PoisonError::into_inner);
                let touched = !live.tasks.is_empty()
                    || !live.notes.is_empty()
                    || !live.messages.is_empty()
                    || live.complete;
                if touched && !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Generate an ID that `taken` reports as unused.
///
/// Format: 32 lowercase hex characters (a v4 UUID without hyphens). Callers
/// hold the session lock, so the uniqueness check cannot race.
pub fn generate_id(taken: impl Fn(&str) -> bool) -> String {
    loop {
        let id = uuid::Uuid::new_v4().simple().to_string();
        if !taken(&id) {
            return id;
        }
    }
}

/// Default root for persisted data: `~/.local/share/lookout`.
pub fn default_data_root() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|d| d.join("lookout"))
        .ok_or_else(|| Error::Other("Could not determine data directory".to_string()))
}

/// Get the data directory for a project.
///
/// Uses a hash of the canonical project path so every project gets its own
/// directory under `data_root`.
pub fn project_data_dir(data_root: &Path, project_path: &Path) -> Result<PathBuf> {
    let canonical = project_path
        .canonicalize()
        .map_err(|e| Error::Other(format!("Could not canonicalize project path: {}", e)))?;

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string_lossy().as_bytes());
    let hash_hex = format!("{:x}", hasher.finalize());

    Ok(data_root.join(&hash_hex[..12]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestEnv;
    use std::collections::HashSet;
    use std::thread;

    const S: &str = "demo";

    #[test]
    fn test_task_add_empty_content_rejected() {
        let store = SessionStore::in_memory();
        let err = store.task_add(S, "   ", None, 1).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(store.task_list(S).unwrap().total(), 0);
    }

    #[test]
    fn test_task_add_defaults_to_remaining() {
        let store = SessionStore::in_memory();
        let task = store.task_add(S, "x", None, 1).unwrap();
        assert_eq!(task.status, TaskStatus::Remaining);
        let task = store.task_add(S, "y", Some(""), 1).unwrap();
        assert_eq!(task.status, TaskStatus::Remaining);
    }

    #[test]
    fn test_task_add_invalid_status_rejected() {
        let store = SessionStore::in_memory();
        let err = store.task_add(S, "x", Some("done"), 1).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(store.task_list(S).unwrap().total(), 0);
    }

    #[test]
    fn test_task_ids_are_unique_and_long_enough() {
        let store = SessionStore::in_memory();
        let a = store.task_add(S, "a", None, 1).unwrap();
        let b = store.task_add(S, "b", None, 1).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.id.len(), 32);
        assert!(a.id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_task_status_updates_only_status_and_iteration() {
        let store = SessionStore::in_memory();
        let task = store.task_add(S, "write docs", None, 1).unwrap();

        let updated = store
            .task_status(S, &task.id[..8], "in_progress", 2)
            .unwrap();
        assert_eq!(updated.id, task.id);
        assert_eq!(updated.content, "write docs");
        assert_eq!(updated.status, TaskStatus::InProgress);
        assert_eq!(updated.iteration, 2);
        assert_eq!(updated.created_at, task.created_at);

        let buckets = store.task_list(S).unwrap();
        assert_eq!(buckets.in_progress.len(), 1);
        assert!(buckets.remaining.is_empty());
    }

    #[test]
    fn test_task_status_not_found() {
        let store = SessionStore::in_memory();
        store.task_add(S, "a", None, 1).unwrap();
        let err = store.task_status(S, "zzzzzzzz", "completed", 1).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_task_status_ambiguous_prefix() {
        let store = SessionStore::in_memory();
        // Force two tasks with a shared 8-character prefix.
        store
            .with_session(S, |s| {
                s.tasks.push(Task::new(
                    "abcdef0011111111111111111111111a".into(),
                    "one".into(),
                    TaskStatus::Remaining,
                    1,
                ));
                s.tasks.push(Task::new(
                    "abcdef0022222222222222222222222b".into(),
                    "two".into(),
                    TaskStatus::Remaining,
                    1,
                ));
                Ok(())
            })
            .unwrap();

        let err = store.task_status(S, "abcdef00", "completed", 1).unwrap_err();
        assert!(matches!(err, Error::Ambiguous { count: 2, .. }));

        let ok = store.task_status(S, "abcdef001", "completed", 1).unwrap();
        assert_eq!(ok.content, "one");
    }

    #[test]
    fn test_task_status_invalid_status_rejected() {
        let store = SessionStore::in_memory();
        let task = store.task_add(S, "a", None, 1).unwrap();
        let err = store.task_status(S, &task.id, "finished", 1).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(store.task_list(S).unwrap().remaining.len(), 1);
    }

    #[test]
    fn test_task_list_empty_session_has_four_empty_buckets() {
        let store = SessionStore::in_memory();
        let buckets = store.task_list("never-touched").unwrap();
        for status in TaskStatus::ALL {
            assert!(buckets.bucket(status).is_empty());
        }
    }

    #[test]
    fn test_note_add_and_filter() {
        let store = SessionStore::in_memory();
        store.note_add(S, "cargo is slow", "learning", 1).unwrap();
        store.note_add(S, "use sqlite", "decision", 1).unwrap();
        store.note_add(S, "tests first", "learning", 2).unwrap();

        let all = store.note_list(S, None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[1].content, "use sqlite");

        let learnings = store.note_list(S, Some("learning")).unwrap();
        let contents: Vec<_> = learnings.iter().map(|n| n.content.as_str()).collect();
        assert_eq!(contents, ["cargo is slow", "tests first"]);
    }

    #[test]
    fn test_note_add_invalid_type_rejected() {
        let store = SessionStore::in_memory();
        let err = store.note_add(S, "x", "idea", 1).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(store.note_list(S, None).unwrap().is_empty());
    }

    #[test]
    fn test_note_list_invalid_filter_rejected() {
        let store = SessionStore::in_memory();
        assert!(matches!(
            store.note_list(S, Some("bogus")),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_inbox_lists_unread_in_order() {
        let store = SessionStore::in_memory();
        let first = store.inbox_send(S, "first").unwrap();
        store.inbox_send(S, "second").unwrap();

        store.inbox_mark_read(S, &first.id[..10]).unwrap();
        let unread = store.inbox_list(S).unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].body, "second");
    }

    #[test]
    fn test_inbox_mark_read_is_idempotent() {
        let store = SessionStore::in_memory();
        let message = store.inbox_send(S, "hello").unwrap();
        assert!(store.inbox_mark_read(S, &message.id).unwrap().read);
        assert!(store.inbox_mark_read(S, &message.id).unwrap().read);
        assert!(store.inbox_list(S).unwrap().is_empty());
    }

    #[test]
    fn test_inbox_mark_read_not_found() {
        let store = SessionStore::in_memory();
        assert!(matches!(
            store.inbox_mark_read(S, "0123456789"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_session_complete_flag() {
        let store = SessionStore::in_memory();
        assert!(!store.is_complete(S).unwrap());
        store.session_complete(S).unwrap();
        store.session_complete(S).unwrap();
        assert!(store.is_complete(S).unwrap());
        assert!(store.summary(S).unwrap().complete);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let store = SessionStore::in_memory();
        store.task_add("one", "a", None, 1).unwrap();
        assert_eq!(store.task_list("two").unwrap().total(), 0);
        assert_eq!(store.task_list("one").unwrap().total(), 1);
    }

    #[test]
    fn test_empty_session_name_rejected() {
        let store = SessionStore::in_memory();
        assert!(matches!(store.task_list(""), Err(Error::Validation(_))));
    }

    #[test]
    fn test_concurrent_adds_produce_unique_ids() {
        let store = Arc::new(SessionStore::in_memory());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..25 {
                        store
                            .task_add(S, &format!("task {}-{}", worker, i), None, 1)
                            .unwrap();
                        store
                            .note_add(S, &format!("note {}-{}", worker, i), "tip", 1)
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let tasks = store.task_list(S).unwrap();
        assert_eq!(tasks.total(), 200);
        let ids: HashSet<_> = tasks.remaining.iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids.len(), 200);
        assert_eq!(store.note_list(S, None).unwrap().len(), 200);
    }

    #[test]
    fn test_add_then_list_is_visible() {
        let store = SessionStore::in_memory();
        let task = store.task_add(S, "visible", None, 1).unwrap();
        assert_eq!(store.task_list(S).unwrap().remaining[0].id, task.id);
    }

    #[test]
    fn test_sqlite_store_survives_reopen() {
        let env = TestEnv::new();
        let task_id = {
            let store = env.open_store();
            let task = store.task_add(S, "persist me", None, 3).unwrap();
            store.task_status(S, &task.id, "blocked", 4).unwrap();
            store.note_add(S, "remember", "tip", 3).unwrap();
            store.inbox_send(S, "hi agent").unwrap();
            store.session_complete(S).unwrap();
            task.id
        };

        let store = env.open_store();
        let buckets = store.task_list(S).unwrap();
        assert_eq!(buckets.blocked.len(), 1);
        assert_eq!(buckets.blocked[0].id, task_id);
        assert_eq!(buckets.blocked[0].iteration, 4);
        assert_eq!(store.note_list(S, Some("tip")).unwrap().len(), 1);
        assert_eq!(store.inbox_list(S).unwrap()[0].body, "hi agent");
        assert!(store.is_complete(S).unwrap());
        assert_eq!(store.list_sessions().unwrap(), vec![S.to_string()]);
    }

    #[test]
    fn test_sqlite_store_sees_writes_from_another_store() {
        let env = TestEnv::new();
        let serving = env.open_store();
        assert!(serving.inbox_list(S).unwrap().is_empty());
        assert_eq!(serving.task_list(S).unwrap().total(), 0);

        let cli = env.open_store();
        let message = cli.inbox_send(S, "please add tests").unwrap();
        cli.task_add(S, "from the cli", None, 1).unwrap();

        let unread = serving.inbox_list(S).unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].body, "please add tests");
        assert_eq!(serving.task_list(S).unwrap().remaining[0].content, "from the cli");

        serving.inbox_mark_read(S, &message.id).unwrap();
        assert!(cli.inbox_list(S).unwrap().is_empty());
    }

    #[test]
    fn test_clear_session_removes_persisted_state() {
        let env = TestEnv::new();
        let store = env.open_store();
        store.task_add(S, "gone soon", None, 1).unwrap();
        store.clear_session(S).unwrap();
        assert_eq!(store.task_list(S).unwrap().total(), 0);

        let reopened = env.open_store();
        assert_eq!(reopened.task_list(S).unwrap().total(), 0);
        assert!(reopened.list_sessions().unwrap().is_empty());
    }

    #[test]
    fn test_list_sessions_includes_live_memory_sessions() {
        let store = SessionStore::in_memory();
        store.task_list("untouched").unwrap();
        store.inbox_send("b", "x").unwrap();
        store.task_add("a", "x", None, 1).unwrap();
        assert_eq!(store.list_sessions().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_project_data_dir_is_stable() {
        let project = tempfile::TempDir::new().unwrap();
        let root = Path::new("/tmp/lookout-root");
        let a = project_data_dir(root, project.path()).unwrap();
        let b = project_data_dir(root, project.path()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.parent(), Some(root));
        assert_eq!(a.file_name().unwrap().len(), 12);
    }
}
