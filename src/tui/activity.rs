//! Activity log for the TUI
//!
//! Keeps a bounded history of what the agent did (tool calls, completion)
//! and what happened locally, newest last.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::mcp::ServerEvent;

/// Maximum entries kept in memory
const MAX_ENTRIES: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl ActivityLevel {
    pub fn color(&self) -> ratatui::style::Color {
        use ratatui::style::Color;
        match self {
            ActivityLevel::Info => Color::Blue,
            ActivityLevel::Success => Color::Green,
            ActivityLevel::Warning => Color::Yellow,
            ActivityLevel::Error => Color::Red,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            ActivityLevel::Info => "ℹ",
            ActivityLevel::Success => "✓",
            ActivityLevel::Warning => "⚠",
            ActivityLevel::Error => "✗",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActivityEntry {
    pub level: ActivityLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ActivityEntry {
    /// Format relative time since the entry was recorded
    pub fn relative_time(&self) -> String {
        let duration = Utc::now().signed_duration_since(self.timestamp);

        if duration.num_seconds() < 60 {
            "just now".to_string()
        } else if duration.num_minutes() < 60 {
            format!("{}m ago", duration.num_minutes())
        } else {
            format!("{}h ago", duration.num_hours())
        }
    }
}

#[derive(Debug, Default)]
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, level: ActivityLevel, message: impl Into<String>) {
        if self.entries.len() == MAX_ENTRIES {
            self.entries.pop_front();
        }
        self.entries.push_back(ActivityEntry {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        });
    }

    /// Record a server event.
    pub fn record(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::ToolCalled { tool, ok: true } => {
                self.push(ActivityLevel::Info, format!("agent called {}", tool))
            }
            ServerEvent::ToolCalled { tool, ok: false } => {
                self.push(ActivityLevel::Warning, format!("{} failed", tool))
            }
            ServerEvent::SessionCompleted { session } => self.push(
                ActivityLevel::Success,
                format!("agent marked session '{}' complete", session),
            ),
        }
    }

    /// The newest `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &ActivityEntry> {
        self.entries.iter().skip(self.entries.len().saturating_sub(n))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
