//! Lookout - a session bridge between a coding agent and a human.
//!
//! The agent talks to an [`mcp::InteractionServer`] over a local HTTP endpoint.
//! Most tools read or write shared session state in a [`storage::SessionStore`]
//! through the [`bridge::ToolBridge`]. Two tools (`ask_questions` and
//! `finish_spec`) suspend the agent until the human answers them through a
//! [`phase::PhaseController`].

pub mod bridge;
pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod mcp;
pub mod models;
pub mod phase;
pub mod storage;
pub mod tui;


/// Library-level error type for Lookout operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Missing or invalid parameter: {0}")]
    MissingParameter(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Ambiguous ID prefix '{prefix}' matches {count} entries")]
    Ambiguous { prefix: String, count: usize },

    #[error("Interaction server is already started")]
    AlreadyStarted,

    #[error("Interaction server is not started")]
    NotStarted,

    #[error("An interaction is already pending for session '{0}'")]
    SingleFlightViolation(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Stable, machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Database(_) => "database",
            Error::Config(_) => "config",
            Error::Validation(_) => "validation",
            Error::MissingParameter(_) => "missing_parameter",
            Error::NotFound(_) => "not_found",
            Error::Ambiguous { .. } => "ambiguous",
            Error::AlreadyStarted => "already_started",
            Error::NotStarted => "not_started",
            Error::SingleFlightViolation(_) => "single_flight_violation",
            Error::Cancelled(_) => "cancelled",
            Error::Other(_) => "other",
        }
    }
}

/// Result type alias for Lookout operations.
pub type Result<T> = std::result::Result<T, Error>;
