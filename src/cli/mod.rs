//! CLI argument definitions for Lookout.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Lookout - a session bridge between a coding agent and a human.
///
/// Run `lookout serve` and point the agent's MCP client at the printed URL.
#[derive(Parser, Debug)]
#[command(name = "lookout")]
#[command(author, version, about = "Bridge a coding agent's session to a human", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Run as if lookout was started in <path> instead of the current directory.
    /// Can also be set via LOOKOUT_PROJECT environment variable.
    #[arg(short = 'C', long = "project", global = true, env = "LOOKOUT_PROJECT")]
    pub project_path: Option<PathBuf>,

    /// Session to operate on
    #[arg(
        short = 's',
        long = "session",
        global = true,
        env = "LOOKOUT_SESSION",
        default_value = "default"
    )]
    pub session: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the interaction server for a session
    ///
    /// Prints the MCP endpoint URL, then presents questions and approvals from
    /// the agent until interrupted.
    Serve {
        /// Log-only mode: do not take over the terminal
        #[arg(long)]
        no_tui: bool,

        /// Keep session state in SQLite (overrides the `persist` setting).
        /// Only then do `lookout inbox send` and other CLI writes reach the
        /// running session; otherwise message the agent from the TUI with `m`.
        #[arg(long)]
        persist: bool,

        /// Give up on unanswered interactions after this many seconds (0 = never)
        #[arg(long)]
        response_timeout: Option<u64>,
    },

    /// Task commands
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Note commands
    Note {
        #[command(subcommand)]
        command: NoteCommands,
    },

    /// Messages from the human to the agent
    Inbox {
        #[command(subcommand)]
        command: InboxCommands,
    },

    /// Session lifecycle commands
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// MCP tool catalog
    Mcp {
        #[command(subcommand)]
        command: McpCommands,
    },
}

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Add a task
    Add {
        content: String,

        /// remaining, in_progress, completed or blocked
        #[arg(long)]
        status: Option<String>,

        #[arg(short, long, default_value_t = 0)]
        iteration: u32,
    },

    /// Change a task's status (id may be a prefix of at least 8 characters)
    Status {
        id: String,
        status: String,

        #[arg(short, long, default_value_t = 0)]
        iteration: u32,
    },

    /// List tasks grouped by status
    List,
}

/// Note subcommands
#[derive(Subcommand, Debug)]
pub enum NoteCommands {
    /// Record a note
    Add {
        content: String,

        /// learning, stuck, tip or decision
        #[arg(short = 't', long = "type")]
        note_type: String,

        #[arg(short, long, default_value_t = 0)]
        iteration: u32,
    },

    /// List notes, optionally of one type
    List {
        #[arg(short = 't', long = "type")]
        note_type: Option<String>,
    },
}

/// Inbox subcommands
#[derive(Subcommand, Debug)]
pub enum InboxCommands {
    /// Leave a message for the agent
    Send { body: String },

    /// List unread messages
    List,

    /// Mark a message as read
    MarkRead { id: String },
}

/// Session subcommands
#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// Mark the session complete
    Complete,

    /// Task counts, unread messages and completion flag
    Status,

    /// Delete all state of the session
    Clear,

    /// List known sessions
    List,
}

/// MCP subcommands
#[derive(Subcommand, Debug)]
pub enum McpCommands {
    /// Output tool definitions with input schemas
    Manifest,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["lookout", "task", "list", "-H", "--session", "s1"]).unwrap();
        assert!(cli.human_readable);
        assert_eq!(cli.session, "s1");
        assert!(matches!(
            cli.command,
            Commands::Task {
                command: TaskCommands::List
            }
        ));
    }

    #[test]
    fn test_note_type_flag() {
        let cli =
            Cli::try_parse_from(["lookout", "note", "add", "x", "--type", "tip", "-i", "3"]).unwrap();
        match cli.command {
            Commands::Note {
                command:
                    NoteCommands::Add {
                        note_type,
                        iteration,
                        ..
                    },
            } => {
                assert_eq!(note_type, "tip");
                assert_eq!(iteration, 3);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
