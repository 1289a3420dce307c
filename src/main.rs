//! Lookout CLI - a session bridge between a coding agent and a human.

use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use lookout::cli::{
    Cli, Commands, InboxCommands, McpCommands, NoteCommands, SessionCommands, TaskCommands,
};
use lookout::commands::{self, Output};
use lookout::config::{ConfigOverrides, OutputFormat, Settings, resolve_settings};
use lookout::logging::{self, LogTarget};
use lookout::mcp::InteractionServer;
use lookout::phase::{self, PhaseController};
use lookout::storage::SessionStore;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn main() {
    let cli = Cli::parse();
    let human_flag = cli.human_readable;

    let result = run(cli);

    if let Err(e) = result {
        // Config may have failed to resolve, so only the flag is trusted here.
        if human_flag {
            eprintln!("Error: {}", e);
        } else {
            eprintln!(
                "{}",
                serde_json::json!({ "error": e.to_string(), "kind": e.kind() })
            );
        }
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), lookout::Error> {
    let project_path = resolve_project_path(cli.project_path)?;

    let mut overrides = ConfigOverrides::new();
    if cli.human_readable {
        overrides = overrides.with_output_format(OutputFormat::Human);
    }
    let serving = matches!(cli.command, Commands::Serve { .. });
    let mut tui_mode = false;
    if let Commands::Serve {
        no_tui,
        persist,
        response_timeout,
    } = &cli.command
    {
        if *persist {
            overrides = overrides.with_persist(true);
        }
        if let Some(secs) = response_timeout {
            overrides = overrides.with_response_timeout(*secs);
        }
        tui_mode = cfg!(feature = "tui") && !no_tui;
    }

    let settings = resolve_settings(&project_path, &overrides)?;

    let target = if tui_mode {
        LogTarget::File(settings.project_dir.join("logs"))
    } else {
        LogTarget::Stderr
    };
    let _log_guard = logging::init(&settings.log_level.value, target)?;

    if serving {
        return run_serve(&settings, &cli.session, tui_mode);
    }

    let human = settings.human();
    let session = cli.session.as_str();
    match cli.command {
        Commands::Serve { .. } => Ok(()),
        Commands::Task { command } => {
            let store = commands::open_store(&settings)?;
            match command {
                TaskCommands::Add {
                    content,
                    status,
                    iteration,
                } => {
                    let result =
                        commands::task_add(&store, session, &content, status.as_deref(), iteration)?;
                    output(&result, human);
                }
                TaskCommands::Status {
                    id,
                    status,
                    iteration,
                } => {
                    let result = commands::task_status(&store, session, &id, &status, iteration)?;
                    output(&result, human);
                }
                TaskCommands::List => {
                    let result = commands::task_list(&store, session)?;
                    output(&result, human);
                }
            }
            Ok(())
        }
        Commands::Note { command } => {
            let store = commands::open_store(&settings)?;
            match command {
                NoteCommands::Add {
                    content,
                    note_type,
                    iteration,
                } => {
                    let result =
                        commands::note_add(&store, session, &content, &note_type, iteration)?;
                    output(&result, human);
                }
                NoteCommands::List { note_type } => {
                    let result = commands::note_list(&store, session, note_type.as_deref())?;
                    output(&result, human);
                }
            }
            Ok(())
        }
        Commands::Inbox { command } => {
            let store = commands::open_store(&settings)?;
            match command {
                InboxCommands::Send { body } => {
                    let result = commands::inbox_send(&store, session, &body)?;
                    output(&result, human);
                }
                InboxCommands::List => {
                    let result = commands::inbox_list(&store, session)?;
                    output(&result, human);
                }
                InboxCommands::MarkRead { id } => {
                    let result = commands::inbox_mark_read(&store, session, &id)?;
                    output(&result, human);
                }
            }
            Ok(())
        }
        Commands::Session { command } => {
            let store = commands::open_store(&settings)?;
            match command {
                SessionCommands::Complete => {
                    let result = commands::session_complete(&store, session)?;
                    output(&result, human);
                }
                SessionCommands::Status => {
                    let result = commands::session_status(&store, session)?;
                    output(&result, human);
                }
                SessionCommands::Clear => {
                    let result = commands::session_clear(&store, session)?;
                    output(&result, human);
                }
                SessionCommands::List => {
                    let result = commands::session_list(&store)?;
                    output(&result, human);
                }
            }
            Ok(())
        }
        Commands::Mcp { command } => {
            match command {
                McpCommands::Manifest => output(&commands::mcp_manifest(), human),
            }
            Ok(())
        }
    }
}

/// Resolve the project path: -C/--project (or LOOKOUT_PROJECT) > current directory.
fn resolve_project_path(explicit_path: Option<PathBuf>) -> Result<PathBuf, lookout::Error> {
    match explicit_path {
        Some(path) => {
            if !path.exists() {
                return Err(lookout::Error::NotFound(format!(
                    "project path does not exist: {}",
                    path.display()
                )));
            }
            Ok(path)
        }
        None => Ok(env::current_dir().unwrap_or_else(|_| PathBuf::from("."))),
    }
}

/// Print output in JSON or human-readable format.
fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}

/// Start the interaction server and answer requests until Ctrl+C (or the
/// human quits the TUI).
fn run_serve(settings: &Settings, session: &str, tui_mode: bool) -> Result<(), lookout::Error> {
    let store = commands::open_serve_store(settings)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| lookout::Error::Other(format!("Failed to create runtime: {}", e)))?
        .block_on(serve(store, settings, session, tui_mode))
}

async fn serve(
    store: Arc<SessionStore>,
    settings: &Settings,
    session: &str,
    tui_mode: bool,
) -> Result<(), lookout::Error> {
    let (server, requests) =
        InteractionServer::new(Arc::clone(&store), session, settings.response_timeout());

    let shutdown = CancellationToken::new();
    let port = server.start(&shutdown).await?;
    let url = server.url()?;
    tracing::info!(session, port, backend = %store.backend_type(), "serving session");

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, shutting down");
                shutdown.cancel();
            }
        });
    }

    let result = if tui_mode {
        run_tui_frontend(&server, store, session, &url, requests, shutdown.clone()).await
    } else {
        output(
            &commands::ServeStarted {
                session: session.to_string(),
                port,
                url,
            },
            settings.human(),
        );
        // Log-only: synchronous calls wait for the response timeout or Ctrl+C.
        let (_, inputs) = mpsc::unbounded_channel();
        phase::drive(PhaseController::new(), requests, inputs, shutdown.clone()).await;
        Ok(())
    };

    server.stop().await?;
    shutdown.cancel();
    result
}

#[cfg(feature = "tui")]
async fn run_tui_frontend(
    server: &InteractionServer,
    store: Arc<SessionStore>,
    session: &str,
    url: &str,
    requests: mpsc::UnboundedReceiver<lookout::mcp::PendingInteraction>,
    shutdown: CancellationToken,
) -> Result<(), lookout::Error> {
    lookout::tui::run_tui(store, session, url, requests, server.subscribe(), shutdown).await
}

#[cfg(not(feature = "tui"))]
async fn run_tui_frontend(
    _server: &InteractionServer,
    _store: Arc<SessionStore>,
    _session: &str,
    _url: &str,
    _requests: mpsc::UnboundedReceiver<lookout::mcp::PendingInteraction>,
    _shutdown: CancellationToken,
) -> Result<(), lookout::Error> {
    Err(lookout::Error::Other(
        "lookout was built without the tui feature; use --no-tui".into(),
    ))
}
