//! Local HTTP endpoint that exposes the tool catalog to one agent session.

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::interaction::{
    InteractionKind, InteractionPayload, InteractionResult, Interactions, PendingInteraction,
};
use super::protocol::{
    INVALID_PARAMS, INVALID_REQUEST, JsonRpcRequest, JsonRpcResponse, METHOD_NOT_FOUND,
    PARSE_ERROR, PROTOCOL_VERSION, ToolCallParams, tool_failure, tool_success,
};
use super::tools::{self, ASK_QUESTIONS, FINISH_SPEC};
use crate::bridge::ToolBridge;
use crate::models::Question;
use crate::storage::SessionStore;
use crate::{Error, Result};

/// Route the agent POSTs JSON-RPC to.
pub const MCP_PATH: &str = "/mcp";

/// How long `stop()` waits for open connections to drain.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Listening,
}

/// Activity notifications for the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    ToolCalled { tool: String, ok: bool },
    SessionCompleted { session: String },
}

struct Lifecycle {
    state: ServerState,
    port: Option<u16>,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl Lifecycle {
    /// A listener whose token was cancelled from outside (parent shutdown)
    /// counts as stopped. Its task is kept so `stop()` can still wait for the
    /// in-flight handlers to drain.
    fn refresh(&mut self) {
        let cancelled = self.cancel.as_ref().is_some_and(|t| t.is_cancelled());
        if self.state == ServerState::Listening && cancelled {
            self.state = ServerState::Stopped;
            self.port = None;
            self.cancel = None;
        }
    }
}

/// Puts a server left in `Starting` back to `Stopped` if `start()` is
/// abandoned or fails before it is listening.
struct StartingGuard<'a> {
    lifecycle: &'a Mutex<Lifecycle>,
    armed: bool,
}

impl StartingGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for StartingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut life = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
            if life.state == ServerState::Starting {
                life.state = ServerState::Stopped;
            }
        }
    }
}

/// Wait for a server task to finish, aborting it after the grace period.
async fn drain(task: JoinHandle<()>) {
    let abort = task.abort_handle();
    match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
        Ok(Err(e)) => tracing::warn!(error = %e, "interaction server task ended abnormally"),
        Err(_) => {
            tracing::warn!("connections did not drain in time; aborting");
            abort.abort();
        }
        Ok(Ok(())) => {}
    }
}

/// State shared with every request handler of one listening instance.
#[derive(Clone)]
struct AppState {
    bridge: ToolBridge,
    interactions: Interactions,
    events: broadcast::Sender<ServerEvent>,
    cancel: CancellationToken,
}

/// Serves the store-backed and synchronous tools of one session.
pub struct InteractionServer {
    bridge: ToolBridge,
    interactions: Interactions,
    events: broadcast::Sender<ServerEvent>,
    lifecycle: Mutex<Lifecycle>,
}

impl InteractionServer {
    /// Create a stopped server. The returned receiver yields every synchronous
    /// request; hand it to the component that answers them.
    pub fn new(
        store: Arc<SessionStore>,
        session: impl Into<String>,
        response_timeout: Option<Duration>,
    ) -> (Self, mpsc::UnboundedReceiver<PendingInteraction>) {
        let (interactions, requests) = Interactions::new(response_timeout);
        let (events, _) = broadcast::channel(100);
        let server = Self {
            bridge: ToolBridge::new(store, session),
            interactions,
            events,
            lifecycle: Mutex::new(Lifecycle {
                state: ServerState::Stopped,
                port: None,
                cancel: None,
                task: None,
            }),
        };
        (server, requests)
    }

    pub fn session(&self) -> &str {
        self.bridge.session()
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        let mut life = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        life.refresh();
        life
    }

    pub fn state(&self) -> ServerState {
        self.lifecycle().state
    }

    /// Bind an ephemeral loopback port and start serving. Cancelling `parent`
    /// stops the server the same way `stop()` does.
    pub async fn start(&self, parent: &CancellationToken) -> Result<u16> {
        let previous = {
            let mut life = self.lifecycle();
            if life.state != ServerState::Stopped {
                return Err(Error::AlreadyStarted);
            }
            life.state = ServerState::Starting;
            life.task.take()
        };
        let guard = StartingGuard {
            lifecycle: &self.lifecycle,
            armed: true,
        };

        // An instance stopped through its parent token may still be draining.
        if let Some(task) = previous {
            drain(task).await;
        }

        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let port = listener.local_addr()?.port();

        let token = parent.child_token();
        let app = Router::new()
            .route(MCP_PATH, post(handle_rpc))
            .with_state(AppState {
                bridge: self.bridge.clone(),
                interactions: self.interactions.clone(),
                events: self.events.clone(),
                cancel: token.clone(),
            });

        let shutdown = token.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
            {
                tracing::error!(error = %e, "interaction server failed");
            }
        });

        let mut life = self.lifecycle();
        life.state = ServerState::Listening;
        life.port = Some(port);
        life.cancel = Some(token);
        life.task = Some(task);
        drop(life);
        guard.disarm();
        tracing::info!(session = self.session(), port, "interaction server listening");
        Ok(port)
    }

    /// Endpoint the agent should be pointed at.
    pub fn url(&self) -> Result<String> {
        let life = self.lifecycle();
        match (life.state, life.port) {
            (ServerState::Listening, Some(port)) => {
                Ok(format!("http://localhost:{}{}", port, MCP_PATH))
            }
            _ => Err(Error::NotStarted),
        }
    }

    /// Stop listening and cancel every blocked synchronous call. Returns once
    /// the blocked calls have been answered, including after the parent token
    /// was cancelled.
    pub async fn stop(&self) -> Result<()> {
        let (token, task) = {
            let mut life = self.lifecycle();
            if life.state == ServerState::Listening {
                life.state = ServerState::Stopped;
                life.port = None;
                (life.cancel.take(), life.task.take())
            } else if life.state == ServerState::Stopped {
                (None, life.task.take())
            } else {
                return Ok(());
            }
        };

        let Some(task) = task else {
            return Ok(());
        };
        if let Some(token) = token {
            token.cancel();
        }
        drain(task).await;
        tracing::info!(session = self.session(), "interaction server stopped");
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    /// The synchronous call currently blocked for this session, if any.
    pub fn pending_interaction(&self) -> Option<(Uuid, InteractionKind)> {
        self.interactions.pending(self.session())
    }
}

async fn handle_rpc(State(state): State<AppState>, body: Bytes) -> Response {
    let parsed = match serde_json::from_slice::<Value>(&body) {
        Ok(value) => value,
        Err(e) => {
            let failure =
                JsonRpcResponse::failure(Value::Null, PARSE_ERROR, format!("Parse error: {}", e));
            return Json(failure).into_response();
        }
    };
    match dispatch(&state, parsed).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Answer one JSON-RPC message. Notifications yield `None`.
async fn dispatch(state: &AppState, message: Value) -> Option<JsonRpcResponse> {
    let fallback_id = message.get("id").cloned().unwrap_or(Value::Null);
    let request: JsonRpcRequest = match serde_json::from_value(message) {
        Ok(request) => request,
        Err(e) => {
            return Some(JsonRpcResponse::failure(
                fallback_id,
                INVALID_REQUEST,
                format!("Invalid request: {}", e),
            ));
        }
    };
    if request.jsonrpc != "2.0" {
        return Some(JsonRpcResponse::failure(
            fallback_id,
            INVALID_REQUEST,
            "jsonrpc must be \"2.0\"",
        ));
    }
    if request.is_notification() {
        tracing::debug!(method = %request.method, "notification");
        return None;
    }

    let id = request.id.unwrap_or(Value::Null);
    let response = match request.method.as_str() {
        "initialize" => JsonRpcResponse::success(id, initialize_result(request.params.as_ref())),
        "ping" => JsonRpcResponse::success(id, json!({})),
        "tools/list" => JsonRpcResponse::success(id, tools::manifest()),
        "tools/call" => {
            let params = request
                .params
                .map(serde_json::from_value::<ToolCallParams>)
                .transpose();
            match params {
                Ok(Some(params)) => match call_tool(state, params).await {
                    Ok(result) => JsonRpcResponse::success(id, result),
                    Err(message) => JsonRpcResponse::failure(id, INVALID_PARAMS, message),
                },
                Ok(None) => JsonRpcResponse::failure(id, INVALID_PARAMS, "missing params"),
                Err(e) => JsonRpcResponse::failure(id, INVALID_PARAMS, e.to_string()),
            }
        }
        other => JsonRpcResponse::failure(
            id,
            METHOD_NOT_FOUND,
            format!("Method not found: {}", other),
        ),
    };
    Some(response)
}

fn initialize_result(params: Option<&Value>) -> Value {
    let version = params
        .and_then(|p| p.get("protocolVersion"))
        .and_then(Value::as_str)
        .unwrap_or(PROTOCOL_VERSION);
    json!({
        "protocolVersion": version,
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": { "name": "lookout", "version": env!("CARGO_PKG_VERSION") },
    })
}

enum ToolReply {
    Done(Value),
    Failed(Error),
    /// The human turned the submission down; carries their feedback.
    Rejected(Value),
}

/// Run a tool and wrap the outcome in the MCP result envelope. Unknown tools
/// are a protocol error rather than a tool error.
async fn call_tool(state: &AppState, params: ToolCallParams) -> std::result::Result<Value, String> {
    let ToolCallParams { name, arguments } = params;
    if tools::find_tool(&name).is_none() {
        return Err(format!("Unknown tool: {}", name));
    }
    let session = state.bridge.session().to_string();
    tracing::debug!(session = %session, tool = %name, "tool call");

    let reply = if ToolBridge::handles(&name) {
        call_store_tool(state.bridge.clone(), name.clone(), arguments).await
    } else if name == ASK_QUESTIONS {
        ask_questions(state, &arguments).await
    } else if name == FINISH_SPEC {
        finish_spec(state, &arguments).await
    } else {
        ToolReply::Failed(Error::NotFound(format!("Unknown tool: {}", name)))
    };

    let ok = matches!(reply, ToolReply::Done(_));
    let _ = state.events.send(ServerEvent::ToolCalled {
        tool: name.clone(),
        ok,
    });
    if ok && name == "session_complete" {
        let _ = state.events.send(ServerEvent::SessionCompleted { session });
    }

    Ok(match reply {
        ToolReply::Done(payload) => tool_success(&payload),
        ToolReply::Failed(err) => {
            tracing::debug!(tool = %name, error = %err, "tool call failed");
            tool_failure(&err)
        }
        ToolReply::Rejected(payload) => json!({
            "content": [{ "type": "text", "text": payload.to_string() }],
            "isError": true,
        }),
    })
}

/// Store calls touch SQLite, so they run off the async workers.
async fn call_store_tool(bridge: ToolBridge, tool: String, args: Map<String, Value>) -> ToolReply {
    let joined = tokio::task::spawn_blocking(move || bridge.call(&tool, &args)).await;
    match joined {
        Ok(Ok(payload)) => ToolReply::Done(payload),
        Ok(Err(err)) => ToolReply::Failed(err),
        Err(e) => ToolReply::Failed(Error::Other(format!("tool call panicked: {}", e))),
    }
}

fn parse_questions(args: &Map<String, Value>) -> Result<Vec<Question>> {
    let raw = match args.get("questions") {
        None | Some(Value::Null) => return Err(Error::MissingParameter("questions".to_string())),
        Some(raw) => raw.clone(),
    };
    let questions: Vec<Question> = serde_json::from_value(raw)
        .map_err(|e| Error::Validation(format!("malformed questions: {}", e)))?;
    if questions.is_empty() {
        return Err(Error::Validation(
            "at least one question is required".to_string(),
        ));
    }
    for question in &questions {
        if question.question.trim().is_empty() {
            return Err(Error::Validation("question text cannot be empty".to_string()));
        }
        if question.multi_select && question.options.is_empty() {
            return Err(Error::Validation(format!(
                "multi-select question \"{}\" has no options",
                question.question
            )));
        }
    }
    Ok(questions)
}

async fn ask_questions(state: &AppState, args: &Map<String, Value>) -> ToolReply {
    let questions = match parse_questions(args) {
        Ok(questions) => questions,
        Err(err) => return ToolReply::Failed(err),
    };
    let expected = questions.len();
    let outcome = state
        .interactions
        .request(
            state.bridge.session(),
            InteractionPayload::Questions(questions),
            &state.cancel,
        )
        .await;
    match outcome {
        Ok(InteractionResult::Answers(answers)) if answers.len() == expected => {
            ToolReply::Done(json!({ "answers": answers }))
        }
        Ok(other) => ToolReply::Failed(Error::Cancelled(format!(
            "unexpected reply to questions: {:?}",
            other
        ))),
        Err(err) => ToolReply::Failed(err),
    }
}

async fn finish_spec(state: &AppState, args: &Map<String, Value>) -> ToolReply {
    let content = match args.get("content").and_then(Value::as_str) {
        Some(content) => content.to_string(),
        None => return ToolReply::Failed(Error::MissingParameter("content".to_string())),
    };
    let outcome = state
        .interactions
        .request(
            state.bridge.session(),
            InteractionPayload::Approval { content },
            &state.cancel,
        )
        .await;
    match outcome {
        Ok(InteractionResult::Approved) => ToolReply::Done(json!({ "status": "approved" })),
        Ok(InteractionResult::Rejected { feedback }) => {
            ToolReply::Rejected(json!({ "status": "rejected", "feedback": feedback }))
        }
        Ok(other) => ToolReply::Failed(Error::Cancelled(format!(
            "unexpected reply to approval: {:?}",
            other
        ))),
        Err(err) => ToolReply::Failed(err),
    }
}
