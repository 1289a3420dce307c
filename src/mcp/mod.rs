//! MCP (Model Context Protocol) endpoint for a running agent.
//!
//! This module provides:
//! - `protocol` - JSON-RPC message types and the tool result envelope
//! - `tools` - the fixed tool catalog with input schemas
//! - `interaction` - rendezvous between blocked tool calls and the human
//! - `server` - the HTTP listener serving `/mcp` for one session
//!
//! Store-backed tools answer immediately through the [`ToolBridge`](crate::bridge::ToolBridge).
//! `ask_questions` and `finish_spec` block until the human responds or the
//! server stops.

pub mod interaction;
pub mod protocol;
pub mod server;
pub mod tools;

pub use interaction::{
    InteractionKind, InteractionPayload, InteractionResult, InteractionTicket, Interactions,
    PendingInteraction, Responder,
};
pub use server::{InteractionServer, MCP_PATH, ServerEvent, ServerState};
