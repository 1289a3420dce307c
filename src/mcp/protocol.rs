//! JSON-RPC 2.0 message types for the interaction endpoint.
//!
//! The agent POSTs one JSON-RPC request per HTTP request to `/mcp`. Requests
//! carrying an `id` get a [`JsonRpcResponse`]; notifications (no `id`) are
//! acknowledged with `202 Accepted` and no body.
//!
//! # Examples
//!
//! ```json
//! {"jsonrpc": "2.0", "id": 1, "method": "tools/list"}
//! {"jsonrpc": "2.0", "id": 2, "method": "tools/call",
//!  "params": {"name": "task_add", "arguments": {"content": "x", "iteration": 1}}}
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};

use crate::Error;

/// MCP protocol revision reported when the client does not ask for one.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;

/// An inbound JSON-RPC request or notification.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    /// `None` only when the member is absent; `"id": null` is `Some(Null)`.
    #[serde(default, deserialize_with = "present")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

/// Parameters of a `tools/call` request.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// Wrap a successful tool payload in the MCP result envelope.
pub fn tool_success(payload: &Value) -> Value {
    json!({
        "content": [{ "type": "text", "text": payload.to_string() }],
        "isError": false,
    })
}

/// Wrap a failed tool call; the text carries the error kind and message.
pub fn tool_failure(err: &Error) -> Value {
    let body = json!({ "error": err.to_string(), "kind": err.kind() });
    json!({
        "content": [{ "type": "text", "text": body.to_string() }],
        "isError": true,
    })
}

/// Extract and parse the JSON text payload of a tool result envelope.
pub fn tool_payload(result: &Value) -> Option<Value> {
    let text = result.get("content")?.get(0)?.get("text")?.as_str()?;
    serde_json::from_str(text).ok()
}
