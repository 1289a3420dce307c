//! The fixed tool catalog exposed to the agent.

use serde_json::{Value, json};

/// Tool definition for the MCP manifest.
pub struct ToolDef {
    pub name: &'static str,
    pub description: &'static str,
    /// Blocks until a human responds
    pub synchronous: bool,
    schema: fn() -> Value,
}

impl ToolDef {
    /// JSON Schema of the tool's arguments.
    pub fn input_schema(&self) -> Value {
        (self.schema)()
    }

    /// The `tools/list` entry for this tool.
    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema(),
        })
    }
}

pub const ASK_QUESTIONS: &str = "ask_questions";
pub const FINISH_SPEC: &str = "finish_spec";

fn iteration_schema() -> Value {
    json!({ "type": "integer", "minimum": 0, "description": "Current agent iteration" })
}

fn no_arguments() -> Value {
    json!({ "type": "object", "properties": {} })
}

/// Get all available tools.
pub fn get_tools() -> Vec<ToolDef> {
    vec![
        ToolDef {
            name: "task_add",
            description: "Add a task to the session. Status defaults to remaining.",
            synchronous: false,
            schema: || {
                json!({
                    "type": "object",
                    "properties": {
                        "content": { "type": "string" },
                        "status": {
                            "type": "string",
                            "enum": ["remaining", "in_progress", "completed", "blocked"]
                        },
                        "iteration": iteration_schema(),
                    },
                    "required": ["content", "iteration"]
                })
            },
        },
        ToolDef {
            name: "task_status",
            description: "Change a task's status. The id may be a prefix of at least 8 characters.",
            synchronous: false,
            schema: || {
                json!({
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "minLength": 8 },
                        "status": {
                            "type": "string",
                            "enum": ["remaining", "in_progress", "completed", "blocked"]
                        },
                        "iteration": iteration_schema(),
                    },
                    "required": ["id", "status", "iteration"]
                })
            },
        },
        ToolDef {
            name: "task_list",
            description: "List tasks grouped by status",
            synchronous: false,
            schema: no_arguments,
        },
        ToolDef {
            name: "note_add",
            description: "Record a learning, stuck point, tip, or decision",
            synchronous: false,
            schema: || {
                json!({
                    "type": "object",
                    "properties": {
                        "content": { "type": "string" },
                        "type": {
                            "type": "string",
                            "enum": ["learning", "stuck", "tip", "decision"]
                        },
                        "iteration": iteration_schema(),
                    },
                    "required": ["content", "type", "iteration"]
                })
            },
        },
        ToolDef {
            name: "note_list",
            description: "List notes in the order they were recorded",
            synchronous: false,
            schema: || {
                json!({
                    "type": "object",
                    "properties": {
                        "type": {
                            "type": "string",
                            "enum": ["learning", "stuck", "tip", "decision"]
                        }
                    }
                })
            },
        },
        ToolDef {
            name: "inbox_list",
            description: "List unread messages from the human",
            synchronous: false,
            schema: no_arguments,
        },
        ToolDef {
            name: "inbox_mark_read",
            description: "Mark an inbox message as read",
            synchronous: false,
            schema: || {
                json!({
                    "type": "object",
                    "properties": { "id": { "type": "string", "minLength": 8 } },
                    "required": ["id"]
                })
            },
        },
        ToolDef {
            name: "session_complete",
            description: "Signal that the work is done and no further iterations are needed",
            synchronous: false,
            schema: no_arguments,
        },
        ToolDef {
            name: ASK_QUESTIONS,
            description: "Ask the human one or more structured questions and wait for the answers",
            synchronous: true,
            schema: || {
                json!({
                    "type": "object",
                    "properties": {
                        "questions": {
                            "type": "array",
                            "minItems": 1,
                            "items": {
                                "type": "object",
                                "properties": {
                                    "question": { "type": "string" },
                                    "header": { "type": "string" },
                                    "options": {
                                        "type": "array",
                                        "items": {
                                            "anyOf": [
                                                { "type": "string" },
                                                {
                                                    "type": "object",
                                                    "properties": {
                                                        "label": { "type": "string" },
                                                        "description": { "type": "string" }
                                                    },
                                                    "required": ["label"]
                                                }
                                            ]
                                        }
                                    },
                                    "multi_select": { "type": "boolean" },
                                    "required": { "type": "boolean" }
                                },
                                "required": ["question"]
                            }
                        }
                    },
                    "required": ["questions"]
                })
            },
        },
        ToolDef {
            name: FINISH_SPEC,
            description: "Submit the final generated content for human approval and wait for the decision",
            synchronous: true,
            schema: || {
                json!({
                    "type": "object",
                    "properties": { "content": { "type": "string" } },
                    "required": ["content"]
                })
            },
        },
    ]
}

/// Look up a tool by name.
pub fn find_tool(name: &str) -> Option<ToolDef> {
    get_tools().into_iter().find(|t| t.name == name)
}

/// The `tools/list` result.
pub fn manifest() -> Value {
    let tools: Vec<Value> = get_tools().iter().map(ToolDef::to_json).collect();
    json!({ "tools": tools })
}
