//! KDL schema for config.kdl.
//!
//! This module provides:
//! - The [`LookoutConfig`] struct mirroring the file
//! - Conversion to and from KDL documents
//! - Validation and layered merging

use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};

/// Output format preference for CLI commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON output (default, machine-readable)
    #[default]
    Json,
    /// Human-readable output
    Human,
}

impl OutputFormat {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "human" => Some(OutputFormat::Human),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Human => "human",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Log levels accepted by `log-level`.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Settings stored in config.kdl.
///
/// # KDL Schema
///
/// ```kdl
/// persist #true
/// data-dir "/var/lib/lookout"
/// response-timeout-secs 600  // 0 waits forever
/// log-level "debug"
/// output-format "human"      // or "json"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookoutConfig {
    /// Keep `serve` session state in SQLite instead of memory
    pub persist: Option<bool>,

    /// Root directory for per-project data
    pub data_dir: Option<String>,

    /// Give up on a blocked interaction after this many seconds (0 = never)
    pub response_timeout_secs: Option<u64>,

    pub log_level: Option<String>,

    pub output_format: Option<OutputFormat>,
}

fn first_value<'a>(doc: &'a KdlDocument, name: &str) -> Option<&'a KdlValue> {
    doc.get(name)
        .and_then(|node| node.entries().first())
        .map(|entry| entry.value())
}

fn string_node(name: &str, value: &str) -> KdlNode {
    let mut node = KdlNode::new(name);
    node.push(KdlEntry::new(KdlValue::String(value.to_string())));
    node
}

impl LookoutConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the config values.
    ///
    /// Returns an error message if any value is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(ref level) = self.log_level {
            if !LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
                return Err(format!(
                    "log-level must be one of {}, got '{}'",
                    LOG_LEVELS.join(", "),
                    level
                ));
            }
        }
        if let Some(ref dir) = self.data_dir {
            if dir.trim().is_empty() {
                return Err("data-dir cannot be empty".to_string());
            }
        }
        Ok(())
    }

    /// Parse config from a KDL document. Values of the wrong type are ignored.
    pub fn from_kdl(doc: &KdlDocument) -> Self {
        let mut config = Self::new();

        if let Some(b) = first_value(doc, "persist").and_then(KdlValue::as_bool) {
            config.persist = Some(b);
        }

        if let Some(s) = first_value(doc, "data-dir").and_then(KdlValue::as_string) {
            config.data_dir = Some(s.to_string());
        }

        if let Some(i) = first_value(doc, "response-timeout-secs").and_then(KdlValue::as_integer)
        {
            if let Ok(secs) = u64::try_from(i) {
                config.response_timeout_secs = Some(secs);
            }
        }

        if let Some(s) = first_value(doc, "log-level").and_then(KdlValue::as_string) {
            config.log_level = Some(s.to_string());
        }

        if let Some(s) = first_value(doc, "output-format").and_then(KdlValue::as_string) {
            config.output_format = OutputFormat::parse(s);
        }

        config
    }

    /// Convert config to a KDL document.
    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();

        if let Some(persist) = self.persist {
            let mut node = KdlNode::new("persist");
            node.push(KdlEntry::new(KdlValue::Bool(persist)));
            doc.nodes_mut().push(node);
        }
        if let Some(ref dir) = self.data_dir {
            doc.nodes_mut().push(string_node("data-dir", dir));
        }
        if let Some(secs) = self.response_timeout_secs {
            let mut node = KdlNode::new("response-timeout-secs");
            node.push(KdlEntry::new(KdlValue::Integer(secs as i128)));
            doc.nodes_mut().push(node);
        }
        if let Some(ref level) = self.log_level {
            doc.nodes_mut().push(string_node("log-level", level));
        }
        if let Some(format) = self.output_format {
            doc.nodes_mut().push(string_node("output-format", format.as_str()));
        }

        doc
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` if they are Some.
    pub fn merge(&mut self, other: &LookoutConfig) {
        if other.persist.is_some() {
            self.persist = other.persist;
        }
        if other.data_dir.is_some() {
            self.data_dir = other.data_dir.clone();
        }
        if other.response_timeout_secs.is_some() {
            self.response_timeout_secs = other.response_timeout_secs;
        }
        if other.log_level.is_some() {
            self.log_level = other.log_level.clone();
        }
        if other.output_format.is_some() {
            self.output_format = other.output_format;
        }
    }
}
