//! Input parsing for agent hook events
//!
//! Parses the JSON object the host agent writes to the hook's stdin.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{ProtectorError, Result};

/// Lifecycle event that triggered the hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookEventName {
    PreToolUse,
    PostToolUse,
    Stop,
    #[serde(rename = "SubagentStop", alias = "SubAgentStop")]
    SubAgentStop,
}

impl HookEventName {
    /// Wire name of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            HookEventName::PreToolUse => "PreToolUse",
            HookEventName::PostToolUse => "PostToolUse",
            HookEventName::Stop => "Stop",
            HookEventName::SubAgentStop => "SubagentStop",
        }
    }
}

impl fmt::Display for HookEventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_permission_mode() -> String {
    "default".to_string()
}

/// Main input structure for hook events
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HookInput {
    #[serde(default, deserialize_with = "text_or_empty")]
    pub session_id: String,

    #[serde(default, deserialize_with = "text_or_empty")]
    pub transcript_path: String,

    #[serde(default, deserialize_with = "text_or_empty")]
    pub cwd: String,

    #[serde(default = "default_permission_mode", deserialize_with = "permission_mode")]
    pub permission_mode: String,

    /// Required; an unknown value fails the parse
    pub hook_event_name: HookEventName,

    /// Name of the tool (e.g., "Bash", "Read", "WebFetch")
    #[serde(default)]
    pub tool_name: Option<String>,

    /// Tool arguments, present for tool events
    #[serde(default)]
    pub tool_input: Option<Map<String, Value>>,

    #[serde(default)]
    pub tool_use_id: Option<String>,

    /// Tool result text, PostToolUse only
    #[serde(default, alias = "tool_response", deserialize_with = "result_text")]
    pub tool_result: Option<String>,
}

/// A string field where `null` reads as empty
fn text_or_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn permission_mode<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_permission_mode))
}

/// Accept a result as a string, or keep any other JSON value as compact text
fn result_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}

impl HookInput {
    /// Create an input with defaults for everything but the event
    pub fn new(hook_event_name: HookEventName) -> Self {
        Self {
            session_id: String::new(),
            transcript_path: String::new(),
            cwd: String::new(),
            permission_mode: default_permission_mode(),
            hook_event_name,
            tool_name: None,
            tool_input: None,
            tool_use_id: None,
            tool_result: None,
        }
    }

    /// Parse input from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(ProtectorError::HookInput)
    }

    pub fn with_tool(mut self, tool_name: &str, tool_input: Map<String, Value>) -> Self {
        self.tool_name = Some(tool_name.to_string());
        self.tool_input = Some(tool_input);
        self
    }

    pub fn with_tool_result(mut self, tool_result: impl Into<String>) -> Self {
        self.tool_result = Some(tool_result.into());
        self
    }

    /// Tool name or a placeholder, for messages
    pub fn tool_label(&self) -> &str {
        self.tool_name.as_deref().unwrap_or("unknown")
    }

    /// Get a summary of the input for logging
    pub fn summary(&self) -> String {
        match self.hook_event_name {
            HookEventName::PreToolUse | HookEventName::PostToolUse => {
                format!("{}: {}", self.hook_event_name, self.tool_label())
            }
            HookEventName::Stop | HookEventName::SubAgentStop => {
                self.hook_event_name.to_string()
            }
        }
    }
}
