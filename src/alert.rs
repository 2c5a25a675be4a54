//! Content and alert types shared by every provider
//!
//! A provider receives a [`ContentToCheck`] and answers with
//! `Option<GuardrailAlert>`: `None` means the content was checked and is clean.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Where the checked content came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ContentType {
    /// Arguments of a tool that is about to run
    #[default]
    ToolInput,

    /// Result text of a tool that already ran
    ToolOutput,

    /// Any other label supplied by an integration
    Other(String),
}

impl ContentType {
    /// Parse a wire label; unknown labels are kept verbatim
    pub fn parse(label: &str) -> Self {
        match label {
            "tool_input" => ContentType::ToolInput,
            "tool_output" => ContentType::ToolOutput,
            other => ContentType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ContentType::ToolInput => "tool_input",
            ContentType::ToolOutput => "tool_output",
            ContentType::Other(label) => label,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ContentType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ContentType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let label = String::deserialize(deserializer)?;
        Ok(ContentType::parse(&label))
    }
}

/// A single piece of content handed to a provider
#[derive(Debug, Clone, PartialEq)]
pub struct ContentToCheck {
    pub content: String,
    pub content_type: ContentType,
    pub tool_name: Option<String>,
    pub context: Map<String, Value>,
}

impl ContentToCheck {
    pub fn new(content: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            content: content.into(),
            content_type,
            tool_name: None,
            context: Map::new(),
        }
    }

    pub fn with_tool_name(mut self, tool_name: Option<impl Into<String>>) -> Self {
        self.tool_name = tool_name.map(Into::into);
        self
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = context;
        self
    }

    /// The tool name as a JSON value (`null` when absent), for alert payloads
    pub fn tool_name_value(&self) -> Value {
        self.tool_name
            .as_ref()
            .map(|name| Value::String(name.clone()))
            .unwrap_or(Value::Null)
    }
}

/// A provider's finding
///
/// Also used for degraded states ("could not check"); those carry an
/// `error` key in `data`, see [`GuardrailAlert::is_error`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailAlert {
    /// Single-line human readable summary
    pub explanation: String,

    /// Provider-specific diagnostics
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl GuardrailAlert {
    pub fn new(explanation: impl Into<String>) -> Self {
        Self {
            explanation: explanation.into(),
            data: Map::new(),
        }
    }

    /// Add one diagnostic entry
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    /// An alert describing a provider that could not run
    pub fn error(explanation: impl Into<String>, marker: impl Into<String>) -> Self {
        Self::new(explanation).with("error", marker.into())
    }

    /// True when the provider could not check the content at all
    pub fn is_error(&self) -> bool {
        self.data.contains_key("error")
    }

    /// The error marker, if any
    pub fn error_marker(&self) -> Option<&str> {
        self.data.get("error").and_then(Value::as_str)
    }
}
