//! Check mode: content in, verdict out
//!
//! A lighter integration surface than the hook protocol. Reads
//! `{"content", "type", "tool_name"}` and always answers with one line of
//! JSON. Errors never fail the call; they come back as `{"safe":true,"error"}`.

use std::any::Any;
use std::io::Read;
use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::alert::{ContentToCheck, ContentType};
use crate::config::Config;
use crate::error::Result;
use crate::providers::{provider_from_config, GuardrailProvider};

/// Check-mode request
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CheckRequest {
    #[serde(default)]
    pub content: String,

    #[serde(rename = "type", default)]
    pub content_type: ContentType,

    #[serde(default)]
    pub tool_name: Option<String>,
}

/// Alert as reported by check mode
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckAlert {
    pub explanation: String,
    pub provider: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

/// Verdict for one piece of content
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub safe: bool,
    pub alert: Option<CheckAlert>,
}

impl CheckResult {
    pub fn safe() -> Self {
        Self {
            safe: true,
            alert: None,
        }
    }
}

/// Everything check mode can print
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CheckOutput {
    Verdict(CheckResult),
    Error { safe: bool, error: String },
}

impl CheckOutput {
    /// Fail-open error report
    pub fn error(message: impl Into<String>) -> Self {
        CheckOutput::Error {
            safe: true,
            error: message.into(),
        }
    }

    pub fn is_safe(&self) -> bool {
        match self {
            CheckOutput::Verdict(result) => result.safe,
            CheckOutput::Error { safe, .. } => *safe,
        }
    }

    /// Serialize to a single-line JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"safe":true,"alert":null}"#.to_string())
    }
}

impl From<CheckResult> for CheckOutput {
    fn from(result: CheckResult) -> Self {
        CheckOutput::Verdict(result)
    }
}

/// Check one piece of content with `provider`
///
/// Empty content is safe without asking the provider.
pub fn check_content(
    provider: &dyn GuardrailProvider,
    content: &str,
    content_type: ContentType,
    tool_name: Option<&str>,
) -> CheckResult {
    if content.is_empty() {
        return CheckResult::safe();
    }

    let request = ContentToCheck::new(content, content_type).with_tool_name(tool_name);
    match provider.check_content(&request) {
        None => CheckResult::safe(),
        Some(alert) => {
            tracing::warn!(provider = provider.name(), explanation = %alert.explanation, "check mode alert");
            CheckResult {
                safe: false,
                alert: Some(CheckAlert {
                    explanation: alert.explanation,
                    provider: provider.name().to_string(),
                    data: alert.data,
                }),
            }
        }
    }
}

/// Run check mode against the configured provider
pub fn run_check<R: Read>(reader: R, config: &Config) -> CheckOutput {
    if !config.enabled {
        tracing::debug!("protection disabled, check mode reports safe");
        return CheckResult::safe().into();
    }
    run_check_with(reader, || provider_from_config(config))
}

/// Run check mode with a caller-supplied provider constructor
///
/// The constructor only runs for non-empty content. A panic while building
/// the provider or checking is reported as an error verdict.
pub fn run_check_with<R, F>(mut reader: R, build: F) -> CheckOutput
where
    R: Read,
    F: FnOnce() -> Result<Box<dyn GuardrailProvider>>,
{
    let mut raw = String::new();
    if let Err(e) = reader.read_to_string(&mut raw) {
        return CheckOutput::error(format!("Failed to read input: {}", e));
    }
    if raw.trim().is_empty() {
        return CheckOutput::error("Empty input");
    }

    let request: CheckRequest = match serde_json::from_str(&raw) {
        Ok(request) => request,
        Err(e) => return CheckOutput::error(format!("Invalid JSON input: {}", e)),
    };
    if request.content.is_empty() {
        return CheckResult::safe().into();
    }

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<CheckResult> {
        let provider = build()?;
        Ok(check_content(
            provider.as_ref(),
            &request.content,
            request.content_type.clone(),
            request.tool_name.as_deref(),
        ))
    }));

    match outcome {
        Ok(Ok(result)) => result.into(),
        Ok(Err(e)) => CheckOutput::error(e.to_string()),
        Err(payload) => CheckOutput::error(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "provider panicked".to_string()
    }
}
