//! Output formatting for hook responses
//!
//! The host accepts two response shapes. [`HookOutput`] has one variant per
//! shape so a PostToolUse response can never carry standard-shape fields.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// PreToolUse permission verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionDecision {
    Allow,
    Deny,
}

/// PostToolUse verdict; `None` omits the field entirely
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostToolUseDecision {
    #[default]
    None,
    Block,
}

impl PostToolUseDecision {
    pub fn is_none(&self) -> bool {
        matches!(self, PostToolUseDecision::None)
    }
}

impl Serialize for PostToolUseDecision {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            PostToolUseDecision::Block => serializer.serialize_str("block"),
            PostToolUseDecision::None => serializer.serialize_none(),
        }
    }
}

/// Serializes as a fixed `hookEventName` value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EventTag(&'static str);

impl Serialize for EventTag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0)
    }
}

/// PreToolUse payload of the standard shape
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreToolUseOutput {
    hook_event_name: EventTag,

    pub permission_decision: PermissionDecision,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_decision_reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_input: Option<Map<String, Value>>,
}

impl PreToolUseOutput {
    pub fn new(permission_decision: PermissionDecision) -> Self {
        Self {
            hook_event_name: EventTag("PreToolUse"),
            permission_decision,
            permission_decision_reason: None,
            updated_input: None,
        }
    }

    pub fn allow() -> Self {
        Self::new(PermissionDecision::Allow)
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            permission_decision_reason: Some(reason.into()),
            ..Self::new(PermissionDecision::Deny)
        }
    }

    pub fn with_updated_input(mut self, updated_input: Map<String, Value>) -> Self {
        self.updated_input = Some(updated_input);
        self
    }
}

/// Shape used for PreToolUse, Stop and SubagentStop
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardOutput {
    #[serde(rename = "continue")]
    pub continue_execution: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,

    /// Message shown to the user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook_specific_output: Option<PreToolUseOutput>,
}

impl StandardOutput {
    /// `{"continue": true}`
    pub fn proceed() -> Self {
        Self {
            continue_execution: true,
            stop_reason: None,
            system_message: None,
            hook_specific_output: None,
        }
    }
}

/// `hookSpecificOutput` of the post-tool-use shape
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostToolUseSpecific {
    hook_event_name: EventTag,

    /// Extra context appended for the model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
}

/// Shape used exclusively for PostToolUse
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostToolUseOutput {
    #[serde(skip_serializing_if = "PostToolUseDecision::is_none")]
    pub decision: PostToolUseDecision,

    /// Feedback to the model when blocking
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    pub hook_specific_output: PostToolUseSpecific,
}

impl PostToolUseOutput {
    /// No decision, no context: continue normally
    pub fn proceed() -> Self {
        Self {
            decision: PostToolUseDecision::None,
            reason: None,
            hook_specific_output: PostToolUseSpecific {
                hook_event_name: EventTag("PostToolUse"),
                additional_context: None,
            },
        }
    }

    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            decision: PostToolUseDecision::Block,
            reason: Some(reason.into()),
            ..Self::proceed()
        }
    }

    pub fn with_context(context: impl Into<String>) -> Self {
        let mut output = Self::proceed();
        output.hook_specific_output.additional_context = Some(context.into());
        output
    }

    pub fn additional_context(&self) -> Option<&str> {
        self.hook_specific_output.additional_context.as_deref()
    }
}

/// Main output structure for hook responses
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HookOutput {
    Standard(StandardOutput),
    PostToolUse(PostToolUseOutput),
}

impl HookOutput {
    /// `{"continue": true}`
    pub fn proceed() -> Self {
        HookOutput::Standard(StandardOutput::proceed())
    }

    /// PreToolUse allow
    pub fn allow() -> Self {
        HookOutput::Standard(StandardOutput {
            hook_specific_output: Some(PreToolUseOutput::allow()),
            ..StandardOutput::proceed()
        })
    }

    /// PreToolUse deny with reason
    pub fn deny(reason: impl Into<String>) -> Self {
        HookOutput::Standard(StandardOutput {
            hook_specific_output: Some(PreToolUseOutput::deny(reason)),
            ..StandardOutput::proceed()
        })
    }

    /// PreToolUse allow with a message for the user
    pub fn warn(message: impl Into<String>) -> Self {
        HookOutput::Standard(StandardOutput {
            system_message: Some(message.into()),
            hook_specific_output: Some(PreToolUseOutput::allow()),
            ..StandardOutput::proceed()
        })
    }

    pub fn as_standard(&self) -> Option<&StandardOutput> {
        match self {
            HookOutput::Standard(output) => Some(output),
            HookOutput::PostToolUse(_) => None,
        }
    }

    pub fn as_post_tool_use(&self) -> Option<&PostToolUseOutput> {
        match self {
            HookOutput::PostToolUse(output) => Some(output),
            HookOutput::Standard(_) => None,
        }
    }

    /// The PreToolUse permission decision, if this output carries one
    pub fn permission_decision(&self) -> Option<PermissionDecision> {
        self.as_standard()
            .and_then(|output| output.hook_specific_output.as_ref())
            .map(|specific| specific.permission_decision)
    }

    /// Serialize to a single-line JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"continue":true}"#.to_string())
    }

    /// Serialize to a JSON value
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<StandardOutput> for HookOutput {
    fn from(output: StandardOutput) -> Self {
        HookOutput::Standard(output)
    }
}

impl From<PostToolUseOutput> for HookOutput {
    fn from(output: PostToolUseOutput) -> Self {
        HookOutput::PostToolUse(output)
    }
}
