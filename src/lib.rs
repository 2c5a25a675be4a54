//! context-protector - Prompt-injection guardrails for AI agent tool hooks
//!
//! This library inspects the content flowing through an agent's hook
//! pipeline (tool arguments before a call, tool results after it) with a
//! pluggable threat-detection provider, and answers with the exact hook
//! output the host agent expects.
//!
//! # Features
//!
//! - **Hook protocol**: PreToolUse, PostToolUse, Stop and SubagentStop events
//! - **Response modes**: warn (surface alerts) or block (deny / reject)
//! - **Providers**: LlamaFirewall, GCP Model Armor, composites and test doubles
//! - **Check mode**: a single-shot content-in, verdict-out interface
//!
//! # Example
//!
//! ```
//! use context_protector::{HookHandler, HookInput, ResponseMode};
//! use context_protector::providers::AlwaysAlertProvider;
//!
//! let handler = HookHandler::new(
//!     Box::new(AlwaysAlertProvider::new("Prompt injection")),
//!     Some(ResponseMode::Block),
//! );
//!
//! let input = r#"{"hook_event_name":"PreToolUse","tool_name":"Bash","tool_input":{"command":"ls"}}"#;
//! let hook_input = HookInput::from_json(input).unwrap();
//!
//! let output = handler.handle(&hook_input);
//! assert!(output.to_json().contains(r#""permissionDecision":"deny""#));
//! ```

pub mod alert;
pub mod config;
pub mod engine;
pub mod error;
pub mod input;
pub mod logging;
pub mod output;
pub mod providers;

// Re-exports for convenience
pub use alert::{ContentToCheck, ContentType, GuardrailAlert};
pub use config::{Config, ResponseMode};
pub use engine::check::{CheckOutput, CheckResult};
pub use engine::HookHandler;
pub use error::{ProtectorError, Result};
pub use input::{HookEventName, HookInput};
pub use output::{HookOutput, PermissionDecision, PostToolUseDecision};
pub use providers::GuardrailProvider;
