//! LlamaFirewall provider
//!
//! LlamaFirewall is a Python library, so scans run through a short-lived
//! `python -c` bridge that reads one JSON request on stdin and answers with
//! one JSON line on stdout. The bridge sits behind [`ScanBackend`] so the
//! provider logic can be exercised without Python installed.

use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::GuardrailProvider;
use crate::alert::{ContentToCheck, ContentType, GuardrailAlert};
use crate::config::LlamaFirewallConfig;

const BRIDGE_SCRIPT: &str = include_str!("llama_firewall_bridge.py");

const SETUP_URL: &str = "https://github.com/meta-llama/PurpleLlama/tree/main/LlamaFirewall#manual-setup";

/// LlamaFirewall scanner identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scanner {
    PromptGuard,
    HiddenAscii,
    Regex,
    CodeShield,
}

impl Scanner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scanner::PromptGuard => "PROMPT_GUARD",
            Scanner::HiddenAscii => "HIDDEN_ASCII",
            Scanner::Regex => "REGEX",
            Scanner::CodeShield => "CODE_SHIELD",
        }
    }
}

/// Every scanner, including the gated PROMPT_GUARD model
pub const FULL_SCANNERS: &[Scanner] = &[
    Scanner::PromptGuard,
    Scanner::HiddenAscii,
    Scanner::Regex,
    Scanner::CodeShield,
];

/// Scanners that need no HuggingFace authentication
pub const NO_AUTH_SCANNERS: &[Scanner] =
    &[Scanner::HiddenAscii, Scanner::Regex, Scanner::CodeShield];

/// Which scanner set to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScannerMode {
    /// Full set, falling back to the no-auth set once if the model is unavailable
    #[default]
    Auto,
    /// No-auth set only
    Basic,
    /// Full set, never falls back
    Full,
}

impl ScannerMode {
    /// Parse a configured mode; unknown values run the full set
    pub fn parse(mode: &str) -> Self {
        match mode.trim().to_lowercase().as_str() {
            "auto" => ScannerMode::Auto,
            "basic" => ScannerMode::Basic,
            "full" => ScannerMode::Full,
            other => {
                tracing::warn!(mode = other, "unknown scanner mode, using full scanner set");
                ScannerMode::Full
            }
        }
    }
}

/// Message role the scan is performed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Tool,
}

/// One scan request sent to the bridge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanRequest {
    pub role: Role,
    pub scanners: Vec<Scanner>,
    pub content: String,
}

/// Result of a completed scan
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScanOutcome {
    /// `allow`, `block` or `human_in_the_loop_required`
    pub decision: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
}

impl ScanOutcome {
    pub fn is_allowed(&self) -> bool {
        self.decision.eq_ignore_ascii_case("allow")
    }
}

/// Why a scan could not be completed
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The library (or the interpreter) could not be loaded
    #[error("{0}")]
    Unavailable(String),

    /// The library loaded but the scan raised
    #[error("{0}")]
    Scan(String),

    /// The bridge produced output we could not understand
    #[error("bridge protocol error: {0}")]
    Protocol(String),
}

/// Runs a scan request somewhere
pub trait ScanBackend: Send + Sync {
    fn scan(&self, request: &ScanRequest) -> Result<ScanOutcome, BridgeError>;
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum BridgeReply {
    Ok(ScanOutcome),
    ImportError { message: String },
    Error { message: String },
}

/// Backend that runs the bridge script with a Python interpreter
#[derive(Debug, Clone)]
pub struct PythonBridge {
    python: String,
}

impl PythonBridge {
    pub fn new(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
        }
    }

    fn parse_reply(stdout: &str, stderr: &str) -> Result<ScanOutcome, BridgeError> {
        let line = stdout
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| {
                let detail = stderr.lines().last().unwrap_or("no output");
                BridgeError::Protocol(format!("empty reply ({})", detail.trim()))
            })?;

        match serde_json::from_str::<BridgeReply>(line) {
            Ok(BridgeReply::Ok(outcome)) => Ok(outcome),
            Ok(BridgeReply::ImportError { message }) => Err(BridgeError::Unavailable(message)),
            Ok(BridgeReply::Error { message }) => Err(BridgeError::Scan(message)),
            Err(e) => Err(BridgeError::Protocol(e.to_string())),
        }
    }
}

impl ScanBackend for PythonBridge {
    fn scan(&self, request: &ScanRequest) -> Result<ScanOutcome, BridgeError> {
        let payload =
            serde_json::to_vec(request).map_err(|e| BridgeError::Protocol(e.to_string()))?;

        let mut child = Command::new(&self.python)
            .arg("-c")
            .arg(BRIDGE_SCRIPT)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BridgeError::Unavailable(format!("cannot start {}: {}", self.python, e)))?;

        // stdin is dropped after the write so the bridge sees EOF
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(&payload),
            None => Ok(()),
        };

        // Reap the child even when the request could not be written
        let output = child
            .wait_with_output()
            .map_err(|e| BridgeError::Protocol(format!("waiting for bridge: {}", e)))?;
        written.map_err(|e| BridgeError::Protocol(format!("writing request: {}", e)))?;

        Self::parse_reply(
            &String::from_utf8_lossy(&output.stdout),
            &String::from_utf8_lossy(&output.stderr),
        )
    }
}

/// How a scan failure should be reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    Auth,
    ModelSetup,
    Other,
}

impl Failure {
    fn classify(message: &str) -> Self {
        if message.contains("gated repo") || message.contains("403") {
            Failure::Auth
        } else if message.contains("HfFolder") {
            Failure::ModelSetup
        } else {
            Failure::Other
        }
    }
}

/// Provider backed by Meta's LlamaFirewall
pub struct LlamaFirewallProvider {
    mode: ScannerMode,
    fallback: AtomicBool,
    backend: Box<dyn ScanBackend>,
}

impl LlamaFirewallProvider {
    pub fn from_config(config: &LlamaFirewallConfig) -> Self {
        Self::with_backend(
            ScannerMode::parse(&config.scanner_mode),
            PythonBridge::new(config.python.as_str()),
        )
    }

    pub fn with_backend(mode: ScannerMode, backend: impl ScanBackend + 'static) -> Self {
        Self {
            mode,
            fallback: AtomicBool::new(false),
            backend: Box::new(backend),
        }
    }

    pub fn mode(&self) -> ScannerMode {
        self.mode
    }

    /// True once auto mode has dropped PROMPT_GUARD
    pub fn is_fallback(&self) -> bool {
        self.fallback.load(Ordering::SeqCst)
    }

    /// Scanners the next check will run
    pub fn scanners(&self) -> &'static [Scanner] {
        if self.mode == ScannerMode::Basic || self.is_fallback() {
            NO_AUTH_SCANNERS
        } else {
            FULL_SCANNERS
        }
    }

    /// Switch to the no-auth set; true only for the first switch in auto mode
    fn enter_fallback(&self) -> bool {
        self.mode == ScannerMode::Auto && !self.fallback.swap(true, Ordering::SeqCst)
    }

    fn request_for(&self, content: &ContentToCheck) -> ScanRequest {
        let role = match content.content_type {
            ContentType::ToolOutput => Role::Tool,
            _ => Role::User,
        };
        ScanRequest {
            role,
            scanners: self.scanners().to_vec(),
            content: content.content.clone(),
        }
    }

    fn blocked_alert(
        &self,
        outcome: ScanOutcome,
        request: &ScanRequest,
        content: &ContentToCheck,
    ) -> GuardrailAlert {
        let reason = outcome
            .reason
            .filter(|reason| !reason.trim().is_empty())
            .unwrap_or_else(|| "Guardrail triggered".to_string());
        let explanation = reason.lines().next().unwrap_or("Guardrail triggered").to_string();
        let scanners: Vec<&str> = request.scanners.iter().map(Scanner::as_str).collect();

        let mut alert = GuardrailAlert::new(explanation)
            .with("decision", outcome.decision)
            .with("content_type", content.content_type.as_str())
            .with("tool_name", content.tool_name_value())
            .with("scanners", scanners)
            .with("full_reason", reason);
        if let Some(score) = outcome.score {
            alert = alert.with("score", score);
        }
        if self.is_fallback() {
            alert = alert.with("fallback", true);
        }
        alert
    }

    fn unavailable_alert(message: &str) -> GuardrailAlert {
        let explanation = if message.contains("HfFolder") {
            format!(
                "LlamaFirewall requires manual model setup. The Prompt Guard model must be downloaded before use. See: {}",
                SETUP_URL
            )
        } else {
            format!("LlamaFirewall not available: {}", message)
        };
        GuardrailAlert::error(explanation, "import_error").with("details", message)
    }

    fn failure_alert(failure: Failure, message: &str) -> GuardrailAlert {
        match failure {
            Failure::Auth => GuardrailAlert::error(
                "LlamaFirewall PROMPT_GUARD requires authentication. Set CONTEXT_PROTECTOR_SCANNER_MODE=basic to use without auth.",
                "auth_error",
            )
            .with("details", message),
            Failure::ModelSetup => GuardrailAlert::error(
                format!(
                    "LlamaFirewall requires manual model setup. See: {} - Or set CONTEXT_PROTECTOR_SCANNER_MODE=basic",
                    SETUP_URL
                ),
                "model_setup_error",
            )
            .with("details", message),
            Failure::Other => {
                GuardrailAlert::error(format!("LlamaFirewall error: {}", message), message)
            }
        }
    }
}

impl GuardrailProvider for LlamaFirewallProvider {
    fn name(&self) -> &str {
        "LlamaFirewall"
    }

    fn check_content(&self, content: &ContentToCheck) -> Option<GuardrailAlert> {
        let request = self.request_for(content);
        tracing::debug!(role = ?request.role, scanners = ?request.scanners, "running LlamaFirewall scan");

        match self.backend.scan(&request) {
            Ok(outcome) if outcome.is_allowed() => None,
            Ok(outcome) => Some(self.blocked_alert(outcome, &request, content)),
            Err(BridgeError::Unavailable(message)) => {
                tracing::warn!(error = %message, "LlamaFirewall unavailable");
                Some(Self::unavailable_alert(&message))
            }
            Err(err) => {
                let message = err.to_string();
                let failure = Failure::classify(&message);
                if failure != Failure::Other && self.enter_fallback() {
                    tracing::warn!(
                        error = %message,
                        "PROMPT_GUARD unavailable, retrying with scanners that need no auth"
                    );
                    return self.check_content(content);
                }
                tracing::warn!(error = %message, "LlamaFirewall scan failed");
                Some(Self::failure_alert(failure, &message))
            }
        }
    }
}
