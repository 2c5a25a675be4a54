//! Google Cloud Model Armor provider
//!
//! Calls the regional `sanitizeUserPrompt` / `sanitizeModelResponse` REST
//! endpoints and turns the sanitization result into a single-line
//! explanation naming the filters that fired.

use std::collections::BTreeMap;
use std::process::Command;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use super::GuardrailProvider;
use crate::alert::{ContentToCheck, ContentType, GuardrailAlert};
use crate::config::GcpModelArmorConfig;

const USER_AGENT: &str = concat!("context-protector/", env!("CARGO_PKG_VERSION"));

/// Items listed before the rest is summarized as `(+N more)`
const MAX_LISTED: usize = 3;

/// Failure talking to the Model Armor API
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no access token: {0}")]
    Auth(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Marker stored in `data.error`
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::Auth(_) => "auth_error",
            TransportError::Http { .. } => "http_error",
            TransportError::Request(_) => "request_error",
            TransportError::Decode(_) => "decode_error",
        }
    }
}

/// Sends one sanitize request and returns the raw JSON response
pub trait ModelArmorTransport: Send + Sync {
    fn sanitize(&self, url: &str, body: &Value) -> Result<Value, TransportError>;
}

/// reqwest-based transport with bearer-token auth
///
/// Uses the configured token when present, otherwise asks
/// `gcloud auth print-access-token`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    access_token: Option<String>,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(access_token: Option<String>, timeout: Duration) -> Self {
        Self {
            access_token,
            timeout,
        }
    }

    fn token(&self) -> Result<String, TransportError> {
        if let Some(token) = self.access_token.as_ref().filter(|t| !t.is_empty()) {
            return Ok(token.clone());
        }

        let output = Command::new("gcloud")
            .args(["auth", "print-access-token"])
            .output()
            .map_err(|e| TransportError::Auth(format!("cannot run gcloud: {}", e)))?;

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() || token.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransportError::Auth(format!(
                "gcloud auth print-access-token failed: {}",
                stderr.trim()
            )));
        }
        Ok(token)
    }
}

impl ModelArmorTransport for HttpTransport {
    fn sanitize(&self, url: &str, body: &Value) -> Result<Value, TransportError> {
        let token = self.token()?;

        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.timeout)
            .build()
            .map_err(|e| TransportError::Request(format!("Failed to build HTTP client: {e}")))?;

        let response = client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::warn!(status = %status, "Model Armor request failed");
            return Err(TransportError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

// Raw API response. Every field is optional; anything missing reads as empty.

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawResponse {
    sanitization_result: RawSanitization,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawSanitization {
    filter_match_state: Value,
    invocation_result: Option<String>,
    filter_results: BTreeMap<String, RawEnvelope>,
    sanitization_metadata: RawMetadata,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawMetadata {
    error_message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawEnvelope {
    rai_filter_result: Option<RawFilter>,
    pi_and_jailbreak_filter_result: Option<RawFilter>,
    malicious_uri_filter_result: Option<RawFilter>,
    sdp_filter_result: Option<RawFilter>,
    csam_filter_filter_result: Option<RawFilter>,
    virus_scan_filter_result: Option<RawFilter>,
}

impl RawEnvelope {
    fn into_filter(self) -> Option<RawFilter> {
        self.rai_filter_result
            .or(self.pi_and_jailbreak_filter_result)
            .or(self.malicious_uri_filter_result)
            .or(self.sdp_filter_result)
            .or(self.csam_filter_filter_result)
            .or(self.virus_scan_filter_result)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawFilter {
    execution_state: Option<String>,
    match_state: Value,
    confidence_level: Option<String>,
    message_items: Vec<RawMessage>,
    rai_filter_type_results: BTreeMap<String, RawRaiType>,
    malicious_uri_matched_items: Vec<RawUri>,
    inspect_result: Option<Box<RawFilter>>,
    findings: Vec<RawFinding>,
    virus_details: Vec<RawVirus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawMessage {
    message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawRaiType {
    match_state: Value,
    confidence_level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawUri {
    uri: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawFinding {
    info_type: String,
    likelihood: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawVirus {
    names: Vec<String>,
    threat_type: Option<String>,
}

/// Canonical match-state name; the API sends either names or enum numbers
pub fn match_state_name(state: &Value) -> String {
    match state {
        Value::Number(n) => match n.as_u64() {
            Some(0) => "MATCH_STATE_UNSPECIFIED".to_string(),
            Some(1) => "NO_MATCH".to_string(),
            Some(2) => "MATCH_FOUND".to_string(),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Null => "MATCH_STATE_UNSPECIFIED".to_string(),
        other => other.to_string(),
    }
}

/// Human readable match state
pub fn format_match_state(state: &str) -> String {
    match state {
        "MATCH_FOUND" => "content flagged".to_string(),
        "NO_MATCH" => "content safe".to_string(),
        "MATCH_STATE_UNSPECIFIED" => "unspecified".to_string(),
        other => other.to_string(),
    }
}

fn filter_type_for(name: &str) -> String {
    match name {
        "pi_and_jailbreak" => "Prompt Injection & Jailbreak".to_string(),
        "rai" => "Responsible AI".to_string(),
        "malicious_uris" => "Malicious URI".to_string(),
        "sdp" => "Sensitive Data Protection".to_string(),
        "csam" => "CSAM".to_string(),
        "virus_scan" => "Virus Scan".to_string(),
        other => other.to_string(),
    }
}

/// One RAI category that matched
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaiDetection {
    #[serde(rename = "type")]
    pub kind: String,
    pub confidence: Option<String>,
}

/// One Sensitive Data Protection finding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SdpFinding {
    pub info_type: String,
    pub likelihood: Option<String>,
}

/// One virus scan hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VirusDetail {
    pub names: Vec<String>,
    pub threat_type: Option<String>,
}

/// Normalized result of one filter
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FilterResult {
    pub filter_name: String,
    pub filter_type: String,
    pub match_state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub detections: Vec<RaiDetection>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub malicious_uris: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<SdpFinding>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub viruses: Vec<VirusDetail>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
}

impl FilterResult {
    /// Result for a named filter with defaults elsewhere
    pub fn new(filter_name: &str, match_state: &str) -> Self {
        Self {
            filter_name: filter_name.to_string(),
            filter_type: filter_type_for(filter_name),
            match_state: match_state.to_string(),
            ..Self::default()
        }
    }

    fn from_raw(name: &str, raw: RawFilter) -> Self {
        let mut result = Self::new(name, &match_state_name(&raw.match_state));
        result.execution_state = raw.execution_state;
        result.confidence = raw.confidence_level;
        result.messages = raw.message_items.into_iter().map(|m| m.message).collect();
        result.detections = raw
            .rai_filter_type_results
            .into_iter()
            .filter(|(_, rai)| match_state_name(&rai.match_state) == "MATCH_FOUND")
            .map(|(kind, rai)| RaiDetection {
                kind,
                confidence: rai.confidence_level,
            })
            .collect();
        result.malicious_uris = raw
            .malicious_uri_matched_items
            .into_iter()
            .map(|item| item.uri)
            .collect();
        result.viruses = raw
            .virus_details
            .into_iter()
            .map(|virus| VirusDetail {
                names: virus.names,
                threat_type: virus.threat_type,
            })
            .collect();

        // SDP nests its verdict one level down
        let mut findings = raw.findings;
        if let Some(inspect) = raw.inspect_result {
            result.match_state = match_state_name(&inspect.match_state);
            if result.execution_state.is_none() {
                result.execution_state = inspect.execution_state;
            }
            result
                .messages
                .extend(inspect.message_items.into_iter().map(|m| m.message));
            findings.extend(inspect.findings);
        }
        result.findings = findings
            .into_iter()
            .map(|finding| SdpFinding {
                info_type: finding.info_type,
                likelihood: finding.likelihood,
            })
            .collect();
        result
    }

    fn is_match(&self) -> bool {
        self.match_state == "MATCH_FOUND"
    }

    /// One clause describing what this filter found, if anything concrete
    pub fn describe(&self) -> Option<String> {
        if !self.is_match() {
            return None;
        }
        let has_messages = !self.messages.is_empty();

        match self.filter_name.as_str() {
            "pi_and_jailbreak" => match &self.confidence {
                Some(confidence) => Some(format!(
                    "Prompt Injection & Jailbreak detected (confidence: {})",
                    confidence
                )),
                None if has_messages => Some("Prompt Injection & Jailbreak detected".to_string()),
                None => None,
            },
            "rai" => {
                if !self.detections.is_empty() {
                    let categories: Vec<String> = self
                        .detections
                        .iter()
                        .map(|d| match &d.confidence {
                            Some(c) => format!("{} ({})", d.kind.replace('_', " "), c),
                            None => d.kind.replace('_', " "),
                        })
                        .collect();
                    Some(format!("Responsible AI violation: {}", categories.join(", ")))
                } else if has_messages {
                    Some("Responsible AI violation detected".to_string())
                } else {
                    None
                }
            }
            "malicious_uris" => {
                if !self.malicious_uris.is_empty() {
                    Some(format!("Malicious URI detected: {}", list_some(&self.malicious_uris)))
                } else if has_messages {
                    Some("Malicious URI detected".to_string())
                } else {
                    None
                }
            }
            "sdp" => {
                if !self.findings.is_empty() {
                    let types: Vec<String> =
                        self.findings.iter().map(|f| f.info_type.clone()).collect();
                    Some(format!("Sensitive data detected: {}", list_some(&types)))
                } else if has_messages {
                    Some("Sensitive data detected".to_string())
                } else {
                    None
                }
            }
            "csam" => has_messages.then(|| "CSAM (child safety) violation detected".to_string()),
            "virus_scan" => {
                let names: Vec<String> = self
                    .viruses
                    .iter()
                    .flat_map(|v| v.names.iter().cloned())
                    .collect();
                if !names.is_empty() {
                    Some(format!("Malware detected: {}", names.join(", ")))
                } else if has_messages || !self.viruses.is_empty() {
                    Some("Malware detected".to_string())
                } else {
                    None
                }
            }
            _ => Some(format!("{} triggered", self.filter_type)),
        }
    }
}

/// First few items, then a count of the rest
fn list_some(items: &[String]) -> String {
    let shown = items
        .iter()
        .take(MAX_LISTED)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    if items.len() > MAX_LISTED {
        format!("{} (+{} more)", shown, items.len() - MAX_LISTED)
    } else {
        shown
    }
}

/// Normalized sanitization result
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SanitizeSummary {
    pub match_state: String,
    pub invocation_result: Option<String>,
    pub filter_results: Vec<FilterResult>,
    pub error_message: Option<String>,
}

impl SanitizeSummary {
    /// Normalize a raw API response
    pub fn from_response(response: Value) -> Result<Self, TransportError> {
        let raw: RawResponse =
            serde_json::from_value(response).map_err(|e| TransportError::Decode(e.to_string()))?;
        let sanitization = raw.sanitization_result;

        let filter_results = sanitization
            .filter_results
            .into_iter()
            .filter_map(|(name, envelope)| {
                envelope
                    .into_filter()
                    .map(|raw| FilterResult::from_raw(&name, raw))
            })
            .collect();

        Ok(Self {
            match_state: match_state_name(&sanitization.filter_match_state),
            invocation_result: sanitization.invocation_result,
            filter_results,
            error_message: sanitization.sanitization_metadata.error_message,
        })
    }

    pub fn is_safe(&self) -> bool {
        self.match_state != "MATCH_FOUND"
    }

    /// Single-line explanation of why the content was flagged
    pub fn explanation(&self) -> String {
        let mut explanation = if self.filter_results.is_empty() {
            let mut text = format!(
                "GCP Model Armor blocked content: {}",
                format_match_state(&self.match_state)
            );
            if let Some(invocation) = &self.invocation_result {
                text.push_str(&format!(" (invocation: {})", invocation));
            }
            text
        } else {
            format!("GCP Model Armor blocked content: {}", self.detection_details())
        };

        if let Some(error) = &self.error_message {
            explanation.push_str(&format!("; error: {}", error));
        }
        explanation
    }

    /// Joined descriptions of the filters that found something concrete
    pub fn detection_details(&self) -> String {
        let clauses: Vec<String> = self
            .filter_results
            .iter()
            .filter_map(FilterResult::describe)
            .collect();
        if clauses.is_empty() {
            "Detected potentially harmful content".to_string()
        } else {
            clauses.join("; ")
        }
    }
}

/// Provider backed by the Model Armor sanitize API
pub struct ModelArmorProvider {
    project_id: Option<String>,
    location: Option<String>,
    template_id: Option<String>,
    transport: Box<dyn ModelArmorTransport>,
}

impl ModelArmorProvider {
    pub fn from_config(config: &GcpModelArmorConfig) -> Self {
        Self::with_transport(
            config,
            HttpTransport::new(
                config.access_token.clone(),
                Duration::from_secs(config.timeout_secs),
            ),
        )
    }

    pub fn with_transport(
        config: &GcpModelArmorConfig,
        transport: impl ModelArmorTransport + 'static,
    ) -> Self {
        Self {
            project_id: non_empty(&config.project_id),
            location: non_empty(&config.location),
            template_id: non_empty(&config.template_id),
            transport: Box::new(transport),
        }
    }

    /// Names of the missing settings, if any
    pub fn missing_settings(&self) -> Vec<&'static str> {
        [
            ("project_id", &self.project_id),
            ("location", &self.location),
            ("template_id", &self.template_id),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| name)
        .collect()
    }

    /// Endpoint and body for one piece of content
    pub fn request_for(&self, content: &ContentToCheck) -> Option<(String, Value)> {
        let (project, location, template) = (
            self.project_id.as_deref()?,
            self.location.as_deref()?,
            self.template_id.as_deref()?,
        );
        let (method, body) = match content.content_type {
            ContentType::ToolOutput => (
                "sanitizeModelResponse",
                json!({"modelResponseData": {"text": content.content}}),
            ),
            _ => (
                "sanitizeUserPrompt",
                json!({"userPromptData": {"text": content.content}}),
            ),
        };
        let url = format!(
            "https://modelarmor.{location}.rep.googleapis.com/v1/projects/{project}/locations/{location}/templates/{template}:{method}"
        );
        Some((url, body))
    }

    fn flagged_alert(summary: SanitizeSummary, content: &ContentToCheck) -> GuardrailAlert {
        let explanation = summary.explanation();
        let filter_results =
            serde_json::to_value(&summary.filter_results).unwrap_or(Value::Array(Vec::new()));
        GuardrailAlert::new(explanation)
            .with("provider", "GCPModelArmor")
            .with("is_safe", false)
            .with("match_state", summary.match_state)
            .with("filter_results", filter_results)
            .with("content_type", content.content_type.as_str())
            .with("tool_name", content.tool_name_value())
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

impl GuardrailProvider for ModelArmorProvider {
    fn name(&self) -> &str {
        "GCPModelArmor"
    }

    fn check_content(&self, content: &ContentToCheck) -> Option<GuardrailAlert> {
        let Some((url, body)) = self.request_for(content) else {
            let missing = self.missing_settings().join(", ");
            tracing::warn!(missing = %missing, "Model Armor is not configured");
            return Some(
                GuardrailAlert::error(
                    format!("GCP Model Armor configuration error: missing {}", missing),
                    "configuration_error",
                )
                .with("missing", self.missing_settings()),
            );
        };

        tracing::debug!(url = %url, "calling Model Armor");
        let summary = self
            .transport
            .sanitize(&url, &body)
            .and_then(SanitizeSummary::from_response);

        match summary {
            Ok(summary) if summary.is_safe() => None,
            Ok(summary) => Some(Self::flagged_alert(summary, content)),
            Err(err) => {
                tracing::warn!(error = %err, "Model Armor check failed");
                Some(
                    GuardrailAlert::error(format!("GCP Model Armor error: {}", err), err.kind())
                        .with("details", err.to_string()),
                )
            }
        }
    }
}
