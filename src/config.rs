//! Configuration loading for context-protector
//!
//! TOML configuration with embedded defaults. Environment variables override
//! values from the file.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{ProtectorError, Result};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "CONTEXT_PROTECTOR_CONFIG";

/// What to do when a provider raises an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Let the tool run and surface the alert
    #[default]
    Warn,

    /// Stop the tool (PreToolUse) or reject its result (PostToolUse)
    Block,
}

impl ResponseMode {
    /// Parse from string, case-insensitively
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "warn" => Some(ResponseMode::Warn),
            "block" => Some(ResponseMode::Block),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseMode::Warn => "warn",
            ResponseMode::Block => "block",
        }
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// LlamaFirewall provider settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LlamaFirewallConfig {
    /// auto | basic | full
    pub scanner_mode: String,

    /// Interpreter used to run the scanner bridge
    pub python: String,
}

impl Default for LlamaFirewallConfig {
    fn default() -> Self {
        Self {
            scanner_mode: "auto".to_string(),
            python: "python3".to_string(),
        }
    }
}

/// GCP Model Armor provider settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GcpModelArmorConfig {
    pub project_id: Option<String>,
    pub location: Option<String>,
    pub template_id: Option<String>,

    /// Bearer token; when unset, `gcloud auth print-access-token` is used
    pub access_token: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GcpModelArmorConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            location: None,
            template_id: None,
            access_token: None,
            timeout_secs: 10,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Master switch; when false every event passes through unchecked
    pub enabled: bool,

    /// Registry name of the provider
    pub provider: String,

    /// When non-empty, run all of these as one composite provider
    pub providers: Vec<String>,

    pub response_mode: ResponseMode,

    /// tracing filter level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Append logs to this file instead of stderr
    pub log_file: Option<String>,

    pub llama_firewall: LlamaFirewallConfig,
    pub gcp_model_armor: GcpModelArmorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: "LlamaFirewall".to_string(),
            providers: Vec::new(),
            response_mode: ResponseMode::Warn,
            log_level: "warn".to_string(),
            log_file: None,
            llama_firewall: LlamaFirewallConfig::default(),
            gcp_model_armor: GcpModelArmorConfig::default(),
        }
    }
}

impl Config {
    /// Load from the standard location, then apply environment overrides
    ///
    /// Never fails: a broken file is reported and defaults are used.
    pub fn load() -> Self {
        let mut config = match config_path() {
            Some(path) => Self::load_from(&path).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "using default configuration");
                Config::default()
            }),
            None => Config::default(),
        };
        config.apply_env_overrides(env_lookup);
        config
    }

    /// Load from a specific path; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ProtectorError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ProtectorError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `CONTEXT_PROTECTOR_*` overrides read through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("CONTEXT_PROTECTOR_ENABLED") {
            self.enabled = matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes");
        }
        if let Some(value) = lookup("CONTEXT_PROTECTOR_PROVIDER") {
            self.provider = value.trim().to_string();
        }
        if let Some(value) = lookup("CONTEXT_PROTECTOR_PROVIDERS") {
            self.providers = value
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(value) = lookup("CONTEXT_PROTECTOR_RESPONSE_MODE") {
            match ResponseMode::parse(&value) {
                Some(mode) => self.response_mode = mode,
                None => tracing::warn!(value = %value, "ignoring invalid response mode"),
            }
        }
        if let Some(value) = lookup("CONTEXT_PROTECTOR_LOG_LEVEL") {
            self.log_level = value.trim().to_lowercase();
        }
        if let Some(value) = lookup("CONTEXT_PROTECTOR_LOG_FILE") {
            self.log_file = Some(value);
        }
        if let Some(value) = lookup("CONTEXT_PROTECTOR_SCANNER_MODE") {
            self.llama_firewall.scanner_mode = value.trim().to_lowercase();
        }
        if let Some(value) = lookup("CONTEXT_PROTECTOR_PYTHON") {
            self.llama_firewall.python = value;
        }

        let gcp = &mut self.gcp_model_armor;
        if let Some(value) = lookup("CONTEXT_PROTECTOR_GCP_PROJECT_ID") {
            gcp.project_id = Some(value);
        }
        if let Some(value) = lookup("CONTEXT_PROTECTOR_GCP_LOCATION") {
            gcp.location = Some(value);
        }
        if let Some(value) = lookup("CONTEXT_PROTECTOR_GCP_TEMPLATE_ID") {
            gcp.template_id = Some(value);
        }
        if let Some(value) = lookup("CONTEXT_PROTECTOR_GCP_ACCESS_TOKEN") {
            gcp.access_token = Some(value);
        }
    }

    /// Expand ~ in path strings
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    /// Get the log file path (expanded)
    pub fn log_file_path(&self) -> Option<PathBuf> {
        self.log_file
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(Self::expand_path)
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Default config file location
pub fn config_path() -> Option<PathBuf> {
    config_path_with(env_lookup)
}

/// Config file location resolved through `lookup`
///
/// `CONTEXT_PROTECTOR_CONFIG`, then `$XDG_CONFIG_HOME`, then `~/.config`.
pub fn config_path_with<F>(lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = lookup(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return Some(Config::expand_path(&path));
    }

    let base = lookup("XDG_CONFIG_HOME")
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))?;
    Some(base.join("context-protector").join("config.toml"))
}

/// Write the commented default configuration to `path`
pub fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(ProtectorError::ConfigExists(path.to_path_buf()));
    }
    write_config(path, DEFAULT_CONFIG_TOML)
}

/// Persist the `enabled` flag, keeping every other line of the file intact
pub fn set_enabled(path: &Path, enabled: bool) -> Result<()> {
    let current = if path.exists() {
        std::fs::read_to_string(path).map_err(|source| ProtectorError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        DEFAULT_CONFIG_TOML.to_string()
    };

    write_config(path, &with_enabled(&current, enabled))
}

/// Rewrite the top-level `enabled = ...` line, or prepend one
fn with_enabled(content: &str, enabled: bool) -> String {
    static ENABLED_LINE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?m)^([ \t]*enabled[ \t]*=[ \t]*)([^#\r\n]*?)([ \t]*(?:#[^\r\n]*)?\r?)$")
            .unwrap()
    });
    static TABLE_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*\[").unwrap());

    // Keys after the first table header belong to that table
    let top_level_end = TABLE_HEADER
        .find(content)
        .map(|m| m.start())
        .unwrap_or(content.len());
    let (top, tables) = content.split_at(top_level_end);

    if ENABLED_LINE.is_match(top) {
        let replacement = format!("${{1}}{}${{3}}", enabled);
        let top = ENABLED_LINE.replacen(top, 1, replacement.as_str());
        format!("{}{}", top, tables)
    } else {
        let newline = if content.contains("\r\n") { "\r\n" } else { "\n" };
        format!("enabled = {}{}{}", enabled, newline, content)
    }
}

fn write_config(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// Embedded default configuration
pub const DEFAULT_CONFIG_TOML: &str = r#"# context-protector configuration

# Master switch. Toggle with `context-protector --enable` / `--disable`.
enabled = true

# Provider to use: LlamaFirewall, GCPModelArmor, Mock, AlwaysAlert, NeverAlert
provider = "LlamaFirewall"

# Run several providers and merge their alerts, e.g. ["LlamaFirewall", "GCPModelArmor"]
providers = []

# warn: surface alerts and let the tool run
# block: deny the tool call or reject its result
response_mode = "warn"

# trace | debug | info | warn | error
log_level = "warn"
# log_file = "~/.config/context-protector/protector.log"

[llama_firewall]
# auto: all scanners, dropping PROMPT_GUARD if it needs HuggingFace auth
# basic: HIDDEN_ASCII, REGEX and CODE_SHIELD only
# full: all scanners, no fallback
scanner_mode = "auto"
python = "python3"

[gcp_model_armor]
# project_id = "my-project"
# location = "us-central1"
# template_id = "my-template"
timeout_secs = 10
"#;
