//! Integration tests for configuration files

use context_protector::config::{init_config, set_enabled, DEFAULT_CONFIG_TOML};
use context_protector::{Config, HookHandler, ProtectorError, ResponseMode};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_full_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
enabled = true
provider = "GCPModelArmor"
providers = ["NeverAlert", "Mock"]
response_mode = "block"
log_level = "debug"
log_file = "/tmp/cp.log"

[llama_firewall]
scanner_mode = "basic"
python = "/opt/venv/bin/python"

[gcp_model_armor]
project_id = "my-project"
location = "europe-west1"
template_id = "my-template"
timeout_secs = 3
"#,
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.provider, "GCPModelArmor");
    assert_eq!(config.providers, vec!["NeverAlert", "Mock"]);
    assert_eq!(config.response_mode, ResponseMode::Block);
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.log_file_path().unwrap().to_string_lossy(), "/tmp/cp.log");
    assert_eq!(config.llama_firewall.scanner_mode, "basic");
    assert_eq!(config.llama_firewall.python, "/opt/venv/bin/python");
    assert_eq!(config.gcp_model_armor.location.as_deref(), Some("europe-west1"));
    assert_eq!(config.gcp_model_armor.timeout_secs, 3);

    let handler = HookHandler::from_config(&config).unwrap();
    assert_eq!(handler.provider_name(), Some("Composite"));
    assert_eq!(handler.response_mode(), ResponseMode::Block);
}

#[test]
fn test_invalid_toml_reports_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "provider = [unterminated").unwrap();

    let err = Config::load_from(&path).unwrap_err();
    assert!(matches!(err, ProtectorError::ConfigParse { .. }));
    assert!(err.to_string().contains("config.toml"));
}

#[test]
fn test_init_then_toggle() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("context-protector/config.toml");

    init_config(&path, false).unwrap();
    assert_eq!(Config::load_from(&path).unwrap(), Config::default());

    set_enabled(&path, false).unwrap();
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("enabled = false"));
    assert!(content.contains("# Master switch"));
    assert_eq!(content.lines().count(), DEFAULT_CONFIG_TOML.lines().count());

    set_enabled(&path, true).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), DEFAULT_CONFIG_TOML);
}
