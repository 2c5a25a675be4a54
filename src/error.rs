//! Error types for context-protector
//!
//! Provider failures never show up here: providers fold them into alerts.
//! These are the structural errors that stop a hook invocation.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised outside the provider contract
#[derive(Debug, Error)]
pub enum ProtectorError {
    /// A provider name with no registry entry
    #[error("Unknown provider: {name}. Available providers: {available}")]
    UnknownProvider { name: String, available: String },

    /// The hook event JSON could not be parsed
    #[error("Failed to parse hook input: {0}")]
    HookInput(#[source] serde_json::Error),

    /// The configuration file could not be read
    #[error("Failed to read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`crate::Config`]
    #[error("Failed to parse config {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// `init` refused to overwrite an existing configuration
    #[error("Config already exists: {}", .0.display())]
    ConfigExists(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, ProtectorError>;
