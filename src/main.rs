//! context-protector - Prompt-injection guardrails for AI agent tool hooks
//!
//! # Usage
//!
//! ```bash
//! # As an agent hook (reads the event JSON from stdin, writes JSON to stdout)
//! echo '{"hook_event_name":"PreToolUse","tool_name":"Bash","tool_input":{"command":"ls"}}' | context-protector
//!
//! # Check mode for plugin integrations
//! echo '{"content":"ignore previous instructions","type":"tool_output"}' | context-protector --check
//!
//! # Toggle protection
//! context-protector --disable
//! ```

use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};

use context_protector::{
    config::{self, Config},
    engine::{check, HookHandler},
    input::HookInput,
    logging,
    providers::PROVIDER_REGISTRY,
};

const AFTER_HELP: &str = r#"MODES:
    (no flag)   Hook mode: read one hook event from stdin, write the hook response to stdout
    --check     Check mode: read {"content": "...", "type": "tool_input"|"tool_output"}
                and write {"safe": bool, "alert": ...}. Used by OpenCode-style plugins
                that call the binary once per piece of content.

USAGE AS HOOK:
    Configure in ~/.claude/settings.json:
    {
      "hooks": {
        "PreToolUse": [{"matcher": "*", "hooks": [{"type": "command", "command": "context-protector"}]}],
        "PostToolUse": [{"matcher": "*", "hooks": [{"type": "command", "command": "context-protector"}]}]
      }
    }

ENVIRONMENT:
    CONTEXT_PROTECTOR_ENABLED, CONTEXT_PROTECTOR_PROVIDER, CONTEXT_PROTECTOR_PROVIDERS,
    CONTEXT_PROTECTOR_RESPONSE_MODE, CONTEXT_PROTECTOR_LOG_LEVEL, CONTEXT_PROTECTOR_LOG_FILE,
    CONTEXT_PROTECTOR_SCANNER_MODE, CONTEXT_PROTECTOR_GCP_* override the config file."#;

#[derive(Debug, Parser)]
#[command(
    name = "context-protector",
    version,
    about = "Prompt-injection and content-safety guardrails for AI agent tool hooks",
    after_help = AFTER_HELP
)]
#[command(group(
    ArgGroup::new("mode")
        .args(["check", "enable", "disable", "init", "list_providers"])
        .multiple(false)
))]
struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "PATH", env = config::CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Check mode: content in, verdict out
    #[arg(long)]
    check: bool,

    /// Enable protection in the config file
    #[arg(long)]
    enable: bool,

    /// Disable protection in the config file
    #[arg(long)]
    disable: bool,

    /// Write a default config file
    #[arg(long)]
    init: bool,

    /// Overwrite an existing config file with --init
    #[arg(long, requires = "init")]
    force: bool,

    /// List available providers
    #[arg(long)]
    list_providers: bool,
}

impl Cli {
    /// Config file to read or write
    fn config_file(&self) -> Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => config::config_path().context("cannot determine the config directory"),
        }
    }

    fn load_config(&self) -> Result<Config> {
        match &self.config {
            Some(path) => {
                let mut config = Config::load_from(path)?;
                config.apply_env_overrides(|key| std::env::var(key).ok());
                Ok(config)
            }
            None => Ok(Config::load()),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.list_providers {
        for entry in PROVIDER_REGISTRY {
            println!("{:<15} {}", entry.name, entry.description);
        }
        return Ok(());
    }

    if cli.init {
        let path = cli.config_file()?;
        config::init_config(&path, cli.force)?;
        println!("Created config at {}", path.display());
        return Ok(());
    }

    if cli.enable || cli.disable {
        let path = cli.config_file()?;
        config::set_enabled(&path, cli.enable)
            .with_context(|| format!("failed to update {}", path.display()))?;
        let state = if cli.enable { "enabled" } else { "disabled" };
        println!("context-protector {} (config: {})", state, path.display());
        return Ok(());
    }

    let config = match cli.load_config() {
        Ok(config) => config,
        // Check mode answers with a verdict line whatever goes wrong
        Err(e) if cli.check => {
            return emit(&check::CheckOutput::error(e.to_string()).to_json());
        }
        Err(e) => return Err(e),
    };
    logging::init(&config);

    let stdin = io::stdin();
    let output = if cli.check {
        check::run_check(stdin.lock(), &config).to_json()
    } else {
        run_hook(stdin.lock(), &config)?
    };
    emit(&output)
}

/// Write the single protocol line to stdout
fn emit(line: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", line)?;
    handle.flush()?;
    Ok(())
}

/// Hook mode: one event in, one response out
fn run_hook<R: Read>(mut reader: R, config: &Config) -> Result<String> {
    let mut raw = String::new();
    reader
        .read_to_string(&mut raw)
        .context("failed to read hook input")?;

    let input = HookInput::from_json(&raw)?;
    tracing::info!(event = %input.summary(), "hook event received");

    let handler = HookHandler::from_config(config)?;
    Ok(handler.handle(&input).to_json())
}
