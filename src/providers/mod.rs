//! Guardrail providers for context-protector
//!
//! Every detection backend implements [`GuardrailProvider`]. Backends that
//! cannot run (missing library, bad credentials, network failure) report it
//! as an alert carrying an `error` marker instead of failing the call.

pub mod composite;
pub mod llama_firewall;
pub mod mock;
pub mod model_armor;

use std::sync::Arc;

use crate::alert::{ContentToCheck, GuardrailAlert};
use crate::config::Config;
use crate::error::{ProtectorError, Result};

pub use composite::CompositeProvider;
pub use llama_firewall::LlamaFirewallProvider;
pub use mock::{AlwaysAlertProvider, MockGuardrailProvider, NeverAlertProvider};
pub use model_armor::ModelArmorProvider;

/// A threat-detection backend
pub trait GuardrailProvider: Send + Sync {
    /// Registry name of the provider
    fn name(&self) -> &str;

    /// Check one piece of content; `None` means no threat was found
    fn check_content(&self, content: &ContentToCheck) -> Option<GuardrailAlert>;
}

impl<P: GuardrailProvider + ?Sized> GuardrailProvider for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn check_content(&self, content: &ContentToCheck) -> Option<GuardrailAlert> {
        (**self).check_content(content)
    }
}

impl<P: GuardrailProvider + ?Sized> GuardrailProvider for Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn check_content(&self, content: &ContentToCheck) -> Option<GuardrailAlert> {
        (**self).check_content(content)
    }
}

/// Builds a provider from the loaded configuration
pub type ProviderFactory = fn(&Config) -> Box<dyn GuardrailProvider>;

/// A registry entry
#[derive(Clone, Copy)]
pub struct ProviderEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub factory: ProviderFactory,
}

impl ProviderEntry {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        factory: ProviderFactory,
    ) -> Self {
        Self {
            name,
            description,
            factory,
        }
    }
}

fn llama_firewall(config: &Config) -> Box<dyn GuardrailProvider> {
    Box::new(LlamaFirewallProvider::from_config(&config.llama_firewall))
}

fn model_armor(config: &Config) -> Box<dyn GuardrailProvider> {
    Box::new(ModelArmorProvider::from_config(&config.gcp_model_armor))
}

fn mock(_: &Config) -> Box<dyn GuardrailProvider> {
    Box::new(MockGuardrailProvider::new())
}

fn always_alert(_: &Config) -> Box<dyn GuardrailProvider> {
    Box::new(AlwaysAlertProvider::default())
}

fn never_alert(_: &Config) -> Box<dyn GuardrailProvider> {
    Box::new(NeverAlertProvider)
}

/// All known providers, in listing order
pub const PROVIDER_REGISTRY: &[ProviderEntry] = &[
    ProviderEntry::new(
        "LlamaFirewall",
        "Meta LlamaFirewall scanners (PROMPT_GUARD, HIDDEN_ASCII, REGEX, CODE_SHIELD)",
        llama_firewall,
    ),
    ProviderEntry::new(
        "GCPModelArmor",
        "Google Cloud Model Armor sanitize API",
        model_armor,
    ),
    ProviderEntry::new("Mock", "Configurable test provider", mock),
    ProviderEntry::new("AlwaysAlert", "Test provider that flags everything", always_alert),
    ProviderEntry::new("NeverAlert", "Test provider that flags nothing", never_alert),
];

/// Names of every registered provider
pub fn available_provider_names() -> Vec<&'static str> {
    PROVIDER_REGISTRY.iter().map(|entry| entry.name).collect()
}

/// Look up a provider by name
pub fn get_provider(name: &str, config: &Config) -> Result<Box<dyn GuardrailProvider>> {
    PROVIDER_REGISTRY
        .iter()
        .find(|entry| entry.name == name)
        .map(|entry| (entry.factory)(config))
        .ok_or_else(|| ProtectorError::UnknownProvider {
            name: name.to_string(),
            available: available_provider_names().join(", "),
        })
}

/// Build the provider the configuration asks for
///
/// A non-empty `providers` list wins over `provider` and yields a
/// [`CompositeProvider`]. Every name is resolved up front.
pub fn provider_from_config(config: &Config) -> Result<Box<dyn GuardrailProvider>> {
    if config.providers.is_empty() {
        tracing::debug!(provider = %config.provider, "selecting provider");
        return get_provider(&config.provider, config);
    }

    tracing::debug!(providers = ?config.providers, "selecting composite provider");
    let providers = config
        .providers
        .iter()
        .map(|name| get_provider(name, config))
        .collect::<Result<Vec<_>>>()?;
    Ok(Box::new(CompositeProvider::new(providers)))
}
