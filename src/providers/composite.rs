//! Fan-out over several providers

use serde_json::{Map, Value};

use super::GuardrailProvider;
use crate::alert::{ContentToCheck, GuardrailAlert};

/// Runs every member provider and merges their alerts
///
/// Members run in order and all of them run, even after the first alert,
/// so the merged alert names every provider that objected.
pub struct CompositeProvider {
    providers: Vec<Box<dyn GuardrailProvider>>,
}

impl CompositeProvider {
    pub fn new(providers: Vec<Box<dyn GuardrailProvider>>) -> Self {
        Self { providers }
    }

    /// Names of the member providers, in order
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    fn merge(mut alerts: Vec<(String, GuardrailAlert)>) -> Option<GuardrailAlert> {
        if alerts.len() <= 1 {
            return alerts
                .pop()
                .map(|(provider, alert)| alert.with("provider", provider));
        }

        let explanation = alerts
            .iter()
            .map(|(provider, alert)| format!("[{}] {}", provider, alert.explanation))
            .collect::<Vec<_>>()
            .join("; ");

        let providers: Vec<Value> = alerts
            .iter()
            .map(|(provider, _)| Value::String(provider.clone()))
            .collect();

        let details: Vec<Value> = alerts
            .into_iter()
            .map(|(provider, alert)| {
                let mut entry = Map::new();
                entry.insert("provider".to_string(), Value::String(provider));
                entry.insert("explanation".to_string(), Value::String(alert.explanation));
                entry.insert("data".to_string(), Value::Object(alert.data));
                Value::Object(entry)
            })
            .collect();

        Some(
            GuardrailAlert::new(explanation)
                .with("providers", providers)
                .with("alerts", details),
        )
    }
}

impl GuardrailProvider for CompositeProvider {
    fn name(&self) -> &str {
        "Composite"
    }

    fn check_content(&self, content: &ContentToCheck) -> Option<GuardrailAlert> {
        let alerts: Vec<(String, GuardrailAlert)> = self
            .providers
            .iter()
            .filter_map(|provider| {
                let alert = provider.check_content(content)?;
                tracing::debug!(provider = provider.name(), "member provider alerted");
                Some((provider.name().to_string(), alert))
            })
            .collect();

        Self::merge(alerts)
    }
}
