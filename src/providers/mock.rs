//! Deterministic providers for tests and dry runs

use std::sync::RwLock;

use super::GuardrailProvider;
use crate::alert::{ContentToCheck, GuardrailAlert};

/// Provider whose verdict is set from the outside
///
/// Returns `None` until [`MockGuardrailProvider::set_trigger_alert`] is
/// called. The trigger sits behind a lock so a shared instance can be
/// reconfigured between checks.
#[derive(Debug, Default)]
pub struct MockGuardrailProvider {
    trigger: RwLock<Option<String>>,
}

impl MockGuardrailProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alert with `explanation` on every following check
    pub fn set_trigger_alert(&self, explanation: impl Into<String>) {
        if let Ok(mut trigger) = self.trigger.write() {
            *trigger = Some(explanation.into());
        }
    }

    /// Go back to never alerting
    pub fn unset_trigger_alert(&self) {
        if let Ok(mut trigger) = self.trigger.write() {
            *trigger = None;
        }
    }
}

impl GuardrailProvider for MockGuardrailProvider {
    fn name(&self) -> &str {
        "Mock"
    }

    fn check_content(&self, _content: &ContentToCheck) -> Option<GuardrailAlert> {
        self.trigger
            .read()
            .ok()?
            .as_ref()
            .map(|explanation| GuardrailAlert::new(explanation.as_str()).with("mock", true))
    }
}

/// Provider that flags every piece of content
#[derive(Debug, Clone)]
pub struct AlwaysAlertProvider {
    alert_text: String,
}

impl AlwaysAlertProvider {
    pub fn new(alert_text: impl Into<String>) -> Self {
        Self {
            alert_text: alert_text.into(),
        }
    }
}

impl Default for AlwaysAlertProvider {
    fn default() -> Self {
        Self::new("Security threat detected")
    }
}

impl GuardrailProvider for AlwaysAlertProvider {
    fn name(&self) -> &str {
        "AlwaysAlert"
    }

    fn check_content(&self, content: &ContentToCheck) -> Option<GuardrailAlert> {
        Some(
            GuardrailAlert::new(self.alert_text.as_str())
                .with("always_alert", true)
                .with("content_type", content.content_type.as_str())
                .with("tool_name", content.tool_name_value()),
        )
    }
}

/// Provider that never flags anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverAlertProvider;

impl GuardrailProvider for NeverAlertProvider {
    fn name(&self) -> &str {
        "NeverAlert"
    }

    fn check_content(&self, _content: &ContentToCheck) -> Option<GuardrailAlert> {
        None
    }
}
