use crate::core::moderation::{RuleEvent, RuleListener};

/// Writes rule lifecycle events to the log, tagged with the chat prefix.
pub struct TracingRuleListener {
    prefix: String,
}

impl TracingRuleListener {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl RuleListener for TracingRuleListener {
    fn on_event(&self, event: &RuleEvent) {
        match event {
            RuleEvent::Registered(spec) => tracing::info!(
                priority = %spec.priority,
                bypass = %spec.bypass_permission,
                "{} registered new check {}",
                self.prefix,
                spec.name
            ),
            RuleEvent::Unregistered(spec) => tracing::info!(
                priority = %spec.priority,
                "{} unregistered check {}",
                self.prefix,
                spec.name
            ),
        }
    }
}
