// Punishment dispatch - turns a rule's command template into a concrete
// command and hands it to whoever can run it.

use super::moderation_models::Subject;
use super::moderation_pipeline::DeliveryError;
use super::rule::Rule;
use async_trait::async_trait;
use std::sync::Arc;

/// Runs rendered punishment commands with elevated privileges.
///
/// The dispatcher passes commands through untouched; validating their syntax
/// is the executor's business.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, subject: &Subject, command: &str) -> Result<(), DeliveryError>;
}

pub struct PunishmentDispatcher {
    executor: Arc<dyn CommandExecutor>,
}

impl PunishmentDispatcher {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    /// Fill in `template` for `subject`.
    pub fn render(&self, rule: &dyn Rule, template: &str, subject: &Subject) -> String {
        rule.substitute_placeholders(template, subject)
    }

    /// Render `template` and execute it. Executor failures are returned,
    /// never retried.
    pub async fn dispatch(
        &self,
        rule: &dyn Rule,
        template: &str,
        subject: &Subject,
    ) -> Result<(), DeliveryError> {
        let command = self.render(rule, template, subject);
        tracing::info!(
            rule = %rule.name(),
            user_id = subject.id.user_id,
            guild_id = subject.id.guild_id,
            command = %command,
            "Dispatching punishment"
        );
        self.executor.execute(subject, &command).await
    }
}
