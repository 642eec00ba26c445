// Moderation pipeline - runs one message through every active rule.
//
// For each rule, in priority order:
// - skip it if the subject holds its bypass permission
// - evaluate it
// - on violation: send warnings, count the violation, punish every Nth time
//
// Rules are independent. One rule failing (usually missing configuration)
// doesn't stop the others; failures are collected and returned at the end.

use super::moderation_models::{ModerationOutcome, Subject, ViolationReport};
use super::punishment::{CommandExecutor, PunishmentDispatcher};
use super::rule::{Rule, RuleError};
use super::rule_registry::RuleRegistry;
use super::violation_tracker::ViolationTracker;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

/// The hosting side couldn't deliver a warning or run a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Delivery failed: {0}")]
pub struct DeliveryError(pub String);

#[derive(Debug, Error)]
#[error("Rule '{rule}' failed: {error}")]
pub struct RuleFailure {
    pub rule: String,
    pub error: RuleError,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Some rules failed. `outcome` holds what the remaining rules produced.
    #[error("{} rule(s) failed to evaluate", .failures.len())]
    RuleFailures {
        failures: Vec<RuleFailure>,
        outcome: ModerationOutcome,
    },
}

// ============================================================================
// MESSAGE SOURCE PORT
// ============================================================================

/// What the hosting runtime provides alongside each message.
#[async_trait]
pub trait MessageContext: Send + Sync {
    /// Whether `subject` holds `permission`.
    fn has_permission(&self, subject: &Subject, permission: &str) -> bool;

    /// Show a warning to `subject`.
    async fn deliver_warning(&self, subject: &Subject, text: &str) -> Result<(), DeliveryError>;
}

// ============================================================================
// PIPELINE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineMode {
    /// Every rule is evaluated and escalated independently.
    #[default]
    AllRules,
    /// Stop after the first rule the message violates.
    FirstMatch,
}

pub struct ModerationPipeline {
    registry: Arc<RuleRegistry>,
    tracker: Arc<ViolationTracker>,
    dispatcher: PunishmentDispatcher,
    mode: PipelineMode,
}

impl ModerationPipeline {
    pub fn new(
        registry: Arc<RuleRegistry>,
        tracker: Arc<ViolationTracker>,
        executor: Arc<dyn CommandExecutor>,
        mode: PipelineMode,
    ) -> Self {
        Self {
            registry,
            tracker,
            dispatcher: PunishmentDispatcher::new(executor),
            mode,
        }
    }

    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    pub fn tracker(&self) -> &Arc<ViolationTracker> {
        &self.tracker
    }

    /// Run `message` from `subject` through all active rules.
    pub async fn process(
        &self,
        subject: &Subject,
        message: &str,
        ctx: &dyn MessageContext,
    ) -> Result<ModerationOutcome, PipelineError> {
        let mut outcome = ModerationOutcome::default();
        let mut failures = Vec::new();

        for rule in self.registry.active_rules() {
            if ctx.has_permission(subject, &rule.spec().bypass_permission) {
                outcome.bypassed.push(rule.name().to_string());
                continue;
            }

            match self.apply_rule(rule.as_ref(), subject, message, ctx, &mut outcome).await {
                Ok(true) if self.mode == PipelineMode::FirstMatch => break,
                Ok(_) => {}
                Err(error) => {
                    tracing::error!(rule = %rule.name(), "Rule evaluation failed: {}", error);
                    failures.push(RuleFailure {
                        rule: rule.name().to_string(),
                        error,
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(outcome)
        } else {
            Err(PipelineError::RuleFailures { failures, outcome })
        }
    }

    /// Evaluate one rule and escalate on violation. Returns whether it was violated.
    async fn apply_rule(
        &self,
        rule: &dyn Rule,
        subject: &Subject,
        message: &str,
        ctx: &dyn MessageContext,
        outcome: &mut ModerationOutcome,
    ) -> Result<bool, RuleError> {
        if !rule.evaluate(subject, message)? {
            return Ok(false);
        }

        // Read everything the escalation needs before acting on any of it.
        let warnings = if rule.is_warning_enabled()? {
            rule.warning_messages()?
        } else {
            Vec::new()
        };
        let threshold = rule.punishment_threshold()?;
        let command = rule.punishment_command()?;

        for template in &warnings {
            let text = rule.substitute_placeholders(template, subject);
            if let Err(e) = ctx.deliver_warning(subject, &text).await {
                tracing::warn!(rule = %rule.name(), "Failed to deliver warning: {}", e);
                outcome.delivery_failures += 1;
            }
        }

        let count = self.tracker.record_violation(subject.id, &rule.key());
        let punished = ViolationTracker::should_punish(count, threshold);

        tracing::info!(
            rule = %rule.name(),
            user_id = subject.id.user_id,
            guild_id = subject.id.guild_id,
            count,
            punished,
            "Rule violated"
        );

        if punished {
            if let Err(e) = self.dispatcher.dispatch(rule, &command, subject).await {
                tracing::warn!(rule = %rule.name(), "Failed to execute punishment: {}", e);
                outcome.delivery_failures += 1;
            }
        }

        outcome.violations.push(ViolationReport {
            rule: rule.name().to_string(),
            count,
            punished,
        });
        Ok(true)
    }
}
