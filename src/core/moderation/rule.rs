// The rule contract - what every moderation check has to provide.
//
// A rule decides whether a message violates it and carries its own warning and
// punishment policy. All of that policy lives in configuration, which rules
// read through the `ConfigProvider` port on every call instead of caching it.

use super::moderation_models::{RuleKey, RuleSpec, Subject};
use regex::{Captures, Regex};
use std::sync::{Arc, LazyLock};
use thiserror::Error;

/// Replaced with the subject's display name.
pub const PLAYER_PLACEHOLDER: &str = "{player}";
/// Replaced with the subject's user id.
pub const PLAYER_ID_PLACEHOLDER: &str = "{player_id}";
/// Replaced with the configured chat prefix.
pub const PREFIX_PLACEHOLDER: &str = "{prefix}";
/// Replaced with the rule name.
pub const RULE_PLACEHOLDER: &str = "{rule}";

static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(?:player_id|player|prefix|rule)\}").expect("placeholder pattern is valid")
});

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration value '{key}' in section '{section}'")]
    Missing { section: String, key: String },

    #[error("Configuration value '{key}' in section '{section}' is not a {expected}")]
    WrongType {
        section: String,
        key: String,
        expected: &'static str,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

// ============================================================================
// CONFIGURATION PORT
// ============================================================================

/// Read-only access to named configuration values, grouped by section.
///
/// A missing value is an error, never a default: moderation behaviour must be
/// spelled out in configuration.
pub trait ConfigProvider: Send + Sync {
    fn get_bool(&self, section: &str, key: &str) -> Result<bool, ConfigError>;
    fn get_int(&self, section: &str, key: &str) -> Result<i64, ConfigError>;
    fn get_string(&self, section: &str, key: &str) -> Result<String, ConfigError>;
    fn get_strings(&self, section: &str, key: &str) -> Result<Vec<String>, ConfigError>;
}

/// Keys every rule section carries.
pub mod keys {
    pub const ENABLED: &str = "enabled";
    pub const WARNING_ENABLED: &str = "warning_enabled";
    pub const WARNING_MESSAGES: &str = "warning_messages";
    pub const PUNISH_AFTER: &str = "punish_after";
    pub const PUNISH_COMMAND: &str = "punish_command";
}

/// A rule's view of its own configuration section.
#[derive(Clone)]
pub struct RuleSettings {
    provider: Arc<dyn ConfigProvider>,
    section: &'static str,
}

impl RuleSettings {
    pub fn new(provider: Arc<dyn ConfigProvider>, section: &'static str) -> Self {
        Self { provider, section }
    }

    pub fn bool(&self, key: &str) -> Result<bool, RuleError> {
        Ok(self.provider.get_bool(self.section, key)?)
    }

    pub fn int(&self, key: &str) -> Result<i64, RuleError> {
        Ok(self.provider.get_int(self.section, key)?)
    }

    pub fn string(&self, key: &str) -> Result<String, RuleError> {
        Ok(self.provider.get_string(self.section, key)?)
    }

    pub fn strings(&self, key: &str) -> Result<Vec<String>, RuleError> {
        Ok(self.provider.get_strings(self.section, key)?)
    }
}

// ============================================================================
// RULE TRAIT
// ============================================================================

/// A single moderation check.
///
/// `evaluate` must not touch shared state; counting violations is the
/// pipeline's job.
pub trait Rule: Send + Sync {
    fn spec(&self) -> &RuleSpec;

    /// Prefix substituted for `{prefix}` in warnings and commands.
    fn prefix(&self) -> &str;

    /// Whether `message` violates this rule.
    fn evaluate(&self, subject: &Subject, message: &str) -> Result<bool, RuleError>;

    fn is_enabled(&self) -> Result<bool, RuleError>;

    fn is_warning_enabled(&self) -> Result<bool, RuleError>;

    /// Warning templates sent to the subject on each violation.
    fn warning_messages(&self) -> Result<Vec<String>, RuleError>;

    /// Punish every N violations. Zero or negative disables punishment.
    fn punishment_threshold(&self) -> Result<i64, RuleError>;

    /// Command template handed to the command executor on punishment.
    fn punishment_command(&self) -> Result<String, RuleError>;

    fn substitute_placeholders(&self, template: &str, subject: &Subject) -> String {
        render_placeholders(template, subject, self.spec(), self.prefix())
    }

    fn key(&self) -> RuleKey {
        self.spec().key()
    }

    fn name(&self) -> &str {
        &self.spec().name
    }
}

/// Replace the known placeholders in `template`. Anything else is left as is.
///
/// Substituted values are never scanned again, so a display name that looks
/// like a placeholder stays literal.
pub fn render_placeholders(template: &str, subject: &Subject, spec: &RuleSpec, prefix: &str) -> String {
    PLACEHOLDER_REGEX
        .replace_all(template, |caps: &Captures| match &caps[0] {
            PLAYER_ID_PLACEHOLDER => subject.id.user_id.to_string(),
            PLAYER_PLACEHOLDER => subject.display_name.clone(),
            PREFIX_PLACEHOLDER => prefix.to_string(),
            RULE_PLACEHOLDER => spec.name.clone(),
            other => other.to_string(),
        })
        .into_owned()
}

/// Split a message on whitespace the way every rule does.
pub fn tokenize(message: &str) -> impl Iterator<Item = &str> {
    message.split_whitespace()
}
