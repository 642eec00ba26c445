// Blocked words rule - flags messages containing a configured word.

use super::moderation_models::{Priority, RuleSpec, Subject};
use super::rule::{keys, tokenize, ConfigProvider, Rule, RuleError, RuleSettings};
use std::sync::Arc;

pub const WORDS_SECTION: &str = "words";
pub const BLOCKED_WORDS: &str = "blocked_words";

pub struct BlockedWordsRule {
    spec: RuleSpec,
    settings: RuleSettings,
    prefix: String,
}

impl BlockedWordsRule {
    pub fn new(config: Arc<dyn ConfigProvider>, prefix: impl Into<String>) -> Self {
        Self {
            spec: RuleSpec::new("Words", Priority::Medium, "safechat.bypass.words"),
            settings: RuleSettings::new(config, WORDS_SECTION),
            prefix: prefix.into(),
        }
    }
}

/// Lower-case a token and strip punctuation around it, so "Word!" matches "word".
fn normalize(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

impl Rule for BlockedWordsRule {
    fn spec(&self) -> &RuleSpec {
        &self.spec
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn evaluate(&self, _subject: &Subject, message: &str) -> Result<bool, RuleError> {
        if !self.is_enabled()? || message.is_empty() {
            return Ok(false);
        }

        let blocked: Vec<String> = self
            .settings
            .strings(BLOCKED_WORDS)?
            .iter()
            .map(|w| w.to_lowercase())
            .collect();

        Ok(tokenize(message)
            .map(normalize)
            .any(|token| !token.is_empty() && blocked.contains(&token)))
    }

    fn is_enabled(&self) -> Result<bool, RuleError> {
        self.settings.bool(keys::ENABLED)
    }

    fn is_warning_enabled(&self) -> Result<bool, RuleError> {
        self.settings.bool(keys::WARNING_ENABLED)
    }

    fn warning_messages(&self) -> Result<Vec<String>, RuleError> {
        self.settings.strings(keys::WARNING_MESSAGES)
    }

    fn punishment_threshold(&self) -> Result<i64, RuleError> {
        self.settings.int(keys::PUNISH_AFTER)
    }

    fn punishment_command(&self) -> Result<String, RuleError> {
        self.settings.string(keys::PUNISH_COMMAND)
    }
}
