// Test doubles shared by the moderation unit tests.

use super::{
    keys, CommandExecutor, ConfigError, DeliveryError, MessageContext, Rule, RuleError, RuleEvent,
    RuleListener, RuleSpec, Subject,
};
use crate::infra::config::JsonConfigStore;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// A config store holding a single section.
pub fn config_with(section: &str, values: Value) -> Arc<JsonConfigStore> {
    let mut document = serde_json::Map::new();
    document.insert(section.to_string(), values);
    Arc::new(JsonConfigStore::from_value(
        "safechat-test.json",
        Value::Object(document),
    ))
}

/// A rule whose behaviour is fixed at construction.
pub struct StubRule {
    pub spec: RuleSpec,
    /// Messages containing this needle violate the rule.
    pub needle: String,
    pub warnings: Vec<String>,
    pub threshold: i64,
    /// `None` behaves like a missing `punish_command` setting.
    pub command: Option<String>,
    pub fail: bool,
    pub evaluations: Mutex<u32>,
}

impl StubRule {
    pub fn new(spec: RuleSpec, needle: &str) -> Self {
        Self {
            spec,
            needle: needle.to_string(),
            warnings: vec!["{prefix} stop it {player}".to_string()],
            threshold: 3,
            command: Some("kick {player_id} {rule}".to_string()),
            fail: false,
            evaluations: Mutex::new(0),
        }
    }

    pub fn evaluations(&self) -> u32 {
        *self.evaluations.lock().unwrap()
    }
}

impl Rule for StubRule {
    fn spec(&self) -> &RuleSpec {
        &self.spec
    }

    fn prefix(&self) -> &str {
        "[Test]"
    }

    fn evaluate(&self, _subject: &Subject, message: &str) -> Result<bool, RuleError> {
        *self.evaluations.lock().unwrap() += 1;
        if self.fail {
            return Err(RuleError::Config(ConfigError::Missing {
                section: self.spec.name.clone(),
                key: "enabled".to_string(),
            }));
        }
        Ok(message.contains(&self.needle))
    }

    fn is_enabled(&self) -> Result<bool, RuleError> {
        Ok(true)
    }

    fn is_warning_enabled(&self) -> Result<bool, RuleError> {
        Ok(!self.warnings.is_empty())
    }

    fn warning_messages(&self) -> Result<Vec<String>, RuleError> {
        Ok(self.warnings.clone())
    }

    fn punishment_threshold(&self) -> Result<i64, RuleError> {
        Ok(self.threshold)
    }

    fn punishment_command(&self) -> Result<String, RuleError> {
        self.command.clone().ok_or_else(|| {
            RuleError::Config(ConfigError::Missing {
                section: self.spec.name.clone(),
                key: keys::PUNISH_COMMAND.to_string(),
            })
        })
    }
}

/// Listener that remembers every event.
#[derive(Default)]
pub struct RecordingListener {
    pub events: Mutex<Vec<RuleEvent>>,
}

impl RuleListener for RecordingListener {
    fn on_event(&self, event: &RuleEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Executor that remembers every command.
#[derive(Default)]
pub struct RecordingExecutor {
    pub commands: Mutex<Vec<String>>,
    pub fail: bool,
}

#[async_trait]
impl CommandExecutor for RecordingExecutor {
    async fn execute(&self, _subject: &Subject, command: &str) -> Result<(), DeliveryError> {
        self.commands.lock().unwrap().push(command.to_string());
        if self.fail {
            return Err(DeliveryError("executor offline".to_string()));
        }
        Ok(())
    }
}

/// Message context with a fixed permission set that records warnings.
#[derive(Default)]
pub struct TestContext {
    pub permissions: HashSet<String>,
    pub warnings: Mutex<Vec<String>>,
}

impl TestContext {
    pub fn with_permission(permission: &str) -> Self {
        let mut ctx = Self::default();
        ctx.permissions.insert(permission.to_string());
        ctx
    }
}

#[async_trait]
impl MessageContext for TestContext {
    fn has_permission(&self, _subject: &Subject, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    async fn deliver_warning(&self, _subject: &Subject, text: &str) -> Result<(), DeliveryError> {
        self.warnings.lock().unwrap().push(text.to_string());
        Ok(())
    }
}
