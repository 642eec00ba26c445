// Moderation domain models - data structures shared by rules, the registry,
// the violation tracker and the pipeline.
//
// These are pure domain types with no Discord dependencies.
// The Discord layer converts its own message/member types into these.

use serde::{Deserialize, Serialize};

/// Evaluation tier of a rule. Lower tiers run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// All tiers in evaluation order.
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "Low"),
            Priority::Medium => write!(f, "Medium"),
            Priority::High => write!(f, "High"),
        }
    }
}

/// Identity of a rule inside the registry and the violation tracker.
///
/// Derived from the rule name, so two rule objects with the same name are the
/// same rule as far as membership and counters are concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleKey(String);

impl RuleKey {
    pub fn from_name(name: &str) -> Self {
        Self(name.trim().to_lowercase())
    }
}

impl std::fmt::Display for RuleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable metadata describing a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSpec {
    pub name: String,
    pub priority: Priority,
    /// Permission that grants immunity from this rule.
    pub bypass_permission: String,
}

impl RuleSpec {
    pub fn new(
        name: impl Into<String>,
        priority: Priority,
        bypass_permission: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            bypass_permission: bypass_permission.into(),
        }
    }

    pub fn key(&self) -> RuleKey {
        RuleKey::from_name(&self.name)
    }

    /// A spec without a name can't be told apart from any other, so the
    /// registry refuses it.
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

/// A message author, scoped to the guild they wrote in.
///
/// **Why both ids?**
/// Users can be in multiple guilds, and violations are tracked separately in
/// each one.
#[derive(Hash, Eq, PartialEq, Clone, Copy, Debug)]
pub struct SubjectId {
    pub user_id: u64,
    pub guild_id: u64,
}

/// The subject being evaluated (and possibly punished).
#[derive(Debug, Clone)]
pub struct Subject {
    pub id: SubjectId,
    pub display_name: String,
}

impl Subject {
    pub fn new(user_id: u64, guild_id: u64, display_name: impl Into<String>) -> Self {
        Self {
            id: SubjectId { user_id, guild_id },
            display_name: display_name.into(),
        }
    }
}

/// Lifecycle notifications emitted by the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleEvent {
    Registered(RuleSpec),
    Unregistered(RuleSpec),
}

/// One confirmed violation produced while processing a message.
#[derive(Debug, Clone, PartialEq)]
pub struct ViolationReport {
    pub rule: String,
    /// Violation count for this subject/rule after this message.
    pub count: u64,
    /// Whether this violation crossed the punishment threshold.
    pub punished: bool,
}

/// Result of running a message through the pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModerationOutcome {
    pub violations: Vec<ViolationReport>,
    /// Rules skipped because the subject holds their bypass permission.
    pub bypassed: Vec<String>,
    /// Warnings or commands the hosting side failed to deliver.
    pub delivery_failures: usize,
}

impl ModerationOutcome {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    #[allow(dead_code)]
    pub fn punished(&self) -> bool {
        self.violations.iter().any(|v| v.punished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priorities_are_ordered_low_to_high() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
        let mut sorted = Priority::ALL.to_vec();
        sorted.sort();
        assert_eq!(sorted, Priority::ALL.to_vec());
    }

    #[test]
    fn rule_key_ignores_case_and_padding() {
        assert_eq!(RuleKey::from_name(" Address "), RuleKey::from_name("address"));
    }

    #[test]
    fn blank_spec_is_invalid() {
        assert!(!RuleSpec::new("  ", Priority::Low, "x").is_valid());
        assert!(RuleSpec::new("Address", Priority::Low, "x").is_valid());
    }
}
