// Address rule - flags messages advertising domains or IPv4 addresses.
//
// Matching runs as two passes over the whitespace-separated tokens:
// - domain pass: every domain-shaped substring is checked against the domain
//   allowlist by SUBSTRING containment ("example.com" also clears
//   "play.example.com")
// - IPv4 pass: every address-shaped substring is checked against the address
//   allowlist by EXACT equality
// The first candidate that survives its allowlist ends evaluation.

use super::moderation_models::{Priority, RuleSpec, Subject};
use super::rule::{keys, tokenize, ConfigProvider, Rule, RuleError, RuleSettings};
use regex::Regex;
use std::sync::{Arc, LazyLock};

/// Shortest message/token the domain pass looks at.
pub const MINIMUM_DOMAIN_CHARS: usize = 6;
/// Shortest message/token the IPv4 pass looks at.
pub const MINIMUM_ADDRESS_CHARS: usize = 7;

pub const ADDRESS_SECTION: &str = "address";
pub const ALLOWED_DOMAINS: &str = "allowed_domains";
pub const ALLOWED_ADDRESSES: &str = "allowed_addresses";

static DOMAIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:[a-z0-9](?:[a-z0-9\-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}")
        .expect("domain pattern is valid")
});

static IPV4_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:(?:25[0-5]|2[0-4]\d|[01]?\d\d?)\.){3}(?:25[0-5]|2[0-4]\d|[01]?\d\d?)\b")
        .expect("ipv4 pattern is valid")
});

/// The candidate that caused a violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressMatch {
    Domain(String),
    Ipv4(String),
}

pub struct AddressRule {
    spec: RuleSpec,
    settings: RuleSettings,
    prefix: String,
}

impl AddressRule {
    pub fn new(config: Arc<dyn ConfigProvider>, prefix: impl Into<String>) -> Self {
        Self {
            spec: RuleSpec::new("Address", Priority::Low, "safechat.bypass.address"),
            settings: RuleSettings::new(config, ADDRESS_SECTION),
            prefix: prefix.into(),
        }
    }

    /// Run both passes and return the first candidate no allowlist clears.
    pub fn find_violation(&self, message: &str) -> Result<Option<AddressMatch>, RuleError> {
        if !self.is_enabled()? || message.is_empty() {
            return Ok(None);
        }

        let length = message.chars().count();

        if length >= MINIMUM_DOMAIN_CHARS {
            let allowed = self.settings.strings(ALLOWED_DOMAINS)?;
            if let Some(domain) = first_unallowed_domain(message, &allowed) {
                return Ok(Some(AddressMatch::Domain(domain)));
            }
        }

        if length >= MINIMUM_ADDRESS_CHARS {
            let allowed = self.settings.strings(ALLOWED_ADDRESSES)?;
            if let Some(address) = first_unallowed_address(message, &allowed) {
                return Ok(Some(AddressMatch::Ipv4(address)));
            }
        }

        Ok(None)
    }
}

impl Rule for AddressRule {
    fn spec(&self) -> &RuleSpec {
        &self.spec
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn evaluate(&self, subject: &Subject, message: &str) -> Result<bool, RuleError> {
        let found = self.find_violation(message)?;
        if let Some(candidate) = &found {
            tracing::debug!(
                user_id = subject.id.user_id,
                guild_id = subject.id.guild_id,
                ?candidate,
                "Address rule matched"
            );
        }
        Ok(found.is_some())
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

// ============================================================================
// MATCHING STAGES
// ============================================================================

/// Tokens at least `min_chars` long.
fn long_tokens(message: &str, min_chars: usize) -> impl Iterator<Item = &str> {
    tokenize(message).filter(move |token| token.chars().count() >= min_chars)
}

/// Every domain-shaped substring of `token`, lower-cased.
fn domain_candidates(token: &str) -> impl Iterator<Item = String> + '_ {
    DOMAIN_REGEX
        .find_iter(token)
        .map(|m| m.as_str().to_lowercase())
}

/// Every IPv4-shaped substring of `token`.
fn address_candidates(token: &str) -> impl Iterator<Item = &str> {
    IPV4_REGEX.find_iter(token).map(|m| m.as_str())
}

/// A domain is allowed when any allowlist entry is contained in it.
pub fn is_allowed_domain(candidate: &str, allowed: &[String]) -> bool {
    allowed.iter().any(|entry| candidate.contains(entry.as_str()))
}

/// An address is allowed only when it equals an allowlist entry.
pub fn is_allowed_address(candidate: &str, allowed: &[String]) -> bool {
    allowed.iter().any(|entry| entry == candidate)
}

pub fn first_unallowed_domain(message: &str, allowed: &[String]) -> Option<String> {
    long_tokens(message, MINIMUM_DOMAIN_CHARS)
        .flat_map(domain_candidates)
        .find(|candidate| !is_allowed_domain(candidate, allowed))
}

pub fn first_unallowed_address(message: &str, allowed: &[String]) -> Option<String> {
    long_tokens(message, MINIMUM_ADDRESS_CHARS)
        .flat_map(address_candidates)
        .find(|candidate| !is_allowed_address(candidate, allowed))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::test_support::config_with;
    use serde_json::json;

    fn rule_with(domains: &[&str], addresses: &[&str]) -> AddressRule {
        let config = config_with(
            ADDRESS_SECTION,
            json!({
                "enabled": true,
                "warning_enabled": true,
                "warning_messages": ["{prefix} no ads, {player}"],
                "punish_after": 3,
                "punish_command": "timeout {player_id} 600 Advertising",
                "allowed_domains": domains,
                "allowed_addresses": addresses,
            }),
        );
        AddressRule::new(config, "[SafeChat]")
    }

    fn subject() -> Subject {
        Subject::new(1, 2, "Steve")
    }

    #[test]
    fn allowlisted_domain_is_suppressed_by_containment() {
        let rule = rule_with(&["example.com"], &[]);
        assert!(!rule.evaluate(&subject(), "visit example.com now").unwrap());
        assert!(!rule.evaluate(&subject(), "visit play.example.com now").unwrap());
    }

    #[test]
    fn domain_not_containing_allowlist_entry_is_flagged() {
        let rule = rule_with(&["example.com"], &[]);
        assert!(rule.evaluate(&subject(), "visit evilexample.org now").unwrap());
        assert_eq!(
            rule.find_violation("visit evilexample.org now").unwrap(),
            Some(AddressMatch::Domain("evilexample.org".to_string()))
        );
    }

    #[test]
    fn domain_matches_are_lowercased_before_allowlist_check() {
        let rule = rule_with(&["example.com"], &[]);
        assert!(!rule.evaluate(&subject(), "visit EXAMPLE.COM now").unwrap());
    }

    #[test]
    fn allowlisted_address_requires_exact_match() {
        let rule = rule_with(&[], &["192.168.1.5"]);
        assert!(!rule.evaluate(&subject(), "ping 192.168.1.5").unwrap());
        assert!(rule.evaluate(&subject(), "ping 192.168.1.6").unwrap());
    }

    #[test]
    fn address_allowlist_does_not_use_containment() {
        // "192.168.1.5" is a substring of "192.168.1.55" but must not clear it
        let rule = rule_with(&[], &["192.168.1.5"]);
        assert_eq!(
            rule.find_violation("ping 192.168.1.55").unwrap(),
            Some(AddressMatch::Ipv4("192.168.1.55".to_string()))
        );
    }

    #[test]
    fn six_char_token_is_checked_five_char_token_is_not() {
        let rule = rule_with(&[], &[]);
        assert!(rule.evaluate(&subject(), "xy.com").unwrap());
        assert!(!rule.evaluate(&subject(), "x.com padding").unwrap());
    }

    #[test]
    fn every_occurrence_in_a_token_is_checked() {
        let rule = rule_with(&["example.com"], &[]);
        assert!(rule
            .evaluate(&subject(), "example.com,badsite.net")
            .unwrap());
    }

    #[test]
    fn disabled_rule_never_flags() {
        let config = config_with(
            ADDRESS_SECTION,
            json!({ "enabled": false }),
        );
        let rule = AddressRule::new(config, "!");
        assert!(!rule.evaluate(&subject(), "go to evil.org").unwrap());
    }

    #[test]
    fn empty_and_plain_messages_are_clean() {
        let rule = rule_with(&[], &[]);
        assert!(!rule.evaluate(&subject(), "").unwrap());
        assert!(!rule.evaluate(&subject(), "hello there friends").unwrap());
    }

    #[test]
    fn missing_allowlist_is_an_error() {
        let config = config_with(ADDRESS_SECTION, json!({ "enabled": true }));
        let rule = AddressRule::new(config, "!");
        assert!(rule.evaluate(&subject(), "go to evil.org").is_err());
    }

    #[test]
    fn evaluation_is_repeatable() {
        let rule = rule_with(&["example.com"], &["10.0.0.1"]);
        for message in ["visit evilexample.org now", "ping 10.0.0.1", "hi"] {
            let first = rule.evaluate(&subject(), message).unwrap();
            let second = rule.evaluate(&subject(), message).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn stage_functions_keep_the_allowlist_asymmetry() {
        let allowed = vec!["example.com".to_string()];
        assert!(is_allowed_domain("shop.example.com", &allowed));
        assert!(!is_allowed_address("shop.example.com", &allowed));
        assert!(is_allowed_address("example.com", &allowed));
    }
}
