// Rule registry - the set of active rules, bucketed by priority.
//
// Within a bucket rules keep their registration order, and buckets are walked
// from Low to High, so evaluation order is fully determined by
// (priority, registration order).

use super::moderation_models::{Priority, RuleEvent, RuleKey};
use super::rule::Rule;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Rule registry is not initialized yet")]
    NotInitialized,

    #[error("Rule registry was already initialized")]
    AlreadyInitialized,
}

// ============================================================================
// NOTIFICATION PORT
// ============================================================================

/// Receives rule lifecycle events.
pub trait RuleListener: Send + Sync {
    fn on_event(&self, event: &RuleEvent);
}

// ============================================================================
// REGISTRY
// ============================================================================

type Buckets = BTreeMap<Priority, Vec<Arc<dyn Rule>>>;

pub struct RuleRegistry {
    buckets: RwLock<Buckets>,
    listener: Arc<dyn RuleListener>,
}

impl RuleRegistry {
    pub fn new(listener: Arc<dyn RuleListener>) -> Self {
        let buckets = Priority::ALL
            .iter()
            .map(|priority| (*priority, Vec::new()))
            .collect();

        Self {
            buckets: RwLock::new(buckets),
            listener,
        }
    }

    /// Register a rule unless it is malformed or already registered.
    ///
    /// Returns `true` if the rule was added.
    pub fn register(&self, rule: Arc<dyn Rule>) -> bool {
        let spec = rule.spec().clone();
        if !spec.is_valid() {
            tracing::warn!(priority = %spec.priority, "Refusing to register a rule without a name");
            return false;
        }

        let key = spec.key();
        {
            let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
            if buckets.values().flatten().any(|r| r.key() == key) {
                return false;
            }
            buckets.entry(spec.priority).or_default().push(rule);
        }

        self.listener.on_event(&RuleEvent::Registered(spec));
        true
    }

    /// Remove a rule if it is currently registered.
    ///
    /// Returns `true` if something was removed.
    pub fn unregister(&self, rule: &dyn Rule) -> bool {
        let spec = rule.spec().clone();
        let key = spec.key();

        let removed = {
            let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
            match buckets.get_mut(&spec.priority) {
                Some(bucket) => {
                    let before = bucket.len();
                    bucket.retain(|r| r.key() != key);
                    bucket.len() != before
                }
                None => false,
            }
        };

        if removed {
            self.listener.on_event(&RuleEvent::Unregistered(spec));
        }
        removed
    }

    /// All registered rules, lowest priority first.
    ///
    /// The returned list is a snapshot: later (un)registrations don't touch it.
    pub fn active_rules(&self) -> Vec<Arc<dyn Rule>> {
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        buckets.values().flatten().cloned().collect()
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn Rule>> {
        let key = RuleKey::from_name(name);
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        buckets.values().flatten().find(|r| r.key() == key).cloned()
    }

    pub fn len(&self) -> usize {
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        buckets.values().map(Vec::len).sum()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// HANDLE
// ============================================================================

/// The one registry of the running process.
///
/// Created empty in `main`, filled exactly once at startup and passed to
/// whoever needs the registry. Asking for the registry before that is a bug
/// in startup ordering and reported as `NotInitialized`.
#[derive(Clone, Default)]
pub struct RegistryHandle {
    cell: Arc<OnceLock<Arc<RuleRegistry>>>,
}

impl RegistryHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(&self, registry: RuleRegistry) -> Result<Arc<RuleRegistry>, RegistryError> {
        let registry = Arc::new(registry);
        self.cell
            .set(Arc::clone(&registry))
            .map_err(|_| RegistryError::AlreadyInitialized)?;
        Ok(registry)
    }

    pub fn get(&self) -> Result<Arc<RuleRegistry>, RegistryError> {
        self.cell.get().cloned().ok_or(RegistryError::NotInitialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::test_support::{RecordingListener, StubRule};
    use crate::core::moderation::RuleSpec;

    fn stub(name: &str, priority: Priority) -> Arc<dyn Rule> {
        Arc::new(StubRule::new(
            RuleSpec::new(name, priority, format!("bypass.{name}")),
            name,
        ))
    }

    fn names(rules: &[Arc<dyn Rule>]) -> Vec<String> {
        rules.iter().map(|r| r.name().to_string()).collect()
    }

    #[test]
    fn active_rules_are_ordered_by_priority_then_registration() {
        let registry = RuleRegistry::new(Arc::new(RecordingListener::default()));

        registry.register(stub("high-a", Priority::High));
        registry.register(stub("low-a", Priority::Low));
        registry.register(stub("medium-a", Priority::Medium));
        registry.register(stub("low-b", Priority::Low));
        registry.register(stub("high-b", Priority::High));

        assert_eq!(
            names(&registry.active_rules()),
            vec!["low-a", "low-b", "medium-a", "high-a", "high-b"]
        );
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let listener = Arc::new(RecordingListener::default());
        let registry = RuleRegistry::new(listener.clone());
        let rule = stub("address", Priority::Low);

        assert!(registry.register(Arc::clone(&rule)));
        assert!(!registry.register(Arc::clone(&rule)));
        // same name, different object
        assert!(!registry.register(stub("Address", Priority::Low)));

        assert_eq!(registry.len(), 1);
        assert_eq!(listener.events.lock().unwrap().len(), 1);
    }

    #[test]
    fn nameless_rule_is_rejected() {
        let registry = RuleRegistry::new(Arc::new(RecordingListener::default()));
        assert!(!registry.register(stub("   ", Priority::Low)));
        assert!(registry.is_empty());
    }

    #[test]
    fn unregister_unknown_rule_is_a_no_op() {
        let listener = Arc::new(RecordingListener::default());
        let registry = RuleRegistry::new(listener.clone());
        registry.register(stub("words", Priority::Medium));

        let stranger = stub("address", Priority::Low);
        assert!(!registry.unregister(stranger.as_ref()));

        assert_eq!(names(&registry.active_rules()), vec!["words"]);
        let events = listener.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], RuleEvent::Registered(_)));
    }

    #[test]
    fn unregister_removes_and_notifies() {
        let listener = Arc::new(RecordingListener::default());
        let registry = RuleRegistry::new(listener.clone());
        let rule = stub("words", Priority::Medium);
        registry.register(Arc::clone(&rule));

        assert!(registry.unregister(rule.as_ref()));
        assert!(registry.is_empty());
        assert!(registry.find("words").is_none());

        let events = listener.events.lock().unwrap();
        assert!(matches!(&events[1], RuleEvent::Unregistered(spec) if spec.name == "words"));
    }

    #[test]
    fn snapshot_survives_later_unregister() {
        let registry = RuleRegistry::new(Arc::new(RecordingListener::default()));
        let rule = stub("address", Priority::Low);
        registry.register(Arc::clone(&rule));

        let snapshot = registry.active_rules();
        registry.unregister(rule.as_ref());

        assert_eq!(names(&snapshot), vec!["address"]);
        assert!(registry.active_rules().is_empty());
    }

    #[test]
    fn handle_fails_before_init_and_only_inits_once() {
        let handle = RegistryHandle::new();
        assert_eq!(handle.get().err(), Some(RegistryError::NotInitialized));

        let listener = Arc::new(RecordingListener::default());
        handle.init(RuleRegistry::new(listener.clone())).unwrap();
        assert!(handle.get().is_ok());

        let again = handle.init(RuleRegistry::new(listener));
        assert_eq!(again.err(), Some(RegistryError::AlreadyInitialized));
    }
}
