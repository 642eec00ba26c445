// Violation tracker - per subject, per rule violation counters.
//
// Counters only ever go up while a subject is around. Punishment is periodic:
// with a threshold of N, the Nth, 2Nth, 3Nth... violation triggers it.

use super::moderation_models::{RuleKey, SubjectId};
use dashmap::DashMap;

#[derive(Hash, Eq, PartialEq, Clone, Debug)]
struct ViolationKey {
    subject: SubjectId,
    rule: RuleKey,
}

/// In-memory violation counters.
///
/// **DashMap:**
/// Different subjects land on independent shards, and the `entry` API holds
/// the shard lock across increment-and-read, so two concurrent violations for
/// the same subject/rule each see their own count.
#[derive(Default)]
pub struct ViolationTracker {
    counters: DashMap<ViolationKey, u64>,
}

impl ViolationTracker {
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
        }
    }

    /// Count one more violation and return the new total.
    pub fn record_violation(&self, subject: SubjectId, rule: &RuleKey) -> u64 {
        let key = ViolationKey {
            subject,
            rule: rule.clone(),
        };

        let mut count = self.counters.entry(key).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Whether the `count`th violation should be punished.
    pub fn should_punish(count: u64, threshold: i64) -> bool {
        if threshold <= 0 || count == 0 {
            return false;
        }
        count % threshold as u64 == 0
    }

    #[allow(dead_code)]
    pub fn count(&self, subject: SubjectId, rule: &RuleKey) -> u64 {
        let key = ViolationKey {
            subject,
            rule: rule.clone(),
        };
        self.counters.get(&key).map(|c| *c).unwrap_or(0)
    }

    /// Per-rule counts for a subject, sorted by rule.
    pub fn violations(&self, subject: SubjectId) -> Vec<(RuleKey, u64)> {
        let mut counts: Vec<(RuleKey, u64)> = self
            .counters
            .iter()
            .filter(|entry| entry.key().subject == subject)
            .map(|entry| (entry.key().rule.clone(), *entry.value()))
            .collect();
        counts.sort();
        counts
    }

    /// Drop every counter for a subject (moderator action). Returns how many
    /// rules had counters.
    pub fn clear_subject(&self, subject: SubjectId) -> usize {
        let mut removed = 0;
        self.counters.retain(|key, _| {
            let keep = key.subject != subject;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Drop a subject's counters once they've left.
    pub fn forget_subject(&self, subject: SubjectId) {
        let cleared = self.clear_subject(subject);
        if cleared > 0 {
            tracing::debug!(
                user_id = subject.user_id,
                guild_id = subject.guild_id,
                cleared,
                "Forgot violation history"
            );
        }
    }
}
