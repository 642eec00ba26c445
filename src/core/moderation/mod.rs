// Core moderation module - the rule engine behind SafeChat.
// Rules, the registry that orders them, violation tracking and the pipeline
// that ties them together. Nothing in here knows about Discord.

pub mod address_rule;
pub mod moderation_models;
pub mod moderation_pipeline;
pub mod punishment;
pub mod rule;
pub mod rule_registry;
pub mod violation_tracker;
pub mod words_rule;

pub use address_rule::AddressRule;
pub use moderation_models::*;
pub use moderation_pipeline::*;
pub use punishment::*;
pub use rule::*;
pub use rule_registry::*;
pub use violation_tracker::*;
pub use words_rule::BlockedWordsRule;

#[cfg(test)]
pub(crate) mod test_support;
