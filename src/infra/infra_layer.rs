// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "config/mod.rs"]
pub mod config;

#[path = "notifications/mod.rs"]
pub mod notifications;
