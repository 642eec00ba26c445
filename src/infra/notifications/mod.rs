// Notification infrastructure - rule lifecycle listeners

mod tracing_listener;

pub use tracing_listener::TracingRuleListener;
