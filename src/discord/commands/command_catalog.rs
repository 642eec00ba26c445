// Discord commands module.
// Each feature gets its own command file.

pub mod safechat;

// Bot presence management
pub mod presence;
