// Discord side of moderation: message intake and punishment execution.

pub mod command_executor;
pub mod message_handler;

pub use command_executor::DiscordCommandExecutor;
pub use message_handler::handle_message_for_moderation;
