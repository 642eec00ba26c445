// Runs rendered punishment commands against Discord.
//
// Punishment templates in the config render to small text commands:
//   timeout <user_id> <seconds> [reason...]
//   kick <user_id> [reason...]
//   ban <user_id> [reason...]
//   say <text...>
// Parsing them is our job; the core hands them over verbatim.

use crate::core::moderation::{CommandExecutor, DeliveryError, Subject};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_REASON: &str = "SafeChat punishment";
/// Discord refuses timeouts longer than 28 days.
pub const MAX_TIMEOUT_SECS: u64 = 28 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationCommand {
    Timeout {
        user_id: u64,
        duration: Duration,
        reason: String,
    },
    Kick {
        user_id: u64,
        reason: String,
    },
    Ban {
        user_id: u64,
        reason: String,
    },
    /// Announce `text` in the guild's system channel.
    Say {
        text: String,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command '{0}'")]
    UnknownVerb(String),

    #[error("Missing argument '{0}'")]
    MissingArgument(&'static str),

    #[error("Invalid argument '{name}': {value}")]
    InvalidArgument { name: &'static str, value: String },
}

fn parse_user_id(value: Option<&str>) -> Result<u64, CommandParseError> {
    let value = value.ok_or(CommandParseError::MissingArgument("user_id"))?;
    // Discord ids are never zero, and serenity panics on a zero id
    match value.parse::<u64>() {
        Ok(id) if id != 0 => Ok(id),
        _ => Err(CommandParseError::InvalidArgument {
            name: "user_id",
            value: value.to_string(),
        }),
    }
}

fn rest_as_reason<'a>(rest: impl Iterator<Item = &'a str>) -> String {
    let reason = rest.collect::<Vec<_>>().join(" ");
    if reason.is_empty() {
        DEFAULT_REASON.to_string()
    } else {
        reason
    }
}

/// Parse a rendered punishment command.
pub fn parse_command(command: &str) -> Result<ModerationCommand, CommandParseError> {
    let mut parts = command.split_whitespace();
    let verb = parts.next().ok_or(CommandParseError::Empty)?.to_lowercase();

    match verb.as_str() {
        "timeout" => {
            let user_id = parse_user_id(parts.next())?;
            let seconds = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("seconds"))?;
            let seconds = match seconds.parse::<u64>() {
                Ok(secs) if secs <= MAX_TIMEOUT_SECS => secs,
                _ => {
                    return Err(CommandParseError::InvalidArgument {
                        name: "seconds",
                        value: seconds.to_string(),
                    })
                }
            };
            Ok(ModerationCommand::Timeout {
                user_id,
                duration: Duration::from_secs(seconds),
                reason: rest_as_reason(parts),
            })
        }
        "kick" => Ok(ModerationCommand::Kick {
            user_id: parse_user_id(parts.next())?,
            reason: rest_as_reason(parts),
        }),
        "ban" => Ok(ModerationCommand::Ban {
            user_id: parse_user_id(parts.next())?,
            reason: rest_as_reason(parts),
        }),
        "say" => {
            let text = parts.collect::<Vec<_>>().join(" ");
            if text.is_empty() {
                return Err(CommandParseError::MissingArgument("text"));
            }
            Ok(ModerationCommand::Say { text })
        }
        other => Err(CommandParseError::UnknownVerb(other.to_string())),
    }
}

/// When a timeout of `duration` starting at unix time `now` runs out.
pub fn timeout_deadline(now: i64, duration: Duration) -> Result<serenity::Timestamp, DeliveryError> {
    let until = i64::try_from(duration.as_secs())
        .ok()
        .and_then(|secs| now.checked_add(secs))
        .ok_or_else(|| {
            DeliveryError(format!("Timeout of {}s is out of range", duration.as_secs()))
        })?;
    serenity::Timestamp::from_unix_timestamp(until)
        .map_err(|e| DeliveryError(format!("Failed to create timeout timestamp: {}", e)))
}

fn discord_error(error: serenity::Error) -> DeliveryError {
    DeliveryError(error.to_string())
}

/// Executes punishment commands in the guild the subject spoke in.
pub struct DiscordCommandExecutor {
    http: Arc<serenity::Http>,
}

impl DiscordCommandExecutor {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }

    async fn run(&self, guild_id: u64, command: ModerationCommand) -> Result<(), DeliveryError> {
        let http: &serenity::Http = &self.http;
        let guild_id = serenity::GuildId::new(guild_id);

        match command {
            ModerationCommand::Timeout {
                user_id,
                duration,
                reason,
            } => {
                let until = timeout_deadline(chrono::Utc::now().timestamp(), duration)?;

                guild_id
                    .edit_member(
                        http,
                        serenity::UserId::new(user_id),
                        serenity::EditMember::new()
                            .disable_communication_until_datetime(until)
                            .audit_log_reason(&reason),
                    )
                    .await
                    .map_err(discord_error)?;
            }
            ModerationCommand::Kick { user_id, reason } => {
                guild_id
                    .kick_with_reason(http, serenity::UserId::new(user_id), &reason)
                    .await
                    .map_err(discord_error)?;
            }
            ModerationCommand::Ban { user_id, reason } => {
                guild_id
                    .ban_with_reason(http, serenity::UserId::new(user_id), 0, &reason)
                    .await
                    .map_err(discord_error)?;
            }
            ModerationCommand::Say { text } => {
                let guild = guild_id.to_partial_guild(http).await.map_err(discord_error)?;
                let channel = guild.system_channel_id.ok_or_else(|| {
                    DeliveryError(format!("Guild {} has no system channel", guild_id))
                })?;
                channel.say(http, &text).await.map_err(discord_error)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CommandExecutor for DiscordCommandExecutor {
    async fn execute(&self, subject: &Subject, command: &str) -> Result<(), DeliveryError> {
        let parsed = parse_command(command).map_err(|e| {
            tracing::warn!(command = %command, "Ignoring punishment command: {}", e);
            DeliveryError(e.to_string())
        })?;

        self.run(subject.id.guild_id, parsed).await
    }
}
