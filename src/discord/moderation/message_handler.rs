// Discord-specific message moderation - feeds guild messages into the core
// pipeline and translates the outcome back into Discord actions.

use crate::core::moderation::{
    ConfigProvider, DeliveryError, MessageContext, ModerationOutcome, PipelineError, Subject,
};
use crate::discord::{Data, Error};
use crate::infra::config::GENERAL_SECTION;
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::collections::HashMap;
use std::sync::Arc;

/// Whether a member with `roles` (or administrator rights) holds `permission`.
pub fn holds_permission(
    is_admin: bool,
    roles: &[u64],
    bypass_roles: &HashMap<String, Vec<u64>>,
    permission: &str,
) -> bool {
    is_admin
        || bypass_roles
            .get(permission)
            .is_some_and(|granted| granted.iter().any(|role| roles.contains(role)))
}

/// Per-message view of the author's permissions and the channel to warn in.
struct DiscordMessageContext {
    http: Arc<serenity::Http>,
    channel_id: serenity::ChannelId,
    is_admin: bool,
    roles: Vec<u64>,
    bypass_roles: HashMap<String, Vec<u64>>,
}

#[async_trait]
impl MessageContext for DiscordMessageContext {
    fn has_permission(&self, _subject: &Subject, permission: &str) -> bool {
        holds_permission(self.is_admin, &self.roles, &self.bypass_roles, permission)
    }

    async fn deliver_warning(&self, subject: &Subject, text: &str) -> Result<(), DeliveryError> {
        let http: &serenity::Http = &self.http;
        self.channel_id
            .say(http, format!("⚠️ <@{}> {}", subject.id.user_id, text))
            .await
            .map(|_| ())
            .map_err(|e| DeliveryError(e.to_string()))
    }
}

/// Run a message through the moderation pipeline.
///
/// Returns `true` if the message violated at least one rule.
pub async fn handle_message_for_moderation(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    data: &Data,
) -> Result<bool, Error> {
    // Skip bots
    if msg.author.bot {
        return Ok(false);
    }

    // Only moderate guild messages
    let guild_id = match msg.guild_id {
        Some(id) => id,
        None => return Ok(false),
    };

    // Best-effort admin detection from the cache. Don't hold the cache ref across awaits.
    #[allow(deprecated)]
    let is_admin = ctx
        .cache
        .guild(guild_id)
        .and_then(|g| {
            g.members
                .get(&msg.author.id)
                .map(|m| g.member_permissions(m).administrator())
        })
        .unwrap_or(false);

    let roles: Vec<u64> = msg
        .member
        .as_ref()
        .map(|m| m.roles.iter().map(|r| r.get()).collect())
        .unwrap_or_default();

    let message_ctx = DiscordMessageContext {
        http: ctx.http.clone(),
        channel_id: msg.channel_id,
        is_admin,
        roles,
        bypass_roles: data.config.bypass_roles()?,
    };

    let display_name = msg
        .member
        .as_ref()
        .and_then(|m| m.nick.clone())
        .unwrap_or_else(|| msg.author.name.clone());
    let subject = Subject::new(msg.author.id.get(), guild_id.get(), display_name);

    let outcome = match data
        .pipeline
        .process(&subject, &msg.content, &message_ctx)
        .await
    {
        Ok(outcome) => outcome,
        Err(PipelineError::RuleFailures { failures, outcome }) => {
            for failure in &failures {
                tracing::error!(guild_id = guild_id.get(), "{}", failure);
            }
            outcome
        }
    };

    if outcome.is_clean() {
        return Ok(false);
    }

    apply_outcome(ctx, msg, data, &outcome).await;
    Ok(true)
}

/// Discord-side follow-up to a violation: remove the message if configured.
async fn apply_outcome(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    data: &Data,
    outcome: &ModerationOutcome,
) {
    let delete = match data
        .config
        .get_bool(GENERAL_SECTION, "delete_violating_messages")
    {
        Ok(delete) => delete,
        Err(e) => {
            tracing::error!("Can't decide whether to delete violating message: {}", e);
            return;
        }
    };

    if delete {
        if let Err(e) = msg.delete(&ctx.http).await {
            tracing::warn!(
                rules = ?outcome.violations.iter().map(|v| &v.rule).collect::<Vec<_>>(),
                "Failed to delete violating message: {}",
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grants() -> HashMap<String, Vec<u64>> {
        HashMap::from([("safechat.bypass.address".to_string(), vec![10, 11])])
    }

    #[test]
    fn admins_bypass_everything() {
        assert!(holds_permission(true, &[], &grants(), "safechat.bypass.words"));
    }

    #[test]
    fn granted_role_bypasses_only_its_permission() {
        assert!(holds_permission(false, &[1, 11], &grants(), "safechat.bypass.address"));
        assert!(!holds_permission(false, &[1, 11], &grants(), "safechat.bypass.words"));
        assert!(!holds_permission(false, &[1], &grants(), "safechat.bypass.address"));
    }
}
