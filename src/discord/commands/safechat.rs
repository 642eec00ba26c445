// SafeChat slash commands - inspect and manage the moderation engine.

use crate::core::moderation::{ModerationPipeline, Rule, SubjectId};
use crate::infra::config::JsonConfigStore;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Shared state handed to every command and event.
pub struct Data {
    pub pipeline: Arc<ModerationPipeline>,
    /// Every rule the bot knows about, registered or not.
    pub catalog: Vec<Arc<dyn Rule>>,
    pub config: Arc<JsonConfigStore>,
}

impl Data {
    fn catalog_rule(&self, name: &str) -> Option<&Arc<dyn Rule>> {
        self.catalog
            .iter()
            .find(|rule| rule.name().eq_ignore_ascii_case(name.trim()))
    }
}

/// SafeChat moderation commands.
#[poise::command(
    slash_command,
    subcommands("rules", "enable", "disable", "violations", "clear", "reload"),
    required_permissions = "MANAGE_MESSAGES",
    guild_only
)]
pub async fn safechat(_ctx: Context<'_>) -> Result<(), Error> {
    // Parent command - shows help
    Ok(())
}

/// List all rules and whether they are active.
#[poise::command(slash_command, guild_only)]
pub async fn rules(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();
    let active = data.pipeline.registry().active_rules();

    let mut embed = serenity::CreateEmbed::new()
        .title("🛡️ SafeChat Rules")
        .color(0x00FF00)
        .description(format!(
            "{} of {} rules registered, evaluated in the order below.",
            active.len(),
            data.catalog.len()
        ));

    for rule in active.iter() {
        let configured = match rule.is_enabled() {
            Ok(true) => "✅ enabled".to_string(),
            Ok(false) => "❌ disabled in config".to_string(),
            Err(e) => format!("⚠️ {}", e),
        };
        let spec = rule.spec();
        embed = embed.field(
            &spec.name,
            format!(
                "Priority: {}\nBypass: `{}`\n{}",
                spec.priority, spec.bypass_permission, configured
            ),
            true,
        );
    }

    let inactive: Vec<&str> = data
        .catalog
        .iter()
        .filter(|rule| data.pipeline.registry().find(rule.name()).is_none())
        .map(|rule| rule.name())
        .collect();
    if !inactive.is_empty() {
        embed = embed.field("Unregistered", inactive.join(", "), false);
    }

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Register a rule so it is evaluated again.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn enable(
    ctx: Context<'_>,
    #[description = "Rule name"] rule: String,
) -> Result<(), Error> {
    let data = ctx.data();
    let Some(found) = data.catalog_rule(&rule) else {
        ctx.say(format!("❓ Unknown rule `{}`.", rule)).await?;
        return Ok(());
    };

    if data.pipeline.registry().register(Arc::clone(found)) {
        ctx.say(format!("✅ Rule **{}** registered.", found.name()))
            .await?;
    } else {
        ctx.say(format!("ℹ️ Rule **{}** is already registered.", found.name()))
            .await?;
    }
    Ok(())
}

/// Unregister a rule so it is no longer evaluated.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn disable(
    ctx: Context<'_>,
    #[description = "Rule name"] rule: String,
) -> Result<(), Error> {
    let data = ctx.data();
    let Some(found) = data.catalog_rule(&rule) else {
        ctx.say(format!("❓ Unknown rule `{}`.", rule)).await?;
        return Ok(());
    };

    if data.pipeline.registry().unregister(found.as_ref()) {
        ctx.say(format!("❌ Rule **{}** unregistered.", found.name()))
            .await?;
    } else {
        ctx.say(format!("ℹ️ Rule **{}** was not registered.", found.name()))
            .await?;
    }
    Ok(())
}

/// Show a user's violation counts.
#[poise::command(slash_command, guild_only)]
pub async fn violations(
    ctx: Context<'_>,
    #[description = "User to inspect"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;
    let subject = SubjectId {
        user_id: user.id.get(),
        guild_id: guild_id.get(),
    };

    let counts = ctx.data().pipeline.tracker().violations(subject);
    if counts.is_empty() {
        ctx.say(format!("✨ <@{}> has no violations.", user.id))
            .await?;
        return Ok(());
    }

    let lines: Vec<String> = counts
        .iter()
        .map(|(rule, count)| format!("• **{}**: {}", rule, count))
        .collect();
    ctx.say(format!("📋 Violations for <@{}>:\n{}", user.id, lines.join("\n")))
        .await?;
    Ok(())
}

/// Clear a user's violation counts.
#[poise::command(slash_command, guild_only)]
pub async fn clear(
    ctx: Context<'_>,
    #[description = "User to clear violations for"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;
    let subject = SubjectId {
        user_id: user.id.get(),
        guild_id: guild_id.get(),
    };

    let cleared = ctx.data().pipeline.tracker().clear_subject(subject);
    ctx.say(format!(
        "✅ Cleared violations for <@{}> ({} rule{}).",
        user.id,
        cleared,
        if cleared == 1 { "" } else { "s" }
    ))
    .await?;
    Ok(())
}

/// Re-read the moderation config file.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn reload(ctx: Context<'_>) -> Result<(), Error> {
    match ctx.data().config.reload() {
        Ok(()) => {
            ctx.say("🔄 Moderation config reloaded.").await?;
        }
        Err(e) => {
            tracing::error!("Config reload failed: {}", e);
            ctx.say(format!("⚠️ Reload failed, keeping the old config: {}", e))
                .await?;
        }
    }
    Ok(())
}
