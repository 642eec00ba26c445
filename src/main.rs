// This is the entry point of the SafeChat moderation bot.
//
// **Architecture Overview:**
// - `core/` = Moderation engine (platform-agnostic)
// - `infra/` = Implementations of core traits (config file, log listener)
// - `discord/` = Discord-specific adapters (message intake, punishments, commands)
//
// This file's job is to:
// 1. Load configuration
// 2. Build the rule registry and register the rules
// 3. Set up the Discord framework around the moderation pipeline

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::core::moderation::{
    AddressRule, BlockedWordsRule, ConfigProvider, ModerationPipeline, PipelineMode,
    RegistryHandle, Rule, RuleRegistry, SubjectId, ViolationTracker,
};
use crate::discord::commands::presence;
use crate::discord::moderation::{handle_message_for_moderation, DiscordCommandExecutor};
use crate::discord::{Data, Error};
use crate::infra::config::{JsonConfigStore, GENERAL_SECTION};
use crate::infra::notifications::TracingRuleListener;
use anyhow::Context as _;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

const DEFAULT_CONFIG_PATH: &str = "data/safechat.json";

/// Event handler for non-command Discord events.
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            if let Err(e) = handle_message_for_moderation(ctx, new_message, data).await {
                tracing::error!("Error moderating message: {}", e);
            }
        }
        serenity::FullEvent::GuildMemberRemoval { guild_id, user, .. } => {
            // Violation history only lives as long as the member stays.
            data.pipeline.tracker().forget_subject(SubjectId {
                user_id: user.id.get(),
                guild_id: guild_id.get(),
            });
        }
        _ => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let token = std::env::var("DISCORD_TOKEN").context(
        "Missing DISCORD_TOKEN environment variable! Create a .env file with your bot token.",
    )?;
    let config_path =
        std::env::var("SAFECHAT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where we wire everything together.

    let config = Arc::new(
        JsonConfigStore::open(&config_path)
            .with_context(|| format!("Failed to load moderation config at {}", config_path))?,
    );
    let prefix = config.get_string(GENERAL_SECTION, "prefix")?;
    let mode = if config.get_bool(GENERAL_SECTION, "first_match_wins")? {
        PipelineMode::FirstMatch
    } else {
        PipelineMode::AllRules
    };

    // One registry per process, created here and handed to everyone who needs it.
    let registry_handle = RegistryHandle::new();
    registry_handle.init(RuleRegistry::new(Arc::new(TracingRuleListener::new(
        prefix.clone(),
    ))))?;
    let registry = registry_handle.get()?;

    let catalog: Vec<Arc<dyn Rule>> = vec![
        Arc::new(AddressRule::new(config.clone(), prefix.clone())),
        Arc::new(BlockedWordsRule::new(config.clone(), prefix.clone())),
    ];
    for rule in &catalog {
        if !registry.register(Arc::clone(rule)) {
            tracing::warn!(rule = %rule.name(), "Rule was not registered");
        }
    }

    let tracker = Arc::new(ViolationTracker::new());

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required to read message content
        | serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![discord::commands::safechat::safechat()],
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                tracing::info!("SafeChat is starting up...");

                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                // The executor needs the HTTP client, which only exists once we're connected.
                let executor = Arc::new(DiscordCommandExecutor::new(ctx.http.clone()));
                let pipeline = Arc::new(ModerationPipeline::new(
                    Arc::clone(&registry),
                    tracker,
                    executor,
                    mode,
                ));

                presence::on_ready(ctx, registry.len());
                tracing::info!(rules = registry.len(), "SafeChat is ready");

                Ok(Data {
                    pipeline,
                    catalog,
                    config,
                })
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .context("Error creating client")?;

    client.start().await.context("Error running bot")?;
    Ok(())
}
