// Bot presence - tells members the bot is watching chat.
//
// Discord-layer glue only: it takes the number of active rules from the core
// and turns it into an ActivityData.

use poise::serenity_prelude as serenity;

fn watching_text(rule_count: usize) -> String {
    format!(
        "chat with {} rule{}",
        rule_count,
        if rule_count == 1 { "" } else { "s" }
    )
}

/// Called once the bot is ready so members can see it is moderating.
pub fn on_ready(ctx: &serenity::Context, rule_count: usize) {
    let activity = serenity::ActivityData::watching(watching_text(rule_count));
    ctx.set_presence(Some(activity), serenity::OnlineStatus::Online);
}
