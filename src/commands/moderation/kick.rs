use poise::serenity_prelude::User;
use serde_json::Value;

use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::commands::moderation::{
    check_target, guild_id, guild_name, notify_target, record_action, refuse, reason_or_default,
    reply, report_failure, require_moderator, target_details,
};
use crate::constants::embeds;
use crate::utils::formatting::mention_user;

/// Kick a member from the server
#[poise::command(slash_command, guild_only, default_member_permissions = "KICK_MEMBERS")]
pub async fn kick(
    ctx: Context<'_>,
    #[description = "Member to kick"] user: User,
    #[description = "Reason for the kick"]
    #[max_length = 512]
    reason: Option<String>,
    #[description = "Only show the reply to you"] silent: Option<bool>,
) -> Result<(), Error> {
    let silent = silent.unwrap_or(false);
    let guild_id = guild_id(ctx)?;

    if !require_moderator(ctx).await? {
        return Ok(());
    }

    if let Some(refusal) = check_target(ctx, guild_id, &user).await {
        return refuse(ctx, "Cannot Kick", refusal.message()).await;
    }

    if guild_id.member(ctx.serenity_context(), user.id).await.is_err() {
        return refuse(ctx, "Cannot Kick", "That user is not a member of this server.").await;
    }

    let reason = reason_or_default(reason);
    let details = target_details(&user, &reason, Value::Null);

    let notified = notify_target(
        ctx,
        &user,
        embeds::warning_embed()
            .title(format!("You were kicked from {}", guild_name(ctx)))
            .field("Reason", &reason, false),
    )
    .await;

    if let Err(e) = guild_id.kick_with_reason(ctx.http(), user.id, &reason).await {
        return report_failure(ctx, "Kick", details, e.into(), silent).await;
    }

    record_action(ctx, "Kick", details, Ok(())).await;

    let embed = embeds::success_embed()
        .title("User Kicked")
        .field("User", format!("{} ({})", mention_user(user.id), user.name), true)
        .field("Moderator", mention_user(ctx.author().id), true)
        .field("Reason", &reason, false)
        .footer(embeds::dm_footer(notified));

    reply(ctx, embed, silent).await
}
