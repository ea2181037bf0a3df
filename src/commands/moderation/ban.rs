use poise::serenity_prelude::User;
use serde_json::json;

use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::commands::moderation::{
    check_target, guild_id, guild_name, notify_target, record_action, refuse, reason_or_default,
    reply, report_failure, require_moderator, resolve_user, target_details,
};
use crate::constants::embeds;
use crate::constants::limits::MAX_BAN_DELETE_DAYS;
use crate::utils::formatting::mention_user;

/// Ban a member, or a user by ID, from the server
#[poise::command(slash_command, guild_only, default_member_permissions = "BAN_MEMBERS")]
pub async fn ban(
    ctx: Context<'_>,
    #[description = "Member to ban"] user: Option<User>,
    #[description = "ID of a user who is not in the server"] user_id: Option<String>,
    #[description = "Reason for the ban"]
    #[max_length = 512]
    reason: Option<String>,
    #[description = "Days of messages to delete (0-7)"]
    #[min = 0]
    #[max = 7]
    delete_days: Option<u8>,
    #[description = "Only show the reply to you"] silent: Option<bool>,
) -> Result<(), Error> {
    let silent = silent.unwrap_or(false);
    let guild_id = guild_id(ctx)?;

    if !require_moderator(ctx).await? {
        return Ok(());
    }

    let user = match resolve_user(ctx, user, user_id).await {
        Ok(user) => user,
        Err(e) => return refuse(ctx, "Ban Failed", &e.to_string()).await,
    };

    if let Some(refusal) = check_target(ctx, guild_id, &user).await {
        return refuse(ctx, "Cannot Ban", refusal.message()).await;
    }

    let reason = reason_or_default(reason);
    let delete_days = delete_days.unwrap_or(0).min(MAX_BAN_DELETE_DAYS);
    let details = target_details(&user, &reason, json!({ "deleteDays": delete_days }));

    // DM first: once banned we no longer share a server with the user
    let notified = notify_target(
        ctx,
        &user,
        embeds::error_embed()
            .title(format!("You were banned from {}", guild_name(ctx)))
            .field("Reason", &reason, false)
            .field("Moderator", ctx.author().name.clone(), true),
    )
    .await;

    if let Err(e) = guild_id
        .ban_with_reason(ctx.http(), user.id, delete_days, &reason)
        .await
    {
        return report_failure(ctx, "Ban", details, e.into(), silent).await;
    }

    record_action(ctx, "Ban", details, Ok(())).await;

    let embed = embeds::success_embed()
        .title("User Banned")
        .field("User", format!("{} ({})", mention_user(user.id), user.name), true)
        .field("Moderator", mention_user(ctx.author().id), true)
        .field("Messages Deleted", format!("{} days", delete_days), true)
        .field("Reason", &reason, false)
        .footer(embeds::dm_footer(notified));

    reply(ctx, embed, silent).await
}
