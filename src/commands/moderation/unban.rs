use serde_json::Value;

use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::commands::moderation::{
    guild_id, parse_user_id, record_action, refuse, reason_or_default, reply, report_failure,
    require_moderator, resolve_user, target_details,
};
use crate::constants::embeds;
use crate::utils::formatting::mention_user;

/// Lift a ban
#[poise::command(slash_command, guild_only, default_member_permissions = "BAN_MEMBERS")]
pub async fn unban(
    ctx: Context<'_>,
    #[description = "ID of the banned user"] user_id: String,
    #[description = "Reason for lifting the ban"]
    #[max_length = 512]
    reason: Option<String>,
    #[description = "Only show the reply to you"] silent: Option<bool>,
) -> Result<(), Error> {
    let silent = silent.unwrap_or(false);
    let guild_id = guild_id(ctx)?;

    if !require_moderator(ctx).await? {
        return Ok(());
    }

    if parse_user_id(&user_id) == Some(ctx.author().id.get()) {
        return refuse(ctx, "Cannot Unban", "You cannot use this on yourself.").await;
    }

    let user = match resolve_user(ctx, None, Some(user_id)).await {
        Ok(user) => user,
        Err(e) => return refuse(ctx, "Unban Failed", &e.to_string()).await,
    };

    let reason = reason_or_default(reason);
    let details = target_details(&user, &reason, Value::Null);

    let bans = guild_id.bans(ctx.http(), None, None).await?;
    if !bans.iter().any(|ban| ban.user.id == user.id) {
        return refuse(ctx, "Not Banned", "That user is not banned from this server.").await;
    }

    if let Err(e) = guild_id.unban(ctx.http(), user.id).await {
        return report_failure(ctx, "Unban", details, e.into(), silent).await;
    }

    record_action(ctx, "Unban", details, Ok(())).await;

    let embed = embeds::success_embed()
        .title("User Unbanned")
        .field("User", format!("{} ({})", mention_user(user.id), user.name), true)
        .field("Moderator", mention_user(ctx.author().id), true)
        .field("Reason", &reason, false);

    reply(ctx, embed, silent).await
}
