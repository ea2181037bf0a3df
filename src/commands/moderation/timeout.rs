use std::time::Duration;

use chrono::Utc;
use poise::serenity_prelude::{EditMember, Timestamp, User};
use serde_json::{json, Value};

use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::commands::moderation::{
    check_target, guild_id, guild_name, notify_target, record_action, refuse, reason_or_default,
    reply, report_failure, require_moderator, target_details,
};
use crate::constants::embeds;
use crate::constants::limits::{MAX_TIMEOUT_MINUTES, MIN_TIMEOUT_MINUTES};
use crate::constants::timeouts::format_duration;
use crate::utils::formatting::{mention_user, relative_time};

/// Time out a member
#[poise::command(slash_command, guild_only, default_member_permissions = "MODERATE_MEMBERS")]
pub async fn timeout(
    ctx: Context<'_>,
    #[description = "Member to time out"] user: User,
    #[description = "Duration in minutes (1-40320)"]
    #[min = 1]
    #[max = 40320]
    minutes: u32,
    #[description = "Reason for the timeout"]
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
        return refuse(ctx, "Cannot Time Out", refusal.message()).await;
    }

    let minutes = minutes.clamp(MIN_TIMEOUT_MINUTES, MAX_TIMEOUT_MINUTES);
    let reason = reason_or_default(reason);
    let until = Utc::now() + chrono::Duration::minutes(i64::from(minutes));
    let details = target_details(
        &user,
        &reason,
        json!({ "minutes": minutes, "until": until.to_rfc3339() }),
    );

    let timestamp = Timestamp::from_unix_timestamp(until.timestamp())
        .map_err(|e| Error::custom(format!("invalid timeout end: {}", e)))?;

    let edit = EditMember::new()
        .disable_communication_until_datetime(timestamp)
        .audit_log_reason(&reason);

    if let Err(e) = guild_id.edit_member(ctx.http(), user.id, edit).await {
        return report_failure(ctx, "Timeout", details, e.into(), silent).await;
    }

    record_action(ctx, "Timeout", details, Ok(())).await;

    let length = format_duration(Duration::from_secs(u64::from(minutes) * 60));
    let notified = notify_target(
        ctx,
        &user,
        embeds::warning_embed()
            .title(format!("You were timed out in {}", guild_name(ctx)))
            .field("Duration", &length, true)
            .field("Ends", relative_time(until), true)
            .field("Reason", &reason, false),
    )
    .await;

    let embed = embeds::success_embed()
        .title("User Timed Out")
        .field("User", format!("{} ({})", mention_user(user.id), user.name), true)
        .field("Duration", length, true)
        .field("Ends", relative_time(until), true)
        .field("Reason", &reason, false)
        .footer(embeds::dm_footer(notified));

    reply(ctx, embed, silent).await
}

/// Remove a member's timeout
#[poise::command(slash_command, guild_only, default_member_permissions = "MODERATE_MEMBERS")]
pub async fn untimeout(
    ctx: Context<'_>,
    #[description = "Member to release"] user: User,
    #[description = "Reason"]
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
        return refuse(ctx, "Cannot Remove Timeout", refusal.message()).await;
    }

    let member = match guild_id.member(ctx.serenity_context(), user.id).await {
        Ok(member) => member,
        Err(_) => {
            return refuse(ctx, "Cannot Remove Timeout", "That user is not a member of this server.")
                .await
        }
    };

    let timed_out = member
        .communication_disabled_until
        .map(|until| until.unix_timestamp() > Utc::now().timestamp())
        .unwrap_or(false);
    if !timed_out {
        return refuse(ctx, "Not Timed Out", "That member is not currently timed out.").await;
    }

    let reason = reason_or_default(reason);
    let details = target_details(&user, &reason, Value::Null);

    let edit = EditMember::new()
        .enable_communication()
        .audit_log_reason(&reason);

    if let Err(e) = guild_id.edit_member(ctx.http(), user.id, edit).await {
        return report_failure(ctx, "Remove Timeout", details, e.into(), silent).await;
    }

    record_action(ctx, "Remove Timeout", details, Ok(())).await;

    let notified = notify_target(
        ctx,
        &user,
        embeds::success_embed()
            .title(format!("Your timeout in {} was lifted", guild_name(ctx)))
            .field("Reason", &reason, false),
    )
    .await;

    let embed = embeds::success_embed()
        .title("Timeout Removed")
        .field("User", format!("{} ({})", mention_user(user.id), user.name), true)
        .field("Moderator", mention_user(ctx.author().id), true)
        .field("Reason", &reason, false)
        .footer(embeds::dm_footer(notified));

    reply(ctx, embed, silent).await
}
