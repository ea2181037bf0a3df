use poise::serenity_prelude::User;
use serde_json::json;

use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::commands::moderation::{
    active_warnings, actor_snapshot, guild_id, guild_name, notify_target, record_action, refuse,
    reason_or_default, reply, report_failure, require_moderator, target_details,
    with_active_warnings,
};
use crate::constants::embeds;
use crate::services::moderation::guards::{self, Target};
use crate::utils::formatting::{mention_user, relative_time};

/// Remove a warning (the most recent one unless an ID is given)
#[poise::command(slash_command, guild_only, default_member_permissions = "MODERATE_MEMBERS")]
pub async fn unwarn(
    ctx: Context<'_>,
    #[description = "Member whose warning to remove"] user: User,
    #[description = "Warning ID (defaults to the most recent active warning)"] warning_id: Option<String>,
    #[description = "Why the warning is removed"]
    #[max_length = 512]
    reason: Option<String>,
    #[description = "Only show the reply to you"] silent: Option<bool>,
) -> Result<(), Error> {
    let silent = silent.unwrap_or(false);
    let guild_id = guild_id(ctx)?;

    if !require_moderator(ctx).await? {
        return Ok(());
    }

    let target = Target {
        user_id: user.id.get(),
        is_bot: user.bot,
        standing: None,
    };
    if let Err(refusal) =
        guards::check_warn_target(ctx.author().id.get(), ctx.framework().bot_id.get(), &target)
    {
        return refuse(ctx, "Cannot Remove Warning", refusal.message()).await;
    }

    let reason = reason_or_default(reason);
    let warning_id = warning_id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty());
    let data = ctx.data();

    let removed = data
        .ledger
        .remove_warning(
            user.id.get(),
            guild_id.get(),
            warning_id.as_deref(),
            &actor_snapshot(ctx.author()),
            &reason,
        )
        .await;

    let warning = match removed {
        Ok(warning) => warning,
        Err(e) => {
            let details = target_details(&user, &reason, json!({ "warningId": warning_id }));
            return report_failure(ctx, "Remove Warning", details, e, silent).await;
        }
    };

    let remaining = active_warnings(data.ledger.count_active(user.id.get(), guild_id.get()).await);

    record_action(
        ctx,
        "Remove Warning",
        target_details(
            &user,
            &reason,
            json!({ "warningId": warning.id, "activeWarnings": remaining }),
        ),
        Ok(()),
    )
    .await;

    let notified = notify_target(
        ctx,
        &user,
        with_active_warnings(
            embeds::success_embed()
                .title(format!("A warning was removed in {}", guild_name(ctx)))
                .field("Original Reason", &warning.reason, false),
            remaining,
        ),
    )
    .await;

    let embed = embeds::success_embed()
        .title("Warning Removed")
        .field("User", format!("{} ({})", mention_user(user.id), user.name), true)
        .field("Issued", relative_time(warning.created_at), true);
    let embed = with_active_warnings(embed, remaining)
        .field("Original Reason", &warning.reason, false)
        .field("Removal Reason", &reason, false)
        .field("Warning ID", format!("`{}`", warning.id), false)
        .footer(embeds::dm_footer(notified));

    reply(ctx, embed, silent).await
}
