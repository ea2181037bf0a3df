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
use crate::services::moderation::ledger::NewWarning;
use crate::utils::formatting::mention_user;

/// Warn a member
#[poise::command(slash_command, guild_only, default_member_permissions = "MODERATE_MEMBERS")]
pub async fn warn(
    ctx: Context<'_>,
    #[description = "Member to warn"] user: User,
    #[description = "Reason for the warning"]
    #[max_length = 512]
    reason: String,
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
        return refuse(ctx, "Cannot Warn", refusal.message()).await;
    }

    let reason = reason_or_default(Some(reason));
    let moderator = actor_snapshot(ctx.author());
    let server = guild_name(ctx);
    let data = ctx.data();

    let issued = data
        .ledger
        .issue_warning(NewWarning {
            user_id: user.id.get(),
            username: user.name.clone(),
            guild_id: guild_id.get(),
            guild_name: server.clone(),
            moderator_id: moderator.id,
            moderator_username: moderator.username,
            reason: reason.clone(),
        })
        .await;

    let warning = match issued {
        Ok(warning) => warning,
        Err(e) => {
            let details = target_details(&user, &reason, serde_json::Value::Null);
            return report_failure(ctx, "Warn", details, e, silent).await;
        }
    };

    let total = active_warnings(data.ledger.count_active(user.id.get(), guild_id.get()).await);

    record_action(
        ctx,
        "Warn",
        target_details(
            &user,
            &reason,
            json!({ "warningId": warning.id, "activeWarnings": total }),
        ),
        Ok(()),
    )
    .await;

    let notified = notify_target(
        ctx,
        &user,
        with_active_warnings(
            embeds::warning_embed()
                .title(format!("You received a warning in {}", server))
                .field("Reason", &reason, false),
            total,
        ),
    )
    .await;

    let embed = embeds::warning_embed()
        .title("User Warned")
        .field("User", format!("{} ({})", mention_user(user.id), user.name), true)
        .field("Moderator", mention_user(ctx.author().id), true);
    let embed = with_active_warnings(embed, total)
        .field("Reason", &reason, false)
        .field("Warning ID", format!("`{}`", warning.id), false)
        .footer(embeds::dm_footer(notified));

    reply(ctx, embed, silent).await
}
