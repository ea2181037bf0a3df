use poise::serenity_prelude::{Role, User, UserId};
use serde_json::json;
use tracing::error;

use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::commands::moderation::{actor_snapshot, guild_snapshot, reply, report_failure};
use crate::commands::owner::require_owner;
use crate::constants::embeds;
use crate::db::models::LogType;
use crate::services::audit::log::{NewLogEntry, MOD_LOG};
use crate::services::moderation::registry::{AddOutcome, RemoveOutcome};
use crate::utils::formatting::{mention_role, mention_user, relative_time};

/// Manage who may use the moderation commands
#[poise::command(
    slash_command,
    rename = "mod",
    subcommands("add_user", "remove_user", "add_role", "remove_role", "list"),
    subcommand_required
)]
pub async fn moderators(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

async fn record_change(ctx: Context<'_>, action: &str, details: serde_json::Value) {
    let entry = NewLogEntry::new("moderators", action)
        .kind(LogType::Success)
        .user(actor_snapshot(ctx.author()))
        .guild(guild_snapshot(ctx))
        .details(details);

    if let Err(e) = ctx.data().audit.record(MOD_LOG, entry).await {
        error!("Failed to record {} in moderation log: {:?}", action, e);
    }
}

/// Grant a user moderator privileges
#[poise::command(slash_command, rename = "add-user")]
pub async fn add_user(
    ctx: Context<'_>,
    #[description = "User to grant moderator privileges"] user: User,
) -> Result<(), Error> {
    if !require_owner(ctx).await? {
        return Ok(());
    }

    let details = json!({ "targetUser": { "id": user.id.get(), "username": user.name } });
    let display_name = user.global_name.clone().unwrap_or_else(|| user.name.clone());

    let outcome = match ctx
        .data()
        .registry
        .add_moderator_user(user.id.get(), &display_name, ctx.author().id.get())
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => return report_failure(ctx, "Add Moderator", details, e, true).await,
    };

    let embed = match outcome {
        AddOutcome::Added => {
            record_change(ctx, "Add Moderator", details).await;
            embeds::success_embed()
                .title("Moderator Added")
                .description(format!("{} can now use the moderation commands.", mention_user(user.id)))
        }
        AddOutcome::AlreadyPresent => embeds::warning_embed()
            .title("Already a Moderator")
            .description(format!("{} is already registered.", mention_user(user.id))),
    };

    reply(ctx, embed, true).await
}

/// Revoke a user's moderator privileges
#[poise::command(slash_command, rename = "remove-user")]
pub async fn remove_user(
    ctx: Context<'_>,
    #[description = "User to remove"] user: User,
) -> Result<(), Error> {
    if !require_owner(ctx).await? {
        return Ok(());
    }

    let details = json!({ "targetUser": { "id": user.id.get(), "username": user.name } });

    let outcome = match ctx.data().registry.remove_moderator_user(user.id.get()).await {
        Ok(outcome) => outcome,
        Err(e) => return report_failure(ctx, "Remove Moderator", details, e, true).await,
    };

    let embed = match outcome {
        RemoveOutcome::Removed => {
            record_change(ctx, "Remove Moderator", details).await;
            embeds::success_embed()
                .title("Moderator Removed")
                .description(format!("{} is no longer a moderator.", mention_user(user.id)))
        }
        RemoveOutcome::NotPresent => embeds::warning_embed()
            .title("Not a Moderator")
            .description(format!("{} is not registered.", mention_user(user.id))),
    };

    reply(ctx, embed, true).await
}

/// Grant every member of a role moderator privileges
#[poise::command(slash_command, guild_only, rename = "add-role")]
pub async fn add_role(
    ctx: Context<'_>,
    #[description = "Role to grant moderator privileges"] role: Role,
) -> Result<(), Error> {
    if !require_owner(ctx).await? {
        return Ok(());
    }

    let member_count = ctx
        .guild()
        .map(|g| {
            g.members
                .values()
                .filter(|m| m.roles.contains(&role.id))
                .count() as u64
        })
        .unwrap_or(0);
    let details = json!({ "role": { "id": role.id.get(), "name": role.name, "memberCount": member_count } });

    let outcome = match ctx
        .data()
        .registry
        .add_moderator_role(role.id.get(), &role.name, member_count, ctx.author().id.get())
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => return report_failure(ctx, "Add Moderator Role", details, e, true).await,
    };

    let embed = match outcome {
        AddOutcome::Added => {
            record_change(ctx, "Add Moderator Role", details).await;
            embeds::success_embed()
                .title("Moderator Role Added")
                .description(format!(
                    "Members of {} can now use the moderation commands.",
                    mention_role(role.id.get())
                ))
                .field("Members", member_count.to_string(), true)
        }
        AddOutcome::AlreadyPresent => embeds::warning_embed()
            .title("Already a Moderator Role")
            .description(format!("{} is already registered.", mention_role(role.id.get()))),
    };

    reply(ctx, embed, true).await
}

/// Revoke a role's moderator privileges
#[poise::command(slash_command, guild_only, rename = "remove-role")]
pub async fn remove_role(
    ctx: Context<'_>,
    #[description = "Role to remove"] role: Role,
) -> Result<(), Error> {
    if !require_owner(ctx).await? {
        return Ok(());
    }

    let details = json!({ "role": { "id": role.id.get(), "name": role.name } });

    let outcome = match ctx.data().registry.remove_moderator_role(role.id.get()).await {
        Ok(outcome) => outcome,
        Err(e) => return report_failure(ctx, "Remove Moderator Role", details, e, true).await,
    };

    let embed = match outcome {
        RemoveOutcome::Removed => {
            record_change(ctx, "Remove Moderator Role", details).await;
            embeds::success_embed()
                .title("Moderator Role Removed")
                .description(format!("{} is no longer a moderator role.", mention_role(role.id.get())))
        }
        RemoveOutcome::NotPresent => embeds::warning_embed()
            .title("Not a Moderator Role")
            .description(format!("{} is not registered.", mention_role(role.id.get()))),
    };

    reply(ctx, embed, true).await
}

/// Show registered moderators and moderator roles
#[poise::command(slash_command)]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    if !require_owner(ctx).await? {
        return Ok(());
    }

    let list = match ctx.data().registry.list_moderators().await {
        Ok(list) => list,
        Err(e) => return report_failure(ctx, "List Moderators", json!({}), e, true).await,
    };

    let users = if list.users.is_empty() {
        "None".to_string()
    } else {
        list.users
            .iter()
            .map(|u| {
                format!(
                    "{} {} ({}) added {}",
                    embeds::BULLET,
                    mention_user(UserId::new(u.id)),
                    u.display_name,
                    relative_time(u.added_at)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let roles = if list.roles.is_empty() {
        "None".to_string()
    } else {
        list.roles
            .iter()
            .map(|r| {
                format!(
                    "{} {} ({} members) added {}",
                    embeds::BULLET,
                    mention_role(r.id),
                    r.member_count,
                    relative_time(r.added_at)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let embed = embeds::standard_embed()
        .title("Moderators")
        .field(format!("Users ({})", list.users.len()), users, false)
        .field(format!("Roles ({})", list.roles.len()), roles, false)
        .field("Last Updated", relative_time(list.last_updated), true);

    reply(ctx, embed, true).await
}
