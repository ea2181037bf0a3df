pub mod ban;
pub mod cases;
pub mod kick;
pub mod timeout;
pub mod unban;
pub mod unwarn;
pub mod warn;

use poise::serenity_prelude::{CreateEmbed, CreateMessage, GuildId, User, UserId};
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::constants::embeds;
use crate::constants::limits::{MAX_ERROR_DETAIL_LENGTH, MAX_REASON_LENGTH};
use crate::db::models::{ActorSnapshot, GuildSnapshot, LogType};
use crate::services::audit::log::{NewLogEntry, MOD_LOG};
use crate::services::moderation::guards::{self, Refusal};
use crate::services::moderation::permissions;
use crate::utils::formatting::truncate;
use crate::utils::permissions as platform;

pub const NO_REASON: &str = "No reason provided";

/// The active warning count, or `None` when the ledger could not be read
pub fn active_warnings(counted: Result<usize, Error>) -> Option<usize> {
    counted
        .map_err(|e| warn!("Could not count active warnings: {}", e))
        .ok()
}

/// Adds the "Active Warnings" field only when the count is known
pub fn with_active_warnings(embed: CreateEmbed, count: Option<usize>) -> CreateEmbed {
    match count {
        Some(count) => embed.field("Active Warnings", count.to_string(), true),
        None => embed,
    }
}

pub fn actor_snapshot(user: &User) -> ActorSnapshot {
    ActorSnapshot {
        id: user.id.get(),
        username: user.name.clone(),
    }
}

pub fn guild_snapshot(ctx: Context<'_>) -> Option<GuildSnapshot> {
    let guild_id = ctx.guild_id()?;
    let name = ctx
        .guild()
        .map(|g| g.name.clone())
        .unwrap_or_else(|| guild_id.to_string());

    Some(GuildSnapshot {
        id: guild_id.get(),
        name,
    })
}

pub fn guild_id(ctx: Context<'_>) -> Result<GuildId, Error> {
    ctx.guild_id()
        .ok_or_else(|| Error::validation("This command can only be used in a server"))
}

/// Accepts a raw snowflake or a mention
pub fn parse_user_id(raw: &str) -> Option<u64> {
    raw.trim()
        .trim_start_matches("<@")
        .trim_start_matches('!')
        .trim_end_matches('>')
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
}

/// The user given as an option, or the one behind a raw id
pub async fn resolve_user(
    ctx: Context<'_>,
    user: Option<User>,
    raw_id: Option<String>,
) -> Result<User, Error> {
    if let Some(user) = user {
        return Ok(user);
    }

    let raw = raw_id.ok_or_else(|| Error::validation("Provide a user or a user ID"))?;
    let id = parse_user_id(&raw)
        .ok_or_else(|| Error::validation(format!("`{}` is not a valid user ID", raw)))?;

    UserId::new(id)
        .to_user(ctx.serenity_context())
        .await
        .map_err(|_| Error::not_found(format!("user {}", id)))
}

pub fn guild_name(ctx: Context<'_>) -> String {
    guild_snapshot(ctx)
        .map(|g| g.name)
        .unwrap_or_else(|| "the server".to_string())
}

pub fn reason_or_default(reason: Option<String>) -> String {
    match reason {
        Some(r) if !r.trim().is_empty() => truncate(r.trim(), MAX_REASON_LENGTH),
        _ => NO_REASON.to_string(),
    }
}

pub async fn reply(ctx: Context<'_>, embed: CreateEmbed, silent: bool) -> Result<(), Error> {
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(silent))
        .await?;
    Ok(())
}

/// Ephemeral explanation for a refused request
pub async fn refuse(ctx: Context<'_>, title: &str, message: &str) -> Result<(), Error> {
    let embed = embeds::error_embed().title(title).description(message);
    reply(ctx, embed, true).await
}

/// Reply with a denial and return false unless the author may moderate
pub async fn require_moderator(ctx: Context<'_>) -> Result<bool, Error> {
    let data = ctx.data();
    let facts = platform::actor_facts(ctx).await;

    if permissions::resolve(&data.registry, &facts, &data.owners).await {
        return Ok(true);
    }

    refuse(
        ctx,
        "Permission Denied",
        "You need to be a bot owner, a registered moderator or a server administrator to use this command.",
    )
    .await?;
    Ok(false)
}

/// Self, bot and role-hierarchy refusals for actions on members
pub async fn check_target(ctx: Context<'_>, guild_id: GuildId, user: &User) -> Option<Refusal> {
    let actor = platform::actor_standing(ctx, guild_id).await;
    let bot = platform::bot_standing(ctx, guild_id).await;
    let target = platform::target(ctx, guild_id, user).await;

    guards::check_target(&actor, &bot, &target).err()
}

/// Best-effort DM to the subject of an action
pub async fn notify_target(ctx: Context<'_>, user: &User, embed: CreateEmbed) -> bool {
    match user
        .direct_message(ctx.serenity_context(), CreateMessage::new().embed(embed))
        .await
    {
        Ok(_) => true,
        Err(e) => {
            debug!("Could not DM {}: {}", user.id, e);
            false
        }
    }
}

pub fn target_details(user: &User, reason: &str, extra: Value) -> Value {
    let mut details = json!({
        "targetUser": { "id": user.id.get(), "username": user.name },
        "reason": reason,
    });

    if let (Some(map), Value::Object(extra)) = (details.as_object_mut(), extra) {
        map.extend(extra);
    }
    details
}

/// Append a moderation entry; failures to log never fail the command
pub async fn record_action(ctx: Context<'_>, action: &str, details: Value, outcome: Result<(), &Error>) {
    let mut entry = NewLogEntry::new("moderation", action)
        .user(actor_snapshot(ctx.author()))
        .guild(guild_snapshot(ctx))
        .details(details);

    entry = match outcome {
        Ok(()) => entry.kind(LogType::Success),
        Err(e) => entry.failed(e.to_string()),
    };

    if let Err(e) = ctx.data().audit.record(MOD_LOG, entry).await {
        error!("Failed to record {} in moderation log: {:?}", action, e);
    }
}

/// Log, audit and explain a failed action
pub async fn report_failure(
    ctx: Context<'_>,
    action: &str,
    details: Value,
    err: Error,
    silent: bool,
) -> Result<(), Error> {
    if err.is_user_facing() {
        return refuse(ctx, &format!("{} Failed", action), &err.to_string()).await;
    }

    error!("{} failed: {:?}", action, err);
    record_action(ctx, action, details, Err(&err)).await;

    let embed = embeds::error_embed()
        .title(format!("{} Failed", action))
        .description("Something went wrong while performing this action.")
        .field(
            "Details",
            format!("```{}```", truncate(&err.to_string(), MAX_ERROR_DETAIL_LENGTH)),
            false,
        );
    reply(ctx, embed, silent).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_id() {
        assert_eq!(parse_user_id("123456789012345678"), Some(123456789012345678));
        assert_eq!(parse_user_id("<@!42>"), Some(42));
        assert_eq!(parse_user_id(" <@42> "), Some(42));
        assert_eq!(parse_user_id("0"), None);
        assert_eq!(parse_user_id("abc"), None);
    }

    #[test]
    fn test_reason_or_default() {
        assert_eq!(reason_or_default(None), NO_REASON);
        assert_eq!(reason_or_default(Some("   ".to_string())), NO_REASON);
        assert_eq!(reason_or_default(Some(" spam ".to_string())), "spam");
        assert_eq!(
            reason_or_default(Some("x".repeat(600))).chars().count(),
            MAX_REASON_LENGTH
        );
    }

    #[test]
    fn test_active_warnings_drops_unreadable_counts() {
        assert_eq!(active_warnings(Ok(3)), Some(3));
        assert_eq!(active_warnings(Err(Error::custom("store offline"))), None);

        let base = CreateEmbed::new().title("User Warned");
        assert_eq!(with_active_warnings(base.clone(), None), base.clone());
        assert_eq!(
            with_active_warnings(base.clone(), Some(2)),
            base.field("Active Warnings", "2", true)
        );
    }
}
