use serenity::all::{GuildId, User, UserId};

use crate::bot::data::Context;
use crate::services::moderation::guards::{Standing, Target};
use crate::services::moderation::permissions::ActorFacts;

/// Roles and admin flag of the invoking member
pub async fn actor_facts(ctx: Context<'_>) -> ActorFacts {
    let user_id = ctx.author().id.get();

    match ctx.author_member().await {
        Some(member) => ActorFacts {
            user_id,
            role_ids: member.roles.iter().map(|r| r.get()).collect(),
            is_platform_admin: member
                .permissions
                .map(|p| p.administrator())
                .unwrap_or(false),
        },
        None => ActorFacts {
            user_id,
            ..ActorFacts::default()
        },
    }
}

/// Highest role position and ownership of a guild member, or `None` if the
/// user is not a member
pub async fn standing(ctx: Context<'_>, guild_id: GuildId, user_id: UserId) -> Option<Standing> {
    let member = guild_id.member(ctx.serenity_context(), user_id).await.ok()?;

    let guild = ctx.guild()?;
    let top_role = member
        .roles
        .iter()
        .filter_map(|role_id| guild.roles.get(role_id))
        .map(|role| role.position)
        .max()
        .unwrap_or(0);

    Some(Standing {
        user_id: user_id.get(),
        top_role,
        is_guild_owner: guild.owner_id == user_id,
    })
}

pub async fn target(ctx: Context<'_>, guild_id: GuildId, user: &User) -> Target {
    Target {
        user_id: user.id.get(),
        is_bot: user.bot,
        standing: standing(ctx, guild_id, user.id).await,
    }
}

/// Standing of the bot itself; a missing member reads as the lowest rank
pub async fn bot_standing(ctx: Context<'_>, guild_id: GuildId) -> Standing {
    let bot_id = ctx.framework().bot_id;
    standing(ctx, guild_id, bot_id).await.unwrap_or(Standing {
        user_id: bot_id.get(),
        top_role: 0,
        is_guild_owner: false,
    })
}

/// Standing of the invoking member
pub async fn actor_standing(ctx: Context<'_>, guild_id: GuildId) -> Standing {
    let author = ctx.author().id;
    standing(ctx, guild_id, author).await.unwrap_or(Standing {
        user_id: author.get(),
        top_role: 0,
        is_guild_owner: false,
    })
}
