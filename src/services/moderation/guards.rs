use std::fmt;

/// A guild member's position for hierarchy checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Standing {
    pub user_id: u64,
    /// Position of the member's highest role (0 = @everyone only)
    pub top_role: u16,
    pub is_guild_owner: bool,
}

/// The subject of a moderation action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub user_id: u64,
    pub is_bot: bool,
    /// `None` when the user is not in the guild (ban by id, unban)
    pub standing: Option<Standing>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    SelfTarget,
    BotTarget,
    GuildOwner,
    ActorOutranked,
    BotOutranked,
}

impl Refusal {
    pub fn message(&self) -> &'static str {
        match self {
            Refusal::SelfTarget => "You cannot use this on yourself.",
            Refusal::BotTarget => "Bots cannot be the target of this command.",
            Refusal::GuildOwner => "The server owner cannot be moderated.",
            Refusal::ActorOutranked => {
                "You cannot moderate a member whose highest role is equal to or above yours."
            }
            Refusal::BotOutranked => {
                "I cannot moderate this member because their highest role is equal to or above mine."
            }
        }
    }
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Early refusals checked before any mutation. Hierarchy only applies when
/// the target is a member of the guild.
pub fn check_target(actor: &Standing, bot: &Standing, target: &Target) -> Result<(), Refusal> {
    if target.user_id == actor.user_id {
        return Err(Refusal::SelfTarget);
    }

    if target.is_bot || target.user_id == bot.user_id {
        return Err(Refusal::BotTarget);
    }

    let Some(member) = target.standing else {
        return Ok(());
    };

    if member.is_guild_owner {
        return Err(Refusal::GuildOwner);
    }

    if !actor.is_guild_owner && member.top_role >= actor.top_role {
        return Err(Refusal::ActorOutranked);
    }

    if member.top_role >= bot.top_role {
        return Err(Refusal::BotOutranked);
    }

    Ok(())
}

/// Warnings only need the self/bot refusals
pub fn check_warn_target(actor_id: u64, bot_id: u64, target: &Target) -> Result<(), Refusal> {
    if target.user_id == actor_id {
        return Err(Refusal::SelfTarget);
    }
    if target.is_bot || target.user_id == bot_id {
        return Err(Refusal::BotTarget);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standing(user_id: u64, top_role: u16) -> Standing {
        Standing {
            user_id,
            top_role,
            is_guild_owner: false,
        }
    }

    fn member(user_id: u64, top_role: u16) -> Target {
        Target {
            user_id,
            is_bot: false,
            standing: Some(standing(user_id, top_role)),
        }
    }

    #[test]
    fn test_self_and_bot_targets() {
        let actor = standing(1, 10);
        let bot = standing(2, 20);

        assert_eq!(check_target(&actor, &bot, &member(1, 0)), Err(Refusal::SelfTarget));
        assert_eq!(check_target(&actor, &bot, &member(2, 0)), Err(Refusal::BotTarget));

        let other_bot = Target {
            user_id: 3,
            is_bot: true,
            standing: None,
        };
        assert_eq!(check_target(&actor, &bot, &other_bot), Err(Refusal::BotTarget));
    }

    #[test]
    fn test_role_hierarchy() {
        let actor = standing(1, 10);
        let bot = standing(2, 20);

        assert_eq!(check_target(&actor, &bot, &member(5, 9)), Ok(()));
        assert_eq!(
            check_target(&actor, &bot, &member(5, 10)),
            Err(Refusal::ActorOutranked)
        );

        let owner = Standing {
            is_guild_owner: true,
            ..actor
        };
        assert_eq!(check_target(&owner, &bot, &member(5, 15)), Ok(()));
        assert_eq!(
            check_target(&owner, &bot, &member(5, 25)),
            Err(Refusal::BotOutranked)
        );
    }

    #[test]
    fn test_guild_owner_target() {
        let target = Target {
            user_id: 5,
            is_bot: false,
            standing: Some(Standing {
                user_id: 5,
                top_role: 0,
                is_guild_owner: true,
            }),
        };
        assert_eq!(
            check_target(&standing(1, 10), &standing(2, 20), &target),
            Err(Refusal::GuildOwner)
        );
    }

    #[test]
    fn test_non_member_skips_hierarchy() {
        let target = Target {
            user_id: 5,
            is_bot: false,
            standing: None,
        };
        assert_eq!(check_target(&standing(1, 0), &standing(2, 0), &target), Ok(()));
    }

    #[test]
    fn test_warn_target() {
        let target = member(5, 50);
        assert_eq!(check_warn_target(1, 2, &target), Ok(()));
        assert_eq!(check_warn_target(5, 2, &target), Err(Refusal::SelfTarget));
        assert_eq!(check_warn_target(1, 5, &target), Err(Refusal::BotTarget));
    }
}
