pub mod moderation;
pub mod owner;
pub mod utility;

use std::sync::Arc;

use crate::bot::data::Data;
use crate::bot::error::Error;
use crate::services::lifecycle::source::ComponentDescriptor;

/// Always available so a broken command reload can be undone
pub const RELOAD_COMMAND: &str = "reload";

/// Every slash command the bot can register
pub fn all() -> Vec<poise::Command<Arc<Data>, Error>> {
    vec![
        moderation::ban::ban(),
        moderation::kick::kick(),
        moderation::timeout::timeout(),
        moderation::timeout::untimeout(),
        moderation::unban::unban(),
        moderation::warn::warn(),
        moderation::unwarn::unwarn(),
        moderation::cases::cases(),
        owner::moderators::moderators(),
        owner::reload::reload(),
        utility::converter::converter(),
    ]
}

/// Command discovery for the lifecycle manager
pub fn registry() -> Vec<ComponentDescriptor> {
    all()
        .into_iter()
        .map(|cmd| ComponentDescriptor::with_detail(cmd.name, cmd.description.unwrap_or_default()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_command_names_are_unique() {
        let names: Vec<_> = registry().into_iter().map(|d| d.name).collect();
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(names.len(), unique.len());
    }

    #[test]
    fn test_registry_contains_every_command() {
        let names: HashSet<_> = registry().into_iter().map(|d| d.name).collect();
        for expected in [
            "ban", "kick", "timeout", "untimeout", "unban", "warn", "unwarn", "cases", "mod",
            RELOAD_COMMAND, "converter",
        ] {
            assert!(names.contains(expected), "missing {}", expected);
        }
    }
}
