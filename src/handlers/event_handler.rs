use std::sync::Arc;

use poise::serenity_prelude::{self as serenity, FullEvent};
use tracing::{debug, error, info, warn};

use crate::bot::data::Data;
use crate::bot::error::Error;
use crate::handlers::interaction;
use crate::services::lifecycle::source::ComponentClass;

pub async fn event_handler(
    ctx: &serenity::Context,
    event: &FullEvent,
    _framework: poise::FrameworkContext<'_, Arc<Data>, Error>,
    data: &Arc<Data>,
) -> Result<(), Error> {
    let name = event.snake_case_name();
    if !data.lifecycle.is_active(ComponentClass::Events, name) {
        return Ok(());
    }

    match event {
        FullEvent::Ready { data_about_bot, .. } => {
            info!(
                "Bot ready as {} in {} guilds",
                data_about_bot.user.name,
                data_about_bot.guilds.len()
            );
        }

        FullEvent::CacheReady { guilds } => {
            debug!("Cache ready for {} guilds", guilds.len());
        }

        FullEvent::GuildCreate { guild, .. } => {
            debug!("Guild available: {} ({})", guild.name, guild.id);
        }

        FullEvent::InteractionCreate { interaction } => {
            // Slash commands go through poise; only components are routed here
            if let serenity::Interaction::Component(_) = interaction {
                if let Err(e) = interaction::handle_interaction(ctx, data, interaction).await {
                    error!("Component interaction handler error: {:?}", e);
                }
            }
        }

        FullEvent::Ratelimit { data: info } => {
            warn!("Rate limited on {} for {:?}", info.path, info.timeout);
        }

        FullEvent::Resume { .. } => {
            info!("Gateway session resumed");
        }

        FullEvent::ShardStageUpdate { event } => {
            debug!("Shard {:?} stage: {:?} -> {:?}", event.shard_id, event.old, event.new);
        }

        _ => {}
    }

    Ok(())
}
