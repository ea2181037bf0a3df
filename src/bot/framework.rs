use std::sync::Arc;

use poise::serenity_prelude::{self as serenity, GatewayIntents, GuildId, Http};
use tracing::{error, info, warn};

use crate::bot::data::{Context, Data};
use crate::bot::error::Error;
use crate::commands::{self, RELOAD_COMMAND};
use crate::config::Settings;
use crate::constants::embeds;
use crate::constants::limits::MAX_ERROR_DETAIL_LENGTH;
use crate::db::store::Store;
use crate::handlers::background;
use crate::handlers::event_handler::event_handler;
use crate::services::lifecycle::source::ComponentClass;
use crate::utils::formatting::truncate;

/// Whether a command may run given what the lifecycle manager has loaded
pub fn command_allowed(data: &Data, name: &str) -> bool {
    name == RELOAD_COMMAND || data.lifecycle.is_active(ComponentClass::Commands, name)
}

async fn command_check(ctx: Context<'_>) -> Result<bool, Error> {
    // Subcommands are gated through their parent
    let name = ctx
        .parent_commands()
        .first()
        .map(|c| c.name.as_str())
        .unwrap_or(ctx.command().name.as_str());

    Ok(command_allowed(ctx.data(), name))
}

/// Register the loaded commands with Discord, per guild when GUILD_ID is set
pub async fn register_commands(http: &Http, data: &Data) -> Result<usize, Error> {
    let commands: Vec<_> = commands::all()
        .into_iter()
        .filter(|c| command_allowed(data, &c.name))
        .collect();

    match data.settings.guild_id {
        Some(guild_id) => {
            let guild_id = GuildId::new(guild_id);
            poise::builtins::register_in_guild(http, &commands, guild_id).await?;
            info!("Registered {} commands in guild {}", commands.len(), guild_id);
        }
        None => {
            poise::builtins::register_globally(http, &commands).await?;
            info!("Registered {} commands globally", commands.len());
            info!("Note: Global commands can take up to 1 hour to appear in all servers");
        }
    }

    Ok(commands.len())
}

async fn on_error(error: poise::FrameworkError<'_, Arc<Data>, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            if error.is_user_facing() {
                let embed = embeds::error_embed().title("Cannot Do That").description(error.to_string());
                let _ = ctx
                    .send(poise::CreateReply::default().embed(embed).ephemeral(true))
                    .await;
                return;
            }

            error!("Command /{} failed: {:?}", ctx.command().qualified_name, error);
            let embed = embeds::error_embed()
                .title("Something Went Wrong")
                .description(format!(
                    "```{}```",
                    truncate(&error.to_string(), MAX_ERROR_DETAIL_LENGTH)
                ));
            let _ = ctx
                .send(poise::CreateReply::default().embed(embed).ephemeral(true))
                .await;
        }
        poise::FrameworkError::CommandCheckFailed { ctx, error, .. } => {
            if let Some(e) = error {
                warn!("Command check for /{} errored: {:?}", ctx.command().name, e);
            }
            let embed = embeds::warning_embed()
                .title("Command Unavailable")
                .description("This command is currently unloaded. An owner can bring it back with `/reload`.");
            let _ = ctx
                .send(poise::CreateReply::default().embed(embed).ephemeral(true))
                .await;
        }
        poise::FrameworkError::ArgumentParse { error, ctx, .. } => {
            let _ = ctx.say(format!("Invalid argument: {}", error)).await;
        }
        poise::FrameworkError::UnknownCommand { .. } => {
            // Only slash commands are registered
        }
        err => {
            error!("Framework error: {:?}", err);
        }
    }
}

pub async fn run(settings: Settings, store: Store) -> Result<(), Error> {
    let data = Arc::new(Data::new(store, settings.clone()));
    let shutdown_data = data.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: None,
                ..Default::default()
            },
            command_check: Some(|ctx| Box::pin(command_check(ctx))),
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(|ctx, ready, _framework| {
            Box::pin(async move {
                info!("Bot connected as {}", ready.user.name);

                match data.lifecycle.load_all().await {
                    Ok(reports) => {
                        let total: usize = reports.iter().map(|r| r.count).sum();
                        info!("Loaded {} components", total);
                    }
                    Err(e) => {
                        error!("Startup load incomplete: {}", e);
                    }
                }

                background::spawn_callback_sweeper(data.clone());
                background::spawn_log_retention(data.clone());
                info!("Started background handlers");

                if let Err(e) = register_commands(&ctx.http, &data).await {
                    error!("Failed to register commands: {:?}", e);
                    error!(
                        "Re-invite URL: https://discord.com/api/oauth2/authorize?client_id={}&permissions=0&scope=bot%20applications.commands",
                        ready.user.id
                    );
                    return Err(e);
                }

                Ok(data)
            })
        })
        .build();

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_MEMBERS;

    let mut client = serenity::ClientBuilder::new(&settings.discord_token, intents)
        .framework(framework)
        .await
        .map_err(Error::Serenity)?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down...");
            shutdown_data.conversions.abort_all();
            shutdown_data.lifecycle.shutdown();
            shard_manager.shutdown_all().await;
        }
    });

    info!("Starting Discord client...");
    client.start().await.map_err(Error::Serenity)
}
