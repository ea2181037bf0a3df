use std::sync::Arc;

use serenity::all::{
    ComponentInteraction, Context, CreateInteractionResponse, CreateInteractionResponseMessage,
    Interaction,
};
use tracing::{debug, error};

use crate::bot::data::Data;
use crate::bot::error::Error;
use crate::components::callbacks::{parse_custom_id, ComponentCall, ExecuteOutcome};
use crate::constants::embeds;
use crate::constants::limits::MAX_ERROR_DETAIL_LENGTH;
use crate::utils::formatting::truncate;

pub async fn handle_interaction(
    ctx: &Context,
    data: &Arc<Data>,
    interaction: &Interaction,
) -> Result<(), Error> {
    match interaction {
        Interaction::Component(component) => {
            handle_component(ctx, data, component).await?;
        }
        Interaction::Command(_) => {
            // Slash commands are handled by poise framework, not here
            debug!("Received ApplicationCommand interaction - should be handled by poise");
        }
        _ => {
            debug!("Unhandled interaction type: {:?}", interaction.kind());
        }
    }

    Ok(())
}

async fn handle_component(
    ctx: &Context,
    data: &Arc<Data>,
    component: &ComponentInteraction,
) -> Result<(), Error> {
    let custom_id = &component.data.custom_id;
    debug!("Component interaction: {}", custom_id);

    let Some((token, action)) = parse_custom_id(custom_id) else {
        debug!("Unknown component interaction: {}", custom_id);
        return Ok(());
    };

    let call = ComponentCall {
        ctx: ctx.clone(),
        interaction: component.clone(),
        action: action.to_string(),
    };

    match data.callbacks.execute(token, call).await {
        Ok(ExecuteOutcome::Executed) => {}
        Ok(ExecuteOutcome::Expired) | Ok(ExecuteOutcome::NotFound) => {
            send_component_error(
                ctx,
                component,
                "This interaction has expired. Run the command again.",
            )
            .await?;
        }
        Err(e) => {
            error!("Component interaction error for {}: {:?}", custom_id, e);
            // The callback may already have answered, so a failure here is not fatal
            let _ = send_component_error(
                ctx,
                component,
                &format!("An error occurred: {}", truncate(&e.to_string(), MAX_ERROR_DETAIL_LENGTH)),
            )
            .await;
        }
    }

    Ok(())
}

/// Send an ephemeral error message for a component interaction
pub async fn send_component_error(
    ctx: &Context,
    component: &ComponentInteraction,
    message: &str,
) -> Result<(), Error> {
    let embed = embeds::error_embed()
        .title("Error")
        .description(message);

    component
        .create_response(
            ctx,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embed)
                    .ephemeral(true),
            ),
        )
        .await?;

    Ok(())
}
