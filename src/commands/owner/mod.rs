pub mod moderators;
pub mod reload;

use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::commands::moderation::refuse;

/// Reply with a denial and return false unless the author is a bot owner
pub async fn require_owner(ctx: Context<'_>) -> Result<bool, Error> {
    if ctx.data().is_owner(ctx.author().id.get()) {
        return Ok(true);
    }

    refuse(
        ctx,
        "Owner Only",
        "Only the bot owners can use this command.",
    )
    .await?;
    Ok(false)
}
