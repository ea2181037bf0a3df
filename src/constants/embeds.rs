use serenity::all::{Colour, CreateEmbed, CreateEmbedFooter};

// ============================================================================
// Color Palette
// ============================================================================

/// Neutral listings (cases, status, logs)
pub const PRIMARY_COLOR: Colour = Colour::from_rgb(59, 130, 246);

/// Completed actions
pub const SUCCESS_COLOR: Colour = Colour::from_rgb(16, 185, 129);

/// Refusals and failures
pub const ERROR_COLOR: Colour = Colour::from_rgb(244, 63, 94);

/// Warnings issued, confirmations pending
pub const WARNING_COLOR: Colour = Colour::from_rgb(245, 158, 11);

pub const INFO_COLOR: Colour = Colour::from_rgb(100, 116, 139);

pub const BULLET: &str = "•";

// ============================================================================
// Embed Builders
// ============================================================================

pub fn standard_embed() -> CreateEmbed {
    CreateEmbed::new().color(PRIMARY_COLOR)
}

pub fn success_embed() -> CreateEmbed {
    CreateEmbed::new().color(SUCCESS_COLOR)
}

pub fn error_embed() -> CreateEmbed {
    CreateEmbed::new().color(ERROR_COLOR)
}

pub fn warning_embed() -> CreateEmbed {
    CreateEmbed::new().color(WARNING_COLOR)
}

pub fn info_embed() -> CreateEmbed {
    CreateEmbed::new().color(INFO_COLOR)
}

/// Footer noting whether the target was told by DM
pub fn dm_footer(notified: bool) -> CreateEmbedFooter {
    CreateEmbedFooter::new(if notified {
        "The user was notified by DM"
    } else {
        "The user could not be notified by DM"
    })
}
