use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use poise::serenity_prelude::{
    ChannelId, CommandInteraction, CreateAttachment, CreateMessage, EditInteractionResponse, Http,
    UserId,
};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::bot::data::{Context, Data};
use crate::bot::error::Error;
use crate::commands::moderation::{refuse, report_failure};
use crate::constants::limits::MAX_UPLOAD_BYTES;
use crate::constants::timeouts::PROGRESS_EDIT_INTERVAL;
use crate::services::converter::delivery::{deliver, Delivery, DeliveryRoute, DeliveryTarget};
use crate::services::converter::transcoder::{
    is_supported_url, remove_quietly, MediaFormat, MediaInfo,
};
use crate::utils::formatting::format_bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum Mp3Quality {
    #[name = "96 kbps"]
    Kbps96,
    #[name = "128 kbps"]
    Kbps128,
    #[name = "192 kbps"]
    Kbps192,
    #[name = "256 kbps"]
    Kbps256,
    #[name = "320 kbps"]
    Kbps320,
}

impl Mp3Quality {
    pub fn kbps(&self) -> u32 {
        match self {
            Mp3Quality::Kbps96 => 96,
            Mp3Quality::Kbps128 => 128,
            Mp3Quality::Kbps192 => 192,
            Mp3Quality::Kbps256 => 256,
            Mp3Quality::Kbps320 => 320,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum Mp4Quality {
    #[name = "144p"]
    P144,
    #[name = "240p"]
    P240,
    #[name = "360p"]
    P360,
    #[name = "480p"]
    P480,
    #[name = "720p"]
    P720,
    #[name = "1080p"]
    P1080,
}

impl Mp4Quality {
    pub fn height(&self) -> u32 {
        match self {
            Mp4Quality::P144 => 144,
            Mp4Quality::P240 => 240,
            Mp4Quality::P360 => 360,
            Mp4Quality::P480 => 480,
            Mp4Quality::P720 => 720,
            Mp4Quality::P1080 => 1080,
        }
    }
}

/// Convert a YouTube video to audio or video files
#[poise::command(slash_command, subcommands("mp3", "mp4"), subcommand_required)]
pub async fn converter(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Convert to MP3 audio
#[poise::command(slash_command)]
pub async fn mp3(
    ctx: Context<'_>,
    #[description = "YouTube link"] url: String,
    #[description = "Audio bitrate"] quality: Option<Mp3Quality>,
) -> Result<(), Error> {
    let kbps = quality.unwrap_or(Mp3Quality::Kbps192).kbps();
    start_conversion(ctx, url, MediaFormat::mp3(kbps)?).await
}

/// Convert to MP4 video
#[poise::command(slash_command)]
pub async fn mp4(
    ctx: Context<'_>,
    #[description = "YouTube link"] url: String,
    #[description = "Maximum video height"] quality: Option<Mp4Quality>,
) -> Result<(), Error> {
    let height = quality.unwrap_or(Mp4Quality::P720).height();
    start_conversion(ctx, url, MediaFormat::mp4(height)?).await
}

async fn start_conversion(ctx: Context<'_>, url: String, format: MediaFormat) -> Result<(), Error> {
    let started = Instant::now();
    let url = url.trim().to_string();
    let user_id = ctx.author().id;
    let data = ctx.data().clone();

    if !is_supported_url(&url) {
        return refuse(ctx, "Unsupported Link", "Only YouTube links can be converted.").await;
    }

    // Held until the job ends; every early return below frees it
    let Some(reservation) = data.conversions.try_reserve(user_id.get()) else {
        return refuse(
            ctx,
            "Conversion Running",
            "You already have a conversion in progress. Wait for it to finish.",
        )
        .await;
    };
    let ticket = reservation.ticket();

    let poise::Context::Application(app) = ctx else {
        return refuse(ctx, "Unsupported", "Use the slash command to convert media.").await;
    };
    let interaction = app.interaction.clone();

    ctx.defer().await?;

    let info = match data.transcoder.fetch_info(&url).await {
        Ok(info) => info,
        Err(e) => {
            let details = serde_json::json!({ "url": url });
            return report_failure(ctx, "Convert", details, e, false).await;
        }
    };

    if let Err(e) = info.ensure_within_limit() {
        return refuse(ctx, "Too Long", &e.to_string()).await;
    }

    ctx.say(format!("Converting **{}** to {}... 0%", info.title, format.label()))
        .await?;

    let job = ConversionJob {
        data: data.clone(),
        http: ctx.serenity_context().http.clone(),
        interaction,
        channel_id: ctx.channel_id(),
        user_id,
        url,
        format,
        info,
        started,
    };

    let handle = tokio::spawn(async move {
        let _reservation = reservation;
        job.run().await;
    });
    data.conversions.attach(user_id.get(), ticket, handle);

    Ok(())
}

struct ConversionJob {
    data: Arc<Data>,
    http: Arc<Http>,
    interaction: CommandInteraction,
    channel_id: ChannelId,
    user_id: UserId,
    url: String,
    format: MediaFormat,
    info: MediaInfo,
    started: Instant,
}

impl ConversionJob {
    async fn run(self) {
        let (tx, rx) = watch::channel(0u8);
        let progress = spawn_progress_updates(
            self.http.clone(),
            self.interaction.clone(),
            format!("Converting **{}** to {}...", self.info.title, self.format.label()),
            rx,
        );

        let result = self
            .data
            .transcoder
            .convert(&self.url, self.format, move |percent| {
                let _ = tx.send(percent);
            })
            .await;
        progress.abort();

        let delivery = match &result {
            Ok(path) => match tokio::fs::metadata(path).await {
                Ok(meta) if meta.len() > MAX_UPLOAD_BYTES => Delivery {
                    content: format!(
                        "**{}** converted to {} is {}, over the {} upload limit. Try a lower quality.",
                        self.info.title,
                        self.format.label(),
                        format_bytes(meta.len()),
                        format_bytes(MAX_UPLOAD_BYTES)
                    ),
                    file: None,
                },
                Ok(meta) => Delivery {
                    content: format!(
                        "**{}** ({}, {})",
                        self.info.title,
                        self.format.label(),
                        format_bytes(meta.len())
                    ),
                    file: Some(path.clone()),
                },
                Err(e) => Delivery {
                    content: format!("Conversion of **{}** failed: {}", self.info.title, e),
                    file: None,
                },
            },
            Err(e) => Delivery {
                content: format!("Conversion of **{}** failed: {}", self.info.title, e),
                file: None,
            },
        };

        match deliver(&self, self.started.elapsed(), &delivery).await {
            Ok(route) => info!(
                "Conversion for {} delivered via {}",
                self.user_id,
                route.as_str()
            ),
            Err(e) => error!("Could not deliver conversion for {}: {:?}", self.user_id, e),
        }

        if let Ok(path) = &result {
            remove_quietly(path).await;
        }
    }
}

#[async_trait]
impl DeliveryTarget for ConversionJob {
    async fn send(&self, route: DeliveryRoute, delivery: &Delivery) -> Result<(), Error> {
        let attachment = match &delivery.file {
            Some(path) => Some(CreateAttachment::path(path).await?),
            None => None,
        };

        match route {
            DeliveryRoute::InteractionReply => {
                let mut edit = EditInteractionResponse::new().content(&delivery.content);
                if let Some(attachment) = attachment {
                    edit = edit.new_attachment(attachment);
                }
                self.interaction.edit_response(&*self.http, edit).await?;
            }
            DeliveryRoute::DirectMessage => {
                let channel = self.user_id.create_dm_channel(&*self.http).await?;
                channel
                    .send_message(&*self.http, message(delivery, attachment))
                    .await?;
            }
            DeliveryRoute::Channel => {
                let mention = Delivery {
                    content: format!("<@{}> {}", self.user_id, delivery.content),
                    file: None,
                };
                self.channel_id
                    .send_message(&*self.http, message(&mention, attachment))
                    .await?;
            }
        }

        Ok(())
    }
}

fn message(delivery: &Delivery, attachment: Option<CreateAttachment>) -> CreateMessage {
    let msg = CreateMessage::new().content(&delivery.content);
    match attachment {
        Some(attachment) => msg.add_file(attachment),
        None => msg,
    }
}

/// Edit the reply with the latest percentage, at most once per interval
fn spawn_progress_updates(
    http: Arc<Http>,
    interaction: CommandInteraction,
    prefix: String,
    mut rx: watch::Receiver<u8>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PROGRESS_EDIT_INTERVAL);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if !rx.has_changed().unwrap_or(false) {
                continue;
            }

            let percent = *rx.borrow_and_update();
            let edit = EditInteractionResponse::new().content(format!("{} {}%", prefix, percent));
            if let Err(e) = interaction.edit_response(&*http, edit).await {
                warn!("Could not update conversion progress: {}", e);
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::limits::{MP3_BITRATES, MP4_HEIGHTS};

    #[test]
    fn test_quality_choices_are_supported() {
        for q in [
            Mp3Quality::Kbps96,
            Mp3Quality::Kbps128,
            Mp3Quality::Kbps192,
            Mp3Quality::Kbps256,
            Mp3Quality::Kbps320,
        ] {
            assert!(MP3_BITRATES.contains(&q.kbps()));
            assert!(MediaFormat::mp3(q.kbps()).is_ok());
        }

        for q in [
            Mp4Quality::P144,
            Mp4Quality::P240,
            Mp4Quality::P360,
            Mp4Quality::P480,
            Mp4Quality::P720,
            Mp4Quality::P1080,
        ] {
            assert!(MP4_HEIGHTS.contains(&q.height()));
            assert!(MediaFormat::mp4(q.height()).is_ok());
        }
    }
}
