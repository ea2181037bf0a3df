use std::sync::Arc;

use chrono::Utc;
use poise::serenity_prelude::{
    ButtonStyle, CreateActionRow, CreateAttachment, CreateButton, CreateEmbed,
    CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse, Http,
};
use sysinfo::{get_current_pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::{error, info, warn};

use crate::bot::data::{Context, Data};
use crate::bot::error::Error;
use crate::bot::framework::register_commands;
use crate::commands::moderation::{actor_snapshot, guild_snapshot, reply, report_failure};
use crate::commands::owner::require_owner;
use crate::components::callbacks::{custom_id, ComponentCall};
use crate::constants::embeds;
use crate::constants::limits::{DEFAULT_RECENT_LOGS, MAX_RECENT_LOGS};
use crate::constants::timeouts::CONFIRMATION_TTL;
use crate::db::models::LogType;
use crate::services::audit::export::{self, ExportFormat};
use crate::services::audit::log::{NewLogEntry, MOD_LOG, RELOAD_LOG};
use crate::services::lifecycle::manager::{ReloadActor, ReloadError, ReloadReport};
use crate::services::lifecycle::source::{ComponentClass, ComponentDescriptor};
use crate::services::stats::chart_generator::generate_log_stats_chart;
use crate::utils::formatting::{format_bytes, format_number, format_uptime, relative_time, truncate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum LogCollection {
    #[name = "moderation"]
    Moderation,
    #[name = "reload"]
    Reload,
}

impl LogCollection {
    pub fn collection(&self) -> &'static str {
        match self {
            LogCollection::Moderation => MOD_LOG,
            LogCollection::Reload => RELOAD_LOG,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum LogTypeChoice {
    #[name = "info"]
    Info,
    #[name = "success"]
    Success,
    #[name = "warning"]
    Warning,
    #[name = "error"]
    Error,
    #[name = "debug"]
    Debug,
}

impl From<LogTypeChoice> for LogType {
    fn from(choice: LogTypeChoice) -> Self {
        match choice {
            LogTypeChoice::Info => LogType::Info,
            LogTypeChoice::Success => LogType::Success,
            LogTypeChoice::Warning => LogType::Warning,
            LogTypeChoice::Error => LogType::Error,
            LogTypeChoice::Debug => LogType::Debug,
        }
    }
}

/// What `/reload quick` reloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum QuickModule {
    #[name = "all"]
    All,
    #[name = "commands"]
    Commands,
    #[name = "events"]
    Events,
    #[name = "handlers"]
    Handlers,
    #[name = "collections"]
    Collections,
}

impl QuickModule {
    pub fn class(&self) -> Option<ComponentClass> {
        match self {
            QuickModule::All => None,
            QuickModule::Commands => Some(ComponentClass::Commands),
            QuickModule::Events => Some(ComponentClass::Events),
            QuickModule::Handlers => Some(ComponentClass::Handlers),
            QuickModule::Collections => Some(ComponentClass::Collections),
        }
    }

    fn label(&self) -> &'static str {
        match self.class() {
            Some(class) => class.as_str(),
            None => "everything",
        }
    }

    fn describe(&self) -> String {
        match self.class() {
            Some(class) => format!("All {} will be reloaded.", class.as_str()),
            None => "Commands, events, handlers and collections will be reloaded in that order.".to_string(),
        }
    }
}

/// Reload bot components and inspect the reload logs
#[poise::command(
    slash_command,
    subcommands("quick", "selective", "status", "logs", "purge"),
    subcommand_required
)]
pub async fn reload(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

fn reload_actor(ctx: Context<'_>) -> ReloadActor {
    ReloadActor {
        user: Some(actor_snapshot(ctx.author())),
        guild: guild_snapshot(ctx),
    }
}

fn report_lines(reports: &[ReloadReport]) -> String {
    reports
        .iter()
        .map(|r| {
            format!(
                "{} **{}**: {} ({} ms)",
                embeds::BULLET,
                r.class.as_str(),
                r.changes().join(", "),
                r.duration.as_millis()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn reload_all_embed(result: &Result<Vec<ReloadReport>, ReloadError>, registered: Option<usize>) -> CreateEmbed {
    let embed = match result {
        Ok(reports) => embeds::success_embed()
            .title("Reload Complete")
            .description(report_lines(reports)),
        Err(e) => {
            let completed = if e.completed.is_empty() {
                "Nothing was reloaded.".to_string()
            } else {
                report_lines(&e.completed)
            };
            embeds::error_embed()
                .title("Reload Failed")
                .description(completed)
                .field(
                    format!("Failed at {}", e.class.as_str()),
                    truncate(&e.source.to_string(), 1000),
                    false,
                )
        }
    };

    match registered {
        Some(n) => embed.field("Slash Commands", format!("{} registered", n), true),
        None => embed,
    }
}

/// Re-register slash commands after a command reload, logging failures
async fn refresh_commands(http: &Http, data: &Data) -> Option<usize> {
    match register_commands(http, data).await {
        Ok(n) => Some(n),
        Err(e) => {
            error!("Failed to re-register commands after reload: {:?}", e);
            None
        }
    }
}

async fn run_quick_reload(
    call: ComponentCall,
    data: Arc<Data>,
    module: QuickModule,
    actor: ReloadActor,
) -> Result<(), Error> {
    call.interaction
        .create_response(
            &call.ctx,
            CreateInteractionResponse::UpdateMessage(
                CreateInteractionResponseMessage::new()
                    .embed(
                        embeds::info_embed()
                            .title("Reloading")
                            .description(format!("Reloading {}...", module.label())),
                    )
                    .components(Vec::new()),
            ),
        )
        .await?;

    let result = match module.class() {
        Some(class) => data
            .lifecycle
            .reload(class, &actor)
            .await
            .map(|report| vec![report])
            .map_err(|source| ReloadError {
                class,
                completed: Vec::new(),
                source,
            }),
        None => data.lifecycle.reload_all(&actor).await,
    };
    let commands_reloaded = match &result {
        Ok(reports) => reports.iter().any(|r| r.class == ComponentClass::Commands),
        Err(e) => e.completed.iter().any(|r| r.class == ComponentClass::Commands),
    };
    let registered = if commands_reloaded {
        refresh_commands(&call.ctx.http, &data).await
    } else {
        None
    };

    call.interaction
        .edit_response(
            &call.ctx,
            EditInteractionResponse::new().embed(reload_all_embed(&result, registered)),
        )
        .await?;

    Ok(())
}

/// Reload one module, or everything, after confirmation
#[poise::command(slash_command)]
pub async fn quick(
    ctx: Context<'_>,
    #[description = "What to reload (default: all)"] module: Option<QuickModule>,
) -> Result<(), Error> {
    if !require_owner(ctx).await? {
        return Ok(());
    }

    let data = ctx.data().clone();
    let module = module.unwrap_or(QuickModule::All);
    let actor = reload_actor(ctx);

    // The prompt is ephemeral, so only the invoker can press its buttons
    let token = ctx.data().callbacks.register(
        CONFIRMATION_TTL,
        true,
        move |call: ComponentCall| {
            let data = data.clone();
            let actor = actor.clone();
            async move {
                if call.action == "confirm" {
                    return run_quick_reload(call, data, module, actor).await;
                }

                call.interaction
                    .create_response(
                        &call.ctx,
                        CreateInteractionResponse::UpdateMessage(
                            CreateInteractionResponseMessage::new()
                                .embed(embeds::info_embed().title("Reload Cancelled"))
                                .components(Vec::new()),
                        ),
                    )
                    .await?;
                Ok(())
            }
        },
    );

    let buttons = CreateActionRow::Buttons(vec![
        CreateButton::new(custom_id(&token, "confirm"))
            .label("Reload")
            .style(ButtonStyle::Danger),
        CreateButton::new(custom_id(&token, "cancel"))
            .label("Cancel")
            .style(ButtonStyle::Secondary),
    ]);

    let embed = embeds::warning_embed()
        .title(match module {
            QuickModule::All => "Reload Everything?".to_string(),
            other => format!("Reload {}?", other.label()),
        })
        .description(format!(
            "{}\nThis prompt expires in {} seconds.",
            module.describe(),
            CONFIRMATION_TTL.as_secs()
        ));

    ctx.send(
        poise::CreateReply::default()
            .embed(embed)
            .components(vec![buttons])
            .ephemeral(true),
    )
    .await?;

    Ok(())
}

/// Reload one class of components, or a single component of it
#[poise::command(slash_command)]
pub async fn selective(
    ctx: Context<'_>,
    #[description = "What to reload"] class: ComponentClass,
    #[description = "Only this component, e.g. a command or event name"]
    name: Option<String>,
) -> Result<(), Error> {
    if !require_owner(ctx).await? {
        return Ok(());
    }

    ctx.defer_ephemeral().await?;
    let data = ctx.data();
    let actor = reload_actor(ctx);
    let name = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

    let result = match &name {
        Some(name) => data.lifecycle.reload_one(class, name, &actor).await,
        None => data.lifecycle.reload(class, &actor).await,
    };
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            let details = serde_json::json!({ "class": class.as_str(), "component": name });
            return report_failure(ctx, "Reload", details, e, true).await;
        }
    };

    let target = match &name {
        Some(name) => format!("{}/{}", class.as_str(), name),
        None => class.as_str().to_string(),
    };
    let mut embed = embeds::success_embed()
        .title(format!("Reloaded {}", target))
        .description(report_lines(std::slice::from_ref(&report)));

    if class == ComponentClass::Commands {
        let registered = refresh_commands(ctx.http(), data).await;
        embed = embed.field(
            "Slash Commands",
            registered
                .map(|n| format!("{} registered", n))
                .unwrap_or_else(|| "Registration failed, see logs".to_string()),
            true,
        );
    }

    reply(ctx, embed, true).await
}

/// Resident memory of this process in bytes
fn resident_memory() -> Option<u64> {
    let pid = get_current_pid().ok()?;
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::nothing().with_memory(),
    );
    system.process(pid).map(|process| process.memory())
}

/// One line per loaded component, with its description when it has one
fn component_lines(components: &[ComponentDescriptor]) -> String {
    if components.is_empty() {
        return "Nothing loaded.".to_string();
    }
    components
        .iter()
        .map(|c| match &c.detail {
            Some(detail) => format!("{} `{}`: {}", embeds::BULLET, c.name, detail),
            None => format!("{} `{}`", embeds::BULLET, c.name),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Show what is loaded, uptime and memory use
#[poise::command(slash_command)]
pub async fn status(
    ctx: Context<'_>,
    #[description = "List the components of this class"] class: Option<ComponentClass>,
) -> Result<(), Error> {
    if !require_owner(ctx).await? {
        return Ok(());
    }

    let data = ctx.data();
    let mut embed = embeds::standard_embed().title("Component Status");

    if let Some(class) = class {
        let lines = component_lines(&data.lifecycle.components(class));
        embed = embed.description(truncate(&format!("**{}**\n{}", class.as_str(), lines), 4000));
    }

    for status in data.lifecycle.snapshot() {
        let changed = status
            .last_change
            .map(relative_time)
            .unwrap_or_else(|| "never".to_string());
        embed = embed.field(
            status.class.as_str(),
            format!("{} {}\n{} loaded\nchanged {}", embeds::BULLET, status.state.as_str(), status.count, changed),
            true,
        );
    }

    let memory = resident_memory()
        .map(format_bytes)
        .unwrap_or_else(|| "unavailable".to_string());

    embed = embed
        .field("Uptime", format_uptime(data.started_at.elapsed()), true)
        .field("Memory", memory, true)
        .field("Pending Callbacks", data.callbacks.len().to_string(), true);

    reply(ctx, embed, true).await
}

/// Show recent log entries and statistics
#[poise::command(slash_command)]
pub async fn logs(
    ctx: Context<'_>,
    #[description = "Which log to read"] log: Option<LogCollection>,
    #[description = "Only entries of this type"] kind: Option<LogTypeChoice>,
    #[description = "Entries to show (1-50)"]
    #[min = 1]
    #[max = 50]
    limit: Option<u8>,
    #[description = "Attach the whole log as a file"] export_format: Option<ExportFormat>,
) -> Result<(), Error> {
    if !require_owner(ctx).await? {
        return Ok(());
    }

    ctx.defer_ephemeral().await?;

    let data = ctx.data();
    let collection = log.unwrap_or(LogCollection::Reload).collection();
    let limit = limit
        .map(usize::from)
        .unwrap_or(DEFAULT_RECENT_LOGS)
        .clamp(1, MAX_RECENT_LOGS);

    let loaded = async {
        let recent = data.audit.recent(collection, limit, kind.map(LogType::from)).await?;
        let entries = data.audit.entries(collection).await?;
        Ok::<_, Error>((recent, entries))
    }
    .await;

    let (recent, entries) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            let details = serde_json::json!({ "collection": collection });
            return report_failure(ctx, "Read Logs", details, e, true).await;
        }
    };

    let now = Utc::now();
    let stats = crate::services::audit::stats::compute(&entries, now);

    let lines = if recent.is_empty() {
        "No entries.".to_string()
    } else {
        recent
            .iter()
            .map(|e| {
                let who = e
                    .user
                    .as_ref()
                    .map(|u| u.username.as_str())
                    .unwrap_or("system");
                format!(
                    "{} `{}` **{}** by {} {}",
                    embeds::BULLET,
                    e.kind,
                    e.action,
                    who,
                    relative_time(e.timestamp)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let mut embed = embeds::standard_embed()
        .title(format!("{} log", collection))
        .description(truncate(&lines, 4000))
        .field("Total", format_number(stats.total as i64), true)
        .field("Today", stats.today.to_string(), true)
        .field("This Week", stats.this_week.to_string(), true)
        .field("Success Rate", format!("{:.2}%", stats.success_rate), true)
        .field("Avg Duration", format!("{} ms", stats.average_duration_ms), true);

    let mut reply = poise::CreateReply::default().ephemeral(true);

    match generate_log_stats_chart(&stats, &format!("{} log", collection)) {
        Ok(png) => {
            embed = embed.image("attachment://log-stats.png");
            reply = reply.attachment(CreateAttachment::bytes(png, "log-stats.png"));
        }
        Err(e) => warn!("Could not render log chart: {:?}", e),
    }

    if let Some(format) = export_format {
        match export::export(collection, &entries, &stats, format, now) {
            Ok(body) => {
                reply = reply.attachment(CreateAttachment::bytes(
                    body.into_bytes(),
                    export::file_name(collection, format, now),
                ));
            }
            Err(e) => warn!("Could not export {}: {:?}", collection, e),
        }
    }

    ctx.send(reply.embed(embed)).await?;
    Ok(())
}

/// Delete log entries older than a number of days
#[poise::command(slash_command)]
pub async fn purge(
    ctx: Context<'_>,
    #[description = "Delete entries older than this many days"]
    #[min = 1]
    #[max = 3650]
    days: u16,
    #[description = "Which log to purge"] log: Option<LogCollection>,
) -> Result<(), Error> {
    if !require_owner(ctx).await? {
        return Ok(());
    }

    let data = ctx.data();
    let collection = log.unwrap_or(LogCollection::Reload).collection();

    let removed = match data.audit.purge_older_than(collection, i64::from(days)).await {
        Ok(removed) => removed,
        Err(e) => {
            let details = serde_json::json!({ "collection": collection, "days": days });
            return report_failure(ctx, "Purge Logs", details, e, true).await;
        }
    };

    info!("{} purged {} entries from {}", ctx.author().name, removed, collection);

    let entry = NewLogEntry::new("reload", "Purge logs")
        .kind(LogType::Success)
        .user(actor_snapshot(ctx.author()))
        .guild(guild_snapshot(ctx))
        .details(serde_json::json!({ "collection": collection, "days": days, "removed": removed }));
    if let Err(e) = data.audit.record(RELOAD_LOG, entry).await {
        warn!("Could not record log purge: {:?}", e);
    }

    let embed = embeds::success_embed()
        .title("Logs Purged")
        .description(format!(
            "Removed {} entries older than {} days from `{}`.",
            removed, days, collection
        ));

    reply(ctx, embed, true).await
}
