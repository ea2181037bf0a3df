use std::sync::Arc;

use chrono::{DateTime, Utc};
use poise::serenity_prelude::{
    ButtonStyle, CreateActionRow, CreateButton, CreateEmbed, CreateEmbedFooter,
    CreateInteractionResponse, CreateInteractionResponseMessage, User,
};

use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::commands::moderation::{guild_id, reply, report_failure, require_moderator, target_details};
use crate::components::callbacks::{custom_id, parse_custom_id, ComponentCall};
use crate::constants::embeds;
use crate::constants::limits::{DEFAULT_CASES_PER_PAGE, MAX_CASES_PER_PAGE};
use crate::constants::timeouts::PAGINATION_TTL;
use crate::db::models::{AuditLogEntry, Warning};
use crate::handlers::interaction::send_component_error;
use crate::services::audit::log::MOD_LOG;
use crate::utils::formatting::{relative_time, truncate};

/// Actions already represented by ledger records
const LEDGER_ACTIONS: &[&str] = &["Warn", "Remove Warning"];

#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub at: DateTime<Utc>,
    pub title: String,
    pub moderator: String,
    pub reason: String,
    pub note: Option<String>,
}

impl From<&Warning> for Case {
    fn from(w: &Warning) -> Self {
        let note = match &w.removal {
            Some(removal) => Some(format!(
                "Removed by {} {}: {}",
                removal.removed_by_username,
                relative_time(removal.removed_at),
                removal.remove_reason
            )),
            None => Some(format!("ID `{}`", w.id)),
        };

        Case {
            at: w.created_at,
            title: if w.active {
                "Warning".to_string()
            } else {
                "Warning (removed)".to_string()
            },
            moderator: w.moderator_username.clone(),
            reason: w.reason.clone(),
            note,
        }
    }
}

fn targets(entry: &AuditLogEntry, user_id: u64) -> bool {
    entry
        .details
        .pointer("/targetUser/id")
        .and_then(|id| id.as_u64())
        == Some(user_id)
}

/// Ledger warnings merged with logged actions against the user, newest first
pub fn build_cases(
    warnings: &[Warning],
    entries: &[AuditLogEntry],
    user_id: u64,
    guild_id: u64,
) -> Vec<Case> {
    let actions = entries
        .iter()
        .filter(|e| e.success && targets(e, user_id))
        .filter(|e| e.guild.as_ref().map(|g| g.id) == Some(guild_id))
        .filter(|e| !LEDGER_ACTIONS.contains(&e.action.as_str()))
        .map(|e| Case {
            at: e.timestamp,
            title: e.action.clone(),
            moderator: e
                .user
                .as_ref()
                .map(|u| u.username.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            reason: e
                .details
                .get("reason")
                .and_then(|r| r.as_str())
                .unwrap_or("No reason provided")
                .to_string(),
            note: e
                .details
                .get("minutes")
                .and_then(|m| m.as_u64())
                .map(|m| format!("Duration: {} minutes", m)),
        });

    let mut cases: Vec<Case> = warnings.iter().map(Case::from).chain(actions).collect();
    cases.sort_by(|a, b| b.at.cmp(&a.at));
    cases
}

pub fn page_count(total: usize, per_page: usize) -> usize {
    total.div_ceil(per_page.max(1)).max(1)
}

fn render_page(
    title: &str,
    cases: &[Case],
    per_page: usize,
    page: usize,
    token: Option<&str>,
) -> (CreateEmbed, Vec<CreateActionRow>) {
    let pages = page_count(cases.len(), per_page);
    let page = page.min(pages - 1);
    let start = page * per_page;

    let description = if cases.is_empty() {
        "No cases on record.".to_string()
    } else {
        cases
            .iter()
            .enumerate()
            .skip(start)
            .take(per_page)
            .map(|(i, case)| {
                let mut line = format!(
                    "**#{} {}** {}\n{} {}\nModerator: {}",
                    cases.len() - i,
                    case.title,
                    relative_time(case.at),
                    embeds::BULLET,
                    truncate(&case.reason, 200),
                    case.moderator
                );
                if let Some(note) = &case.note {
                    line.push_str(&format!("\n{}", note));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    let embed = embeds::standard_embed()
        .title(title)
        .description(description)
        .footer(CreateEmbedFooter::new(format!(
            "Page {}/{} {} {} cases",
            page + 1,
            pages,
            embeds::BULLET,
            cases.len()
        )));

    let components = match token {
        Some(token) if pages > 1 => vec![CreateActionRow::Buttons(vec![
            CreateButton::new(custom_id(token, &format!("page:{}", page.saturating_sub(1))))
                .label("Previous")
                .style(ButtonStyle::Secondary)
                .disabled(page == 0),
            CreateButton::new(custom_id(token, &format!("page:{}", page + 1)))
                .label("Next")
                .style(ButtonStyle::Secondary)
                .disabled(page + 1 >= pages),
        ])],
        _ => Vec::new(),
    };

    (embed, components)
}

/// Show the moderation history of a member
#[poise::command(slash_command, guild_only, default_member_permissions = "MODERATE_MEMBERS")]
pub async fn cases(
    ctx: Context<'_>,
    #[description = "Member to look up"] user: User,
    #[description = "Cases per page (1-20)"]
    #[min = 1]
    #[max = 20]
    per_page: Option<u8>,
    #[description = "Hide removed warnings"] only_active: Option<bool>,
    #[description = "Only show the reply to you"] silent: Option<bool>,
) -> Result<(), Error> {
    let silent = silent.unwrap_or(false);
    let guild_id = guild_id(ctx)?;

    if !require_moderator(ctx).await? {
        return Ok(());
    }

    let per_page = per_page
        .map(usize::from)
        .unwrap_or(DEFAULT_CASES_PER_PAGE)
        .clamp(1, MAX_CASES_PER_PAGE);
    let data = ctx.data();

    let warnings = match data
        .ledger
        .list_warnings(user.id.get(), guild_id.get(), only_active.unwrap_or(false))
        .await
    {
        Ok(w) => w,
        Err(e) => {
            let details = target_details(&user, "", serde_json::Value::Null);
            return report_failure(ctx, "Cases", details, e, true).await;
        }
    };
    let entries = match data.audit.entries(MOD_LOG).await {
        Ok(e) => e,
        Err(e) => {
            let details = target_details(&user, "", serde_json::Value::Null);
            return report_failure(ctx, "Cases", details, e, true).await;
        }
    };

    let cases = Arc::new(build_cases(&warnings, &entries, user.id.get(), guild_id.get()));
    let title = Arc::new(format!("Cases for {}", user.name));

    if page_count(cases.len(), per_page) <= 1 {
        let (embed, _) = render_page(&title, &cases, per_page, 0, None);
        return reply(ctx, embed, silent).await;
    }

    let invoker = ctx.author().id;
    let token = {
        let cases = cases.clone();
        let title = title.clone();
        data.callbacks
            .register(PAGINATION_TTL, false, move |call: ComponentCall| {
                let cases = cases.clone();
                let title = title.clone();
                async move {
                    if call.interaction.user.id != invoker {
                        return send_component_error(
                            &call.ctx,
                            &call.interaction,
                            "Only the person who ran this command can change pages.",
                        )
                        .await;
                    }

                    let page = call
                        .action
                        .strip_prefix("page:")
                        .and_then(|p| p.parse::<usize>().ok())
                        .unwrap_or(0);
                    let Some((token, _)) = parse_custom_id(&call.interaction.data.custom_id) else {
                        return Ok(());
                    };

                    let (embed, components) =
                        render_page(&title, &cases, per_page, page, Some(token));
                    call.interaction
                        .create_response(
                            &call.ctx,
                            CreateInteractionResponse::UpdateMessage(
                                CreateInteractionResponseMessage::new()
                                    .embed(embed)
                                    .components(components),
                            ),
                        )
                        .await?;
                    Ok(())
                }
            })
    };

    let (embed, components) = render_page(&title, &cases, per_page, 0, Some(&token));
    ctx.send(
        poise::CreateReply::default()
            .embed(embed)
            .components(components)
            .ephemeral(silent),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use serde_json::json;

    use super::*;
    use crate::db::models::{ActorSnapshot, GuildSnapshot, LogType};

    const USER: u64 = 1001;
    const GUILD: u64 = 42;

    fn warning(reason: &str, at: DateTime<Utc>) -> Warning {
        Warning {
            id: format!("w-{}", reason),
            user_id: USER,
            username: "target".to_string(),
            guild_id: GUILD,
            guild_name: "Guild".to_string(),
            moderator_id: 7,
            moderator_username: "mod".to_string(),
            reason: reason.to_string(),
            created_at: at,
            active: true,
            removal: None,
        }
    }

    fn entry(action: &str, target: u64, guild: u64, at: DateTime<Utc>) -> AuditLogEntry {
        AuditLogEntry {
            id: format!("e-{}", action),
            timestamp: at,
            kind: LogType::Success,
            category: "moderation".to_string(),
            action: action.to_string(),
            user: Some(ActorSnapshot {
                id: 7,
                username: "mod".to_string(),
            }),
            guild: Some(GuildSnapshot {
                id: guild,
                name: "Guild".to_string(),
            }),
            details: json!({ "targetUser": { "id": target, "username": "t" }, "reason": action }),
            success: true,
            duration_ms: None,
            changes: Vec::new(),
            errors: Vec::new(),
        }
    }

    #[test]
    fn test_cases_are_merged_newest_first() {
        let now = Utc::now();
        let warnings = vec![warning("spam", now - Duration::hours(3))];
        let entries = vec![
            entry("Kick", USER, GUILD, now - Duration::hours(1)),
            entry("Ban", USER, GUILD, now - Duration::hours(5)),
        ];

        let cases = build_cases(&warnings, &entries, USER, GUILD);
        let titles: Vec<_> = cases.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Kick", "Warning", "Ban"]);
    }

    #[test]
    fn test_cases_skip_other_targets_guilds_and_ledger_actions() {
        let now = Utc::now();
        let entries = vec![
            entry("Kick", 2002, GUILD, now),
            entry("Kick", USER, 99, now),
            entry("Warn", USER, GUILD, now),
            entry("Timeout", USER, GUILD, now),
        ];

        let cases = build_cases(&[], &entries, USER, GUILD);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].title, "Timeout");
    }

    #[test]
    fn test_failed_actions_are_not_cases() {
        let mut failed = entry("Ban", USER, GUILD, Utc::now());
        failed.success = false;
        assert!(build_cases(&[], &[failed], USER, GUILD).is_empty());
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0, 5), 1);
        assert_eq!(page_count(5, 5), 1);
        assert_eq!(page_count(6, 5), 2);
        assert_eq!(page_count(41, 20), 3);
    }
}
