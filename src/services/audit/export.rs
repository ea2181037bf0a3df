use chrono::{DateTime, Utc};
use serde_json::json;

use crate::bot::error::Error;
use crate::db::models::AuditLogEntry;
use crate::services::audit::stats::LogStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum ExportFormat {
    #[name = "JSON"]
    Json,
    #[name = "CSV"]
    Csv,
    #[name = "TXT"]
    Txt,
    #[name = "Markdown"]
    Markdown,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Txt => "txt",
            ExportFormat::Markdown => "md",
        }
    }
}

const CSV_HEADERS: [&str; 11] = [
    "Timestamp", "Date", "Time", "Type", "Action", "User", "Guild", "Success", "Duration",
    "Changes", "Errors",
];

/// Render entries as a downloadable text file
pub fn export(
    collection: &str,
    entries: &[AuditLogEntry],
    stats: &LogStats,
    format: ExportFormat,
    now: DateTime<Utc>,
) -> Result<String, Error> {
    match format {
        ExportFormat::Json => to_json(collection, entries, stats, now),
        ExportFormat::Csv => Ok(to_csv(entries)),
        ExportFormat::Txt => Ok(to_txt(collection, entries, stats, now)),
        ExportFormat::Markdown => Ok(to_markdown(collection, entries, stats, now)),
    }
}

pub fn file_name(collection: &str, format: ExportFormat, now: DateTime<Utc>) -> String {
    format!(
        "{}-logs-{}.{}",
        collection,
        now.format("%Y-%m-%d"),
        format.extension()
    )
}

fn to_json(
    collection: &str,
    entries: &[AuditLogEntry],
    stats: &LogStats,
    now: DateTime<Utc>,
) -> Result<String, Error> {
    let document = json!({
        "metadata": {
            "collection": collection,
            "exportDate": now.to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION"),
            "totalLogs": entries.len(),
            "statistics": stats,
        },
        "logs": entries,
    });

    Ok(serde_json::to_string_pretty(&document)?)
}

fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn to_csv(entries: &[AuditLogEntry]) -> String {
    let mut csv = CSV_HEADERS.join(",");
    csv.push('\n');

    for entry in entries {
        let row = [
            entry.timestamp.to_rfc3339(),
            entry.timestamp.format("%Y-%m-%d").to_string(),
            entry.timestamp.format("%H:%M:%S").to_string(),
            entry.kind.to_string(),
            entry.action.clone(),
            actor_name(entry).to_string(),
            guild_name(entry).to_string(),
            if entry.success { "Yes" } else { "No" }.to_string(),
            entry
                .duration_ms
                .map(|ms| ms.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            entry.changes.join("; "),
            error_messages(entry).join("; "),
        ];

        let fields: Vec<String> = row.iter().map(|f| csv_field(f)).collect();
        csv.push_str(&fields.join(","));
        csv.push('\n');
    }

    csv
}

fn to_txt(
    collection: &str,
    entries: &[AuditLogEntry],
    stats: &LogStats,
    now: DateTime<Utc>,
) -> String {
    let rule = "=".repeat(60);
    let thin = "-".repeat(60);
    let mut txt = String::new();

    txt.push_str(&format!("{}\n  {} LOG EXPORT\n{}\n\n", rule, collection.to_uppercase(), rule));
    txt.push_str(&format!("Export Date: {}\n", now.format("%Y-%m-%d %H:%M:%S UTC")));
    txt.push_str(&format!("Total Logs: {}\n", entries.len()));
    txt.push_str(&format!("Success Rate: {:.2}%\n", stats.success_rate));
    txt.push_str(&format!("Average Duration: {}ms\n\n", stats.average_duration_ms));
    txt.push_str(&format!("{}\n  LOG ENTRIES\n{}\n\n", thin, thin));

    for (index, entry) in entries.iter().enumerate() {
        txt.push_str(&format!(
            "[{}] {}\n",
            index + 1,
            entry.timestamp.format("%Y-%m-%d %H:%M:%S")
        ));
        txt.push_str(&format!("    Action: {}\n", entry.action));
        txt.push_str(&format!("    User: {}\n", actor_name(entry)));
        txt.push_str(&format!("    Guild: {}\n", guild_name(entry)));
        txt.push_str(&format!(
            "    Status: {}\n",
            if entry.success { "SUCCESS" } else { "FAILED" }
        ));
        txt.push_str(&format!("    Duration: {}\n", duration_label(entry)));

        if !entry.changes.is_empty() {
            txt.push_str("    Changes:\n");
            for change in &entry.changes {
                txt.push_str(&format!("      - {}\n", change));
            }
        }

        if !entry.errors.is_empty() {
            txt.push_str("    Errors:\n");
            for message in error_messages(entry) {
                txt.push_str(&format!("      - {}\n", message));
            }
        }

        txt.push('\n');
    }

    txt
}

fn to_markdown(
    collection: &str,
    entries: &[AuditLogEntry],
    stats: &LogStats,
    now: DateTime<Utc>,
) -> String {
    let mut md = format!("# {} log export\n\n", collection);

    md.push_str(&format!("**Export Date:** {}  \n", now.format("%Y-%m-%d %H:%M:%S UTC")));
    md.push_str(&format!("**Total Logs:** {}  \n\n", entries.len()));

    md.push_str("## Statistics\n\n");
    md.push_str("| Metric | Value |\n|--------|-------|\n");
    md.push_str(&format!("| Total Logs | {} |\n", stats.total));
    md.push_str(&format!("| Today | {} |\n", stats.today));
    md.push_str(&format!("| This Week | {} |\n", stats.this_week));
    md.push_str(&format!("| Success Rate | {:.2}% |\n", stats.success_rate));
    md.push_str(&format!("| Average Duration | {}ms |\n\n", stats.average_duration_ms));

    md.push_str("## Log Entries\n\n");

    for (index, entry) in entries.iter().enumerate() {
        md.push_str(&format!("### {}. {}\n\n", index + 1, entry.action));
        md.push_str(&format!(
            "- **Date:** {}\n",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S")
        ));
        md.push_str(&format!("- **Type:** `{}`\n", entry.kind));
        md.push_str(&format!("- **User:** {}\n", actor_name(entry)));
        md.push_str(&format!("- **Guild:** {}\n", guild_name(entry)));
        md.push_str(&format!(
            "- **Status:** {}\n",
            if entry.success { "Success" } else { "Failed" }
        ));
        md.push_str(&format!("- **Duration:** {}\n", duration_label(entry)));

        if !entry.changes.is_empty() {
            md.push_str("\n**Changes:**\n");
            for change in &entry.changes {
                md.push_str(&format!("- {}\n", change));
            }
        }

        if !entry.errors.is_empty() {
            md.push_str("\n**Errors:**\n");
            for message in error_messages(entry) {
                md.push_str(&format!("- `{}`\n", message));
            }
        }

        md.push_str("\n---\n\n");
    }

    md
}

fn actor_name(entry: &AuditLogEntry) -> &str {
    entry.user.as_ref().map(|u| u.username.as_str()).unwrap_or("System")
}

fn guild_name(entry: &AuditLogEntry) -> &str {
    entry.guild.as_ref().map(|g| g.name.as_str()).unwrap_or("Unknown")
}

fn duration_label(entry: &AuditLogEntry) -> String {
    entry
        .duration_ms
        .map(|ms| format!("{}ms", ms))
        .unwrap_or_else(|| "N/A".to_string())
}

fn error_messages(entry: &AuditLogEntry) -> Vec<&str> {
    entry.errors.iter().map(|e| e.message.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::db::models::{ActorSnapshot, LogError, LogType};
    use crate::services::audit::stats::compute;

    fn sample() -> Vec<AuditLogEntry> {
        let at = "2026-03-10T12:30:00Z".parse().unwrap();
        vec![
            AuditLogEntry {
                id: "a".to_string(),
                timestamp: at,
                kind: LogType::Success,
                category: "reload".to_string(),
                action: "Reload commands".to_string(),
                user: Some(ActorSnapshot {
                    id: 1,
                    username: "owner \"one\"".to_string(),
                }),
                guild: None,
                details: Value::Null,
                success: true,
                duration_ms: Some(42),
                changes: vec!["12 commands reloaded".to_string(), "added: ping".to_string()],
                errors: Vec::new(),
            },
            AuditLogEntry {
                id: "b".to_string(),
                timestamp: at,
                kind: LogType::Error,
                category: "reload".to_string(),
                action: "Reload events".to_string(),
                user: None,
                guild: None,
                details: Value::Null,
                success: false,
                duration_ms: None,
                changes: Vec::new(),
                errors: vec![LogError {
                    message: "discovery failed".to_string(),
                }],
            },
        ]
    }

    fn now() -> DateTime<Utc> {
        "2026-03-10T13:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_csv_layout_and_quoting() {
        let entries = sample();
        let csv = export("databasereload", &entries, &compute(&entries, now()), ExportFormat::Csv, now())
            .unwrap();
        let lines: Vec<_> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "Timestamp,Date,Time,Type,Action,User,Guild,Success,Duration,Changes,Errors"
        );
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("\"owner \"\"one\"\"\""));
        assert!(lines[1].contains("\"12 commands reloaded; added: ping\""));
        assert!(lines[1].contains("\"Yes\",\"42\""));
        assert!(lines[2].contains("\"System\",\"Unknown\",\"No\",\"N/A\""));
        assert!(lines[2].ends_with("\"discovery failed\""));
    }

    #[test]
    fn test_json_export_has_metadata() {
        let entries = sample();
        let stats = compute(&entries, now());
        let text = export("databasereload", &entries, &stats, ExportFormat::Json, now()).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(parsed["metadata"]["totalLogs"], 2);
        assert_eq!(parsed["metadata"]["statistics"]["successRate"], 50.0);
        assert_eq!(parsed["logs"][1]["type"], "error");
    }

    #[test]
    fn test_txt_and_markdown_layouts() {
        let entries = sample();
        let stats = compute(&entries, now());

        let txt = export("databasereload", &entries, &stats, ExportFormat::Txt, now()).unwrap();
        assert!(txt.contains("DATABASERELOAD LOG EXPORT"));
        assert!(txt.contains("Success Rate: 50.00%"));
        assert!(txt.contains("    Status: FAILED"));
        assert!(txt.contains("      - discovery failed"));

        let md = export("databasereload", &entries, &stats, ExportFormat::Markdown, now()).unwrap();
        assert!(md.contains("| Total Logs | 2 |"));
        assert!(md.contains("### 2. Reload events"));
        assert!(md.contains("- `discovery failed`"));
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            file_name("mod", ExportFormat::Markdown, now()),
            "mod-logs-2026-03-10.md"
        );
    }
}
