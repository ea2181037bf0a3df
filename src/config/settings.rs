use std::collections::HashSet;
use std::env;
use std::path::PathBuf;

use crate::constants::limits::{DEFAULT_LOG_RETENTION_DAYS, MAX_LOG_RETENTION_DAYS};

/// Values left in a copied `.env` template that must never reach Discord
const PLACEHOLDERS: &[&str] = &[
    "YOUR_TOKEN_HERE",
    "YOUR_CLIENT_ID_HERE",
    "TU_TOKEN_AQUI",
    "TU_CLIENT_ID_AQUI",
    "changeme",
];

#[derive(Debug, Clone)]
pub struct Settings {
    pub discord_token: String,
    /// Application id; also counted as a bot owner
    pub client_id: u64,
    pub owner_ids: HashSet<u64>,
    /// Register commands to a single guild instead of globally
    pub guild_id: Option<u64>,
    pub data_dir: PathBuf,
    /// Selects the Postgres record store when set
    pub database_url: Option<String>,
    pub log_retention_days: i64,
    pub converter_binary: String,
    pub converter_temp_dir: PathBuf,
}

impl Settings {
    pub fn from_env() -> Result<Self, String> {
        let discord_token = required("DISCORD_TOKEN")?;

        let client_id = required("DISCORD_CLIENT_ID")?
            .parse::<u64>()
            .map_err(|_| "DISCORD_CLIENT_ID must be a numeric application id")?;

        let owner_ids = env::var("OWNER_IDS")
            .map(|s| parse_id_list(&s))
            .unwrap_or_default();

        let guild_id = env::var("GUILD_ID")
            .ok()
            .and_then(|s| s.parse::<u64>().ok());

        let data_dir = env::var("DATA_DIR")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"));

        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());

        let log_retention_days =
            parse_retention_days(env::var("LOG_RETENTION_DAYS").ok().as_deref());

        let converter_binary = env::var("CONVERTER_BINARY")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "yt-dlp".to_string());

        let converter_temp_dir = env::var("CONVERTER_TEMP_DIR")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(env::temp_dir);

        Ok(Self {
            discord_token,
            client_id,
            owner_ids,
            guild_id,
            data_dir,
            database_url,
            log_retention_days,
            converter_binary,
            converter_temp_dir,
        })
    }

    /// Configured owners plus the application itself
    pub fn bot_owners(&self) -> HashSet<u64> {
        let mut owners = self.owner_ids.clone();
        owners.insert(self.client_id);
        owners
    }
}

fn required(key: &str) -> Result<String, String> {
    let value = env::var(key).map_err(|_| format!("{} environment variable not set", key))?;
    let trimmed = value.trim();

    if trimmed.is_empty() || is_placeholder(trimmed) {
        return Err(format!("{} is empty or still set to a placeholder", key));
    }

    Ok(trimmed.to_string())
}

fn is_placeholder(value: &str) -> bool {
    PLACEHOLDERS.iter().any(|p| value.eq_ignore_ascii_case(p))
}

/// Positive day counts up to the maximum; anything else falls back to the default
fn parse_retention_days(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|days| *days > 0)
        .map(|days| days.min(MAX_LOG_RETENTION_DAYS))
        .unwrap_or(DEFAULT_LOG_RETENTION_DAYS)
}

/// Comma-separated snowflakes; blanks and garbage are skipped
fn parse_id_list(raw: &str) -> HashSet<u64> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<u64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_are_rejected() {
        assert!(is_placeholder("TU_TOKEN_AQUI"));
        assert!(is_placeholder("your_token_here"));
        assert!(!is_placeholder("MTA0.real.token"));
    }

    #[test]
    fn test_parse_id_list() {
        let ids = parse_id_list("123, 456,,abc , 789");
        assert_eq!(ids, HashSet::from([123, 456, 789]));
        assert!(parse_id_list("").is_empty());
    }

    #[test]
    fn test_parse_retention_days() {
        assert_eq!(parse_retention_days(None), DEFAULT_LOG_RETENTION_DAYS);
        assert_eq!(parse_retention_days(Some("14")), 14);
        assert_eq!(parse_retention_days(Some("0")), DEFAULT_LOG_RETENTION_DAYS);
        assert_eq!(parse_retention_days(Some("-3")), DEFAULT_LOG_RETENTION_DAYS);
        assert_eq!(parse_retention_days(Some("abc")), DEFAULT_LOG_RETENTION_DAYS);
        assert_eq!(parse_retention_days(Some("1000000000")), MAX_LOG_RETENTION_DAYS);
    }

    #[test]
    fn test_bot_owners_include_client_id() {
        let settings = Settings {
            discord_token: "token".to_string(),
            client_id: 99,
            owner_ids: HashSet::from([1, 2]),
            guild_id: None,
            data_dir: PathBuf::from("data"),
            database_url: None,
            log_retention_days: DEFAULT_LOG_RETENTION_DAYS,
            converter_binary: "yt-dlp".to_string(),
            converter_temp_dir: env::temp_dir(),
        };

        assert_eq!(settings.bot_owners(), HashSet::from([1, 2, 99]));
    }
}
