/// Reasons and removal notes are cut to this many characters
pub const MAX_REASON_LENGTH: usize = 512;

/// Technical error detail shown to users
pub const MAX_ERROR_DETAIL_LENGTH: usize = 1000;

/// Message deletion window for bans, in days
pub const MAX_BAN_DELETE_DAYS: u8 = 7;

/// Discord caps member timeouts at 28 days
pub const MIN_TIMEOUT_MINUTES: u32 = 1;
pub const MAX_TIMEOUT_MINUTES: u32 = 40_320;

pub const DEFAULT_CASES_PER_PAGE: usize = 5;
pub const MAX_CASES_PER_PAGE: usize = 20;

pub const DEFAULT_LOG_RETENTION_DAYS: i64 = 30;
/// Ten years; longer windows are clamped
pub const MAX_LOG_RETENTION_DAYS: i64 = 3650;
pub const DEFAULT_RECENT_LOGS: usize = 10;
pub const MAX_RECENT_LOGS: usize = 50;

/// Media longer than this is refused by the converter (30 minutes)
pub const MAX_MEDIA_DURATION_SECS: u64 = 30 * 60;

/// Attachment size limit for non-boosted guilds (25 MiB)
pub const MAX_UPLOAD_BYTES: u64 = 25 * 1024 * 1024;

pub const MP3_BITRATES: &[u32] = &[96, 128, 192, 256, 320];
pub const MP4_HEIGHTS: &[u32] = &[144, 240, 360, 480, 720, 1080];
