mod audit_entry;
mod moderator;
mod warning;

pub use audit_entry::{ActorSnapshot, AuditLogEntry, GuildSnapshot, LogError, LogType};
pub use moderator::{ModeratorEntry, ModeratorList, ModeratorRoleEntry, REGISTRY_VERSION};
pub use warning::{Warning, WarningRemoval};
