//! Platform adapter
//!
//! The moderation service talks to the chat platform only through
//! [`PlatformAdapter`]. The Discord implementation classifies the API
//! errors the service needs to distinguish: a target it is not allowed to
//! sanction, and a removal of something already removed.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{GuildId, UserId};
use serenity::http::{Http, HttpError};
use thiserror::Error;
use tracing::info;

/// Discord JSON error code for "Unknown Ban"
const UNKNOWN_BAN: isize = 10026;
/// Discord JSON error code for "Missing Permissions"
const MISSING_PERMISSIONS: isize = 50013;

/// Errors from the platform boundary
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The bot lacks the permission or role position to act on the target
    #[error("target cannot be sanctioned: {0}")]
    NotSanctionable(String),

    /// The target is already in the desired state; callers treat this as
    /// success
    #[error("ban already removed")]
    AlreadyRemoved,

    /// Guild or member lookup failed
    #[error("guild or member not found: {0}")]
    GuildOrMemberNotFound(String),

    /// Any other platform API failure
    #[error("discord api error: {0}")]
    Api(Box<serenity::Error>),
}

/// Chat-platform operations the moderation service depends on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Ban a user, deleting their messages from the last
    /// `delete_message_seconds`. Fails with
    /// [`PlatformError::NotSanctionable`] when the target outranks the bot
    /// or the bot lacks ban permission.
    async fn apply_ban(
        &self,
        guild_id: u64,
        user_id: u64,
        delete_message_seconds: u32,
        audit_reason: &str,
    ) -> Result<(), PlatformError>;

    /// Lift a ban. Idempotent: an already-unbanned user yields
    /// [`PlatformError::AlreadyRemoved`], which callers swallow.
    async fn remove_ban(
        &self,
        guild_id: u64,
        user_id: u64,
        audit_reason: &str,
    ) -> Result<(), PlatformError>;
}

/// Serenity-backed adapter
pub struct DiscordAdapter {
    http: Arc<Http>,
}

impl DiscordAdapter {
    #[must_use]
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

/// Map a serenity error onto the taxonomy the service understands.
fn classify(error: serenity::Error) -> PlatformError {
    if let serenity::Error::Http(HttpError::UnsuccessfulRequest(ref response)) = error {
        match response.error.code {
            UNKNOWN_BAN => return PlatformError::AlreadyRemoved,
            MISSING_PERMISSIONS => {
                return PlatformError::NotSanctionable(response.error.message.clone());
            }
            _ => {}
        }
    }
    PlatformError::Api(Box::new(error))
}

/// Discord's ban endpoint counts deleted history in whole days.
fn delete_message_days(seconds: u32) -> u8 {
    u8::try_from(u64::from(seconds).div_ceil(86_400).min(7)).unwrap_or(7)
}

#[async_trait]
impl PlatformAdapter for DiscordAdapter {
    async fn apply_ban(
        &self,
        guild_id: u64,
        user_id: u64,
        delete_message_seconds: u32,
        audit_reason: &str,
    ) -> Result<(), PlatformError> {
        let guild = GuildId::new(guild_id);
        let user = UserId::new(user_id);

        guild
            .ban_with_reason(
                &self.http,
                user,
                delete_message_days(delete_message_seconds),
                audit_reason,
            )
            .await
            .map_err(classify)?;

        info!(guild_id, user_id, "banned user");
        Ok(())
    }

    async fn remove_ban(
        &self,
        guild_id: u64,
        user_id: u64,
        audit_reason: &str,
    ) -> Result<(), PlatformError> {
        self.http
            .remove_ban(GuildId::new(guild_id), UserId::new(user_id), Some(audit_reason))
            .await
            .map_err(classify)?;

        info!(guild_id, user_id, "unbanned user");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_message_days_rounds_up_and_caps() {
        assert_eq!(delete_message_days(0), 0);
        assert_eq!(delete_message_days(1), 1);
        assert_eq!(delete_message_days(86_400), 1);
        assert_eq!(delete_message_days(86_401), 2);
        assert_eq!(delete_message_days(u32::MAX), 7);
    }

    #[test]
    fn test_non_http_errors_fall_through_to_api() {
        let error = serenity::Error::Other("boom");
        assert!(matches!(classify(error), PlatformError::Api(_)));
    }

    #[test]
    fn test_error_display() {
        let error = PlatformError::NotSanctionable("missing permissions".to_string());
        assert_eq!(
            error.to_string(),
            "target cannot be sanctioned: missing permissions"
        );
        assert_eq!(PlatformError::AlreadyRemoved.to_string(), "ban already removed");
    }
}
