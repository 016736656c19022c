//! Error types for the moderation system

use thiserror::Error;

use crate::moderation::{ActionKind, StoreError};
use crate::platform::PlatformError;

/// Errors surfaced by moderation operations
#[derive(Debug, Error)]
pub enum ModerationError {
    /// No expiry handler registered for an action kind
    #[error("no handler registered for action kind: {0}")]
    MissingHandler(ActionKind),

    /// Case lookup by number found nothing
    #[error("case {case_number} not found in guild {guild_id}")]
    CaseNotFound { guild_id: u64, case_number: u64 },

    /// The case store failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The platform rejected or failed an action
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),
}

/// Result type for moderation operations
pub type ModerationResult<T> = Result<T, ModerationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ModerationError::MissingHandler(ActionKind::Ban);
        assert_eq!(error.to_string(), "no handler registered for action kind: ban");

        let error = ModerationError::CaseNotFound {
            guild_id: 1,
            case_number: 7,
        };
        assert_eq!(error.to_string(), "case 7 not found in guild 1");

        let error = ModerationError::from(StoreError::NotFound("abc".to_string()));
        assert_eq!(error.to_string(), "store error: record not found: abc");
    }
}
