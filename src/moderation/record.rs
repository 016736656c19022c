//! Moderation case records

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::moderation::ActionKind;

/// Longest reason kept on a record or sent to the platform audit log.
/// Discord rejects audit reasons above this length.
pub const MAX_REASON_LEN: usize = 512;

/// Which path completed a timed case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionOrigin {
    /// The in-process timer fired at the expiry instant
    Timer,
    /// Startup recovery found the case overdue
    Startup,
}

/// Fields the service hands to the store when opening a case.
///
/// The service has already normalized them: the duration is non-negative
/// and the reason is bounded to [`MAX_REASON_LEN`].
#[derive(Debug, Clone)]
pub struct NewAction {
    pub guild_id: u64,
    pub user_id: u64,
    pub moderator_id: Option<u64>,
    pub kind: ActionKind,
    pub reason: String,
    pub duration_ms: Option<i64>,
    pub metadata: HashMap<String, String>,
}

/// One punitive action taken against a user in a guild
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Unique ID of this case
    pub id: String,
    /// Human-facing sequential number, scoped per guild
    pub case_number: u64,
    pub guild_id: u64,
    pub user_id: u64,
    /// None for actions the bot issued on its own
    pub moderator_id: Option<u64>,
    pub kind: ActionKind,
    pub reason: String,
    /// None means the action is permanent
    pub duration_ms: Option<i64>,
    pub issued_at: DateTime<Utc>,
    /// issued_at + duration; None for permanent actions
    pub expires_at: Option<DateTime<Utc>>,
    /// Set once the reversal has executed
    pub completed_at: Option<DateTime<Utc>>,
    /// Which path executed the reversal
    pub completed_by: Option<CompletionOrigin>,
    /// Set when the case was voided by a moderator before expiry
    pub expunged_at: Option<DateTime<Utc>>,
    pub metadata: HashMap<String, String>,
}

impl ActionRecord {
    /// Build a fresh record from normalized fields. The case number is
    /// assigned by the store when the record is persisted.
    #[must_use]
    pub fn new(fields: NewAction) -> Self {
        let issued_at = Utc::now();
        let expires_at = fields
            .duration_ms
            .filter(|ms| *ms > 0)
            .map(|ms| issued_at + Duration::milliseconds(ms));

        Self {
            id: Uuid::new_v4().to_string(),
            case_number: 0,
            guild_id: fields.guild_id,
            user_id: fields.user_id,
            moderator_id: fields.moderator_id,
            kind: fields.kind,
            reason: fields.reason,
            duration_ms: fields.duration_ms,
            issued_at,
            expires_at,
            completed_at: None,
            completed_by: None,
            expunged_at: None,
            metadata: fields.metadata,
        }
    }

    /// A case that has reached a terminal state: completed or expunged.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.completed_at.is_some() || self.expunged_at.is_some()
    }

    /// A case with a future obligation: an expiry exists and neither
    /// terminal marker is set.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.expires_at.is_some() && !self.is_settled()
    }

    /// Key under which the service tracks this case's in-memory timer.
    #[must_use]
    pub fn timer_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.kind, self.guild_id, self.user_id, self.id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_action(duration_ms: Option<i64>) -> NewAction {
        NewAction {
            guild_id: 67890,
            user_id: 12345,
            moderator_id: Some(555),
            kind: ActionKind::Ban,
            reason: "flooding".to_string(),
            duration_ms,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_timed_record_derives_expiry() {
        let record = ActionRecord::new(new_action(Some(5_000)));
        let expires = record.expires_at.expect("timed record must have an expiry");
        assert_eq!(expires - record.issued_at, Duration::milliseconds(5_000));
        assert!(record.is_pending());
        assert!(!record.is_settled());
    }

    #[test]
    fn test_permanent_record_has_no_expiry() {
        let record = ActionRecord::new(new_action(None));
        assert!(record.expires_at.is_none());
        assert!(!record.is_pending());
    }

    #[test]
    fn test_zero_duration_is_permanent() {
        let record = ActionRecord::new(new_action(Some(0)));
        assert!(record.expires_at.is_none());
    }

    #[test]
    fn test_terminal_markers_settle_the_record() {
        let mut record = ActionRecord::new(new_action(Some(5_000)));
        record.completed_at = Some(Utc::now());
        record.completed_by = Some(CompletionOrigin::Timer);
        assert!(record.is_settled());
        assert!(!record.is_pending());

        let mut record = ActionRecord::new(new_action(Some(5_000)));
        record.expunged_at = Some(Utc::now());
        assert!(record.is_settled());
        assert!(!record.is_pending());
    }

    #[test]
    fn test_timer_key_is_unique_per_case() {
        let a = ActionRecord::new(new_action(Some(5_000)));
        let b = ActionRecord::new(new_action(Some(5_000)));
        assert_ne!(a.timer_key(), b.timer_key());
        assert!(a.timer_key().starts_with("ban:67890:12345:"));
    }

    #[test]
    fn test_record_serde_round_trip() {
        let record = ActionRecord::new(new_action(Some(5_000)));
        let yaml = serde_yaml::to_string(&record).unwrap();
        let back: ActionRecord = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.id, record.id);
        assert_eq!(back.expires_at, record.expires_at);
        assert_eq!(back.kind, ActionKind::Ban);
    }
}
