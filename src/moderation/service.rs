//! Moderation service
//!
//! Issues punitive actions, persists each one as a case, schedules the
//! automatic reversal of timed actions, and re-arms everything from the
//! store after a restart. The service is the only writer of case state;
//! the expiry path re-reads the store immediately before acting because
//! other work (a command, another expiry) can interleave at any await.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use crate::moderation::handler::HandlerRegistry;
use crate::moderation::{
    ActionKind, ActionRecord, CaseStore, CompletionOrigin, MAX_REASON_LEN, ModerationError,
    ModerationResult, NewAction, StoreError, TimedActionHandler,
};
use crate::platform::{PlatformAdapter, PlatformError};
use crate::scheduler::{DelayScheduler, TimerToken};

/// Request to ban a user
#[derive(Debug, Clone)]
pub struct BanRequest {
    pub guild_id: u64,
    pub user_id: u64,
    /// None when the bot acts on its own (e.g. flood detection)
    pub moderator_id: Option<u64>,
    pub reason: String,
    /// None or zero means the ban is permanent
    pub duration_ms: Option<i64>,
    pub metadata: HashMap<String, String>,
}

/// Request to void a case before its natural expiry
#[derive(Debug, Clone)]
pub struct ExpungeRequest {
    pub guild_id: u64,
    pub case_number: u64,
    pub moderator_id: u64,
    pub reason: String,
}

/// Service for the moderation case lifecycle
#[derive(Clone)]
pub struct ModerationService {
    store: Arc<dyn CaseStore>,
    platform: Arc<dyn PlatformAdapter>,
    scheduler: DelayScheduler,
    handlers: Arc<HandlerRegistry>,
    /// Live reversal timers, at most one per composite case key
    timers: Arc<DashMap<String, TimerToken>>,
}

impl ModerationService {
    #[must_use]
    pub fn new(
        store: Arc<dyn CaseStore>,
        platform: Arc<dyn PlatformAdapter>,
        scheduler: DelayScheduler,
    ) -> Self {
        Self {
            store,
            platform,
            scheduler,
            handlers: Arc::new(HandlerRegistry::default()),
            timers: Arc::new(DashMap::new()),
        }
    }

    /// Register the expiry behavior for an action kind. Cases of a kind
    /// are only recovered and auto-expired once its handler is in place.
    pub fn register_timed_handler(&self, kind: ActionKind, handler: Arc<dyn TimedActionHandler>) {
        self.handlers.register(kind, handler);
    }

    /// Ban a user. The platform action happens first so no case is opened
    /// for a ban that never took effect; a timed ban then gets a reversal
    /// timer keyed to its record.
    pub async fn ban(&self, request: BanRequest) -> ModerationResult<ActionRecord> {
        let record = ActionRecord::new(NewAction {
            guild_id: request.guild_id,
            user_id: request.user_id,
            moderator_id: request.moderator_id,
            kind: ActionKind::Ban,
            reason: bound_reason(&request.reason),
            duration_ms: request.duration_ms.map(|ms| ms.max(0)),
            metadata: request.metadata,
        });

        self.platform
            .apply_ban(request.guild_id, request.user_id, 0, &audit_reason(&record))
            .await?;

        let record = match self.store.record(record).await {
            Ok(record) => record,
            Err(e) => {
                // The ban is live on the platform but has no case behind
                // it, so nothing will ever lift it automatically.
                error!(
                    guild_id = request.guild_id,
                    user_id = request.user_id,
                    error = %e,
                    "ban applied but case could not be persisted; expiry schedule lost"
                );
                return Err(e.into());
            }
        };

        if let Some(expires_at) = record.expires_at {
            self.arm_timer(&record, expires_at);
        }

        info!(
            case = record.case_number,
            guild_id = record.guild_id,
            user_id = record.user_id,
            expires_at = ?record.expires_at,
            "ban issued"
        );
        Ok(record)
    }

    /// Ban and immediately unban a user, purging their recent messages
    /// without a lasting restriction. The case is permanent (no expiry).
    pub async fn softban(
        &self,
        request: BanRequest,
        delete_message_seconds: u32,
    ) -> ModerationResult<ActionRecord> {
        let record = ActionRecord::new(NewAction {
            guild_id: request.guild_id,
            user_id: request.user_id,
            moderator_id: request.moderator_id,
            kind: ActionKind::Softban,
            reason: bound_reason(&request.reason),
            duration_ms: None,
            metadata: request.metadata,
        });

        self.platform
            .apply_ban(
                request.guild_id,
                request.user_id,
                delete_message_seconds,
                &audit_reason(&record),
            )
            .await?;

        let record = self.store.record(record).await?;

        let lift_reason = format!("softban (case {})", record.case_number);
        match self
            .platform
            .remove_ban(request.guild_id, request.user_id, &lift_reason)
            .await
        {
            Ok(()) => {}
            // Someone beat us to the unban; the softban still did its job.
            Err(PlatformError::AlreadyRemoved) => {
                debug!(case = record.case_number, "softban target already unbanned");
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            case = record.case_number,
            guild_id = record.guild_id,
            user_id = record.user_id,
            "softban issued"
        );
        Ok(record)
    }

    /// Look up a case by its human-facing number.
    pub async fn get_case(
        &self,
        guild_id: u64,
        case_number: u64,
    ) -> ModerationResult<Option<ActionRecord>> {
        Ok(self.store.get_by_case(guild_id, case_number).await?)
    }

    /// Drop the in-memory timer for a case without touching the store.
    /// Once this returns the reversal callback cannot start.
    pub fn cancel_timer_for_entry(&self, record: &ActionRecord) {
        if let Some((_, token)) = self.timers.remove(&record.timer_key()) {
            token.cancel();
            debug!(case = record.case_number, "timer cancelled");
        }
    }

    /// Void a case before its natural expiry. The only path that expunges;
    /// an already-expunged case is a no-op.
    pub async fn expunge_case(&self, request: ExpungeRequest) -> ModerationResult<ActionRecord> {
        let record = self
            .store
            .get_by_case(request.guild_id, request.case_number)
            .await?
            .ok_or(ModerationError::CaseNotFound {
                guild_id: request.guild_id,
                case_number: request.case_number,
            })?;

        if record.expunged_at.is_some() {
            return Ok(record);
        }

        self.cancel_timer_for_entry(&record);
        let updated = self.store.expunge(&request).await?;

        info!(
            case = updated.case_number,
            guild_id = updated.guild_id,
            moderator_id = request.moderator_id,
            "case expunged"
        );
        Ok(updated)
    }

    /// Startup recovery: for every registered kind, complete overdue cases
    /// immediately and re-arm timers for the rest. Call once per process.
    pub async fn on_client_ready(&self) {
        let now = Utc::now();

        for kind in self.handlers.kinds() {
            let records = match self.store.get_active_timed(kind).await {
                Ok(records) => records,
                Err(e) => {
                    error!(%kind, error = %e, "failed to load pending cases");
                    continue;
                }
            };

            info!(%kind, count = records.len(), "recovering pending cases");

            for record in records {
                let Some(expires_at) = record.expires_at else {
                    continue;
                };
                if expires_at <= now {
                    if let Err(e) = self.run_expiry(&record.id, CompletionOrigin::Startup).await {
                        // One bad case must not abort the rest of the batch.
                        error!(
                            case = record.case_number,
                            record_id = %record.id,
                            error = %e,
                            "startup expiry failed"
                        );
                    }
                } else {
                    self.arm_timer(&record, expires_at);
                }
            }
        }
    }

    /// Shared expiry path for timer fires and startup recovery.
    ///
    /// Re-fetches the case first: between a timer firing and this running,
    /// an expunge or a competing expiry may already have settled it.
    pub(crate) async fn run_expiry(
        &self,
        record_id: &str,
        origin: CompletionOrigin,
    ) -> ModerationResult<()> {
        let Some(record) = self.store.get_by_id(record_id).await? else {
            warn!(record_id, "expiry fired for unknown case");
            return Ok(());
        };

        if record.is_settled() {
            debug!(record_id, "case already settled, skipping expiry");
            return Ok(());
        }

        let handler = self
            .handlers
            .get(record.kind)
            .ok_or(ModerationError::MissingHandler(record.kind))?;
        handler.on_expire(&record).await?;

        match self
            .store
            .mark_completed(&record.id, Utc::now(), origin)
            .await
        {
            Ok(_) => {}
            // Settled while the reversal was in flight; the store wins.
            Err(StoreError::AlreadySettled) => {
                debug!(record_id, "case settled while expiry was in flight");
            }
            Err(e) => return Err(e.into()),
        }

        self.timers.remove(&record.timer_key());
        info!(
            case = record.case_number,
            guild_id = record.guild_id,
            user_id = record.user_id,
            ?origin,
            "timed action completed"
        );
        Ok(())
    }

    /// Arm the reversal timer for a case, replacing any live timer under
    /// the same key.
    fn arm_timer(&self, record: &ActionRecord, expires_at: DateTime<Utc>) {
        let key = record.timer_key();
        if let Some((_, old)) = self.timers.remove(&key) {
            old.cancel();
        }

        let delay = (expires_at - Utc::now())
            .to_std()
            .unwrap_or(StdDuration::ZERO);

        let service = self.clone();
        let record_id = record.id.clone();
        let callback_key = key.clone();
        let token = self.scheduler.schedule(delay, move || async move {
            service.timers.remove(&callback_key);
            if let Err(e) = service.run_expiry(&record_id, CompletionOrigin::Timer).await {
                error!(record_id = %record_id, error = %e, "expiry failed");
            }
        });

        self.timers.insert(key, token);
        debug!(
            case = record.case_number,
            delay_ms = delay.as_millis() as u64,
            "reversal timer armed"
        );
    }
}

/// Clamp a reason to the longest string the platform audit log accepts.
fn bound_reason(reason: &str) -> String {
    let mut reason = reason.to_string();
    if reason.len() > MAX_REASON_LEN {
        let mut end = MAX_REASON_LEN;
        while !reason.is_char_boundary(end) {
            end -= 1;
        }
        reason.truncate(end);
    }
    reason
}

/// Audit-log line for the platform: who acted, and for timed actions when
/// the restriction lifts.
fn audit_reason(record: &ActionRecord) -> String {
    let issuer = record
        .moderator_id
        .map_or_else(|| "automatic".to_string(), |id| format!("moderator {id}"));
    let text = match record.expires_at {
        Some(expires_at) => format!(
            "{} (by {}, until {})",
            record.reason,
            issuer,
            expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => format!("{} (by {})", record.reason, issuer),
    };
    bound_reason(&text)
}
