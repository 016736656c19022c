//! Expiry handlers
//!
//! Each action kind decides what "reversal" means when a timed case
//! expires. Handlers are registered with the service before any case of
//! their kind can be recovered or auto-expired.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::info;

use crate::moderation::{ActionKind, ActionRecord, ModerationResult};
use crate::platform::{PlatformAdapter, PlatformError};

/// Reversal behavior for one action kind
#[async_trait]
pub trait TimedActionHandler: Send + Sync {
    /// Undo the platform side effect of an expired case. Must tolerate the
    /// target already being in the desired state.
    async fn on_expire(&self, record: &ActionRecord) -> ModerationResult<()>;
}

/// Handlers keyed by action kind
#[derive(Default)]
pub(crate) struct HandlerRegistry {
    handlers: DashMap<ActionKind, Arc<dyn TimedActionHandler>>,
}

impl HandlerRegistry {
    pub(crate) fn register(&self, kind: ActionKind, handler: Arc<dyn TimedActionHandler>) {
        self.handlers.insert(kind, handler);
    }

    pub(crate) fn get(&self, kind: ActionKind) -> Option<Arc<dyn TimedActionHandler>> {
        self.handlers.get(&kind).map(|e| Arc::clone(e.value()))
    }

    pub(crate) fn kinds(&self) -> Vec<ActionKind> {
        self.handlers.iter().map(|e| *e.key()).collect()
    }
}

/// Expiry handler for [`ActionKind::Ban`]: lift the ban.
pub struct BanExpiryHandler {
    platform: Arc<dyn PlatformAdapter>,
}

impl BanExpiryHandler {
    #[must_use]
    pub fn new(platform: Arc<dyn PlatformAdapter>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl TimedActionHandler for BanExpiryHandler {
    async fn on_expire(&self, record: &ActionRecord) -> ModerationResult<()> {
        let reason = format!("temporary ban expired (case {})", record.case_number);
        match self
            .platform
            .remove_ban(record.guild_id, record.user_id, &reason)
            .await
        {
            Ok(()) => {
                info!(
                    case = record.case_number,
                    guild_id = record.guild_id,
                    user_id = record.user_id,
                    "ban lifted"
                );
                Ok(())
            }
            // The user was unbanned out of band; the expiry still counts.
            Err(PlatformError::AlreadyRemoved) => {
                info!(
                    case = record.case_number,
                    guild_id = record.guild_id,
                    user_id = record.user_id,
                    "ban already lifted"
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
