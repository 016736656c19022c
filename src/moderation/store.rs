//! Case storage
//!
//! [`CaseStore`] is the persistence contract the moderation service is
//! built against; [`MemoryCaseStore`] is the bundled implementation, a
//! DashMap of records with optional whole-file YAML durability.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;
use tracing::info;

use crate::moderation::{ActionKind, ActionRecord, CompletionOrigin, ExpungeRequest};

/// Errors from the case store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Record lookup by ID found nothing
    #[error("record not found: {0}")]
    NotFound(String),

    /// Mutation attempted on a record already in a terminal state
    #[error("record is already settled")]
    AlreadySettled,

    /// Records could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Backing file could not be read or written
    #[error("io error: {0}")]
    Io(String),
}

/// Durable storage for moderation cases.
///
/// The service owns all writes; the store owns durability and is the
/// source of truth across restarts.
#[async_trait]
pub trait CaseStore: Send + Sync {
    /// Persist a freshly issued case, assigning its per-guild case number.
    async fn record(&self, record: ActionRecord) -> Result<ActionRecord, StoreError>;

    async fn get_by_id(&self, id: &str) -> Result<Option<ActionRecord>, StoreError>;

    async fn get_by_case(
        &self,
        guild_id: u64,
        case_number: u64,
    ) -> Result<Option<ActionRecord>, StoreError>;

    /// All records of a kind that still owe a reversal: an expiry is set
    /// and neither terminal marker is.
    async fn get_active_timed(&self, kind: ActionKind) -> Result<Vec<ActionRecord>, StoreError>;

    /// Mark a case completed with the instant and the path that did it.
    async fn mark_completed(
        &self,
        id: &str,
        completed_at: DateTime<Utc>,
        origin: CompletionOrigin,
    ) -> Result<ActionRecord, StoreError>;

    /// Void a case before its natural expiry. Idempotent: expunging an
    /// already-expunged case returns it unchanged.
    async fn expunge(&self, req: &ExpungeRequest) -> Result<ActionRecord, StoreError>;
}

/// DashMap-backed store with optional YAML snapshot durability
pub struct MemoryCaseStore {
    records: DashMap<String, ActionRecord>,
    /// guild_id -> highest case number handed out
    case_seq: DashMap<u64, u64>,
    path: Option<PathBuf>,
}

impl Default for MemoryCaseStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCaseStore {
    /// Purely in-memory store (used by tests and ephemeral deployments)
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            case_seq: DashMap::new(),
            path: None,
        }
    }

    /// Store backed by a YAML snapshot file, loading whatever is already
    /// there. A missing file starts an empty store.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let store = Self {
            records: DashMap::new(),
            case_seq: DashMap::new(),
            path: Some(path.clone()),
        };

        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                let records: Vec<ActionRecord> = serde_yaml::from_str(&contents)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                for record in records {
                    let mut seq = store.case_seq.entry(record.guild_id).or_insert(0);
                    *seq = (*seq).max(record.case_number);
                    drop(seq);
                    store.records.insert(record.id.clone(), record);
                }
                info!(count = store.records.len(), path = %path.display(), "loaded case store");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no case file yet, starting empty");
            }
            Err(e) => return Err(StoreError::Io(e.to_string())),
        }

        Ok(store)
    }

    /// Rewrite the snapshot file after a mutation. No-op without a path.
    async fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut records: Vec<ActionRecord> =
            self.records.iter().map(|e| e.value().clone()).collect();
        records.sort_by_key(|r| (r.guild_id, r.case_number));

        let yaml =
            serde_yaml::to_string(&records).map_err(|e| StoreError::Serialization(e.to_string()))?;

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| StoreError::Io(e.to_string()))?;
        }
        tokio::fs::write(path, yaml)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))
    }

    fn next_case_number(&self, guild_id: u64) -> u64 {
        let mut seq = self.case_seq.entry(guild_id).or_insert(0);
        *seq += 1;
        *seq
    }
}

#[async_trait]
impl CaseStore for MemoryCaseStore {
    async fn record(&self, mut record: ActionRecord) -> Result<ActionRecord, StoreError> {
        record.case_number = self.next_case_number(record.guild_id);
        self.records.insert(record.id.clone(), record.clone());
        self.persist().await?;
        Ok(record)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<ActionRecord>, StoreError> {
        Ok(self.records.get(id).map(|e| e.value().clone()))
    }

    async fn get_by_case(
        &self,
        guild_id: u64,
        case_number: u64,
    ) -> Result<Option<ActionRecord>, StoreError> {
        Ok(self
            .records
            .iter()
            .find(|e| e.guild_id == guild_id && e.case_number == case_number)
            .map(|e| e.value().clone()))
    }

    async fn get_active_timed(&self, kind: ActionKind) -> Result<Vec<ActionRecord>, StoreError> {
        Ok(self
            .records
            .iter()
            .filter(|e| e.kind == kind && e.is_pending())
            .map(|e| e.value().clone())
            .collect())
    }

    async fn mark_completed(
        &self,
        id: &str,
        completed_at: DateTime<Utc>,
        origin: CompletionOrigin,
    ) -> Result<ActionRecord, StoreError> {
        let updated = {
            let mut record = self
                .records
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            if record.is_settled() {
                return Err(StoreError::AlreadySettled);
            }
            record.completed_at = Some(completed_at);
            record.completed_by = Some(origin);
            record.clone()
        };
        self.persist().await?;
        Ok(updated)
    }

    async fn expunge(&self, req: &ExpungeRequest) -> Result<ActionRecord, StoreError> {
        let id = self
            .records
            .iter()
            .find(|e| e.guild_id == req.guild_id && e.case_number == req.case_number)
            .map(|e| e.id.clone())
            .ok_or_else(|| StoreError::NotFound(format!("case {}", req.case_number)))?;

        let updated = {
            let mut record = self
                .records
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            if record.expunged_at.is_some() {
                return Ok(record.clone());
            }
            if record.completed_at.is_some() {
                return Err(StoreError::AlreadySettled);
            }
            record.expunged_at = Some(Utc::now());
            record
                .metadata
                .insert("expunged_by".to_string(), req.moderator_id.to_string());
            record
                .metadata
                .insert("expunge_reason".to_string(), req.reason.clone());
            record.clone()
        };
        self.persist().await?;
        Ok(updated)
    }
}
