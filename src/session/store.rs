// Session store abstraction and in-memory backend

use super::redis::RedisSessionStore;
use super::types::{SessionRecord, VersionedRecord};
use crate::models::StoreConfig;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Store errors, distinguished by kind so callers can branch on them.
#[derive(Debug, Clone)]
pub enum StoreError {
    /// The key does not exist (update of a nonexistent session).
    KeyNotFound,
    /// The key already exists (duplicate create).
    KeyAlreadyExists,
    /// The stored version no longer matches the expected one; the caller's
    /// read-modify-write cycle went stale and must be retried.
    VersionConflict,
    /// The backend could not be reached, or the call timed out.
    Unavailable(String),
    /// The stored value could not be encoded or decoded.
    Serialization(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::KeyNotFound => write!(f, "session not found"),
            StoreError::KeyAlreadyExists => write!(f, "session already exists"),
            StoreError::VersionConflict => write!(f, "session record version conflict"),
            StoreError::Unavailable(msg) => write!(f, "session store unavailable: {}", msg),
            StoreError::Serialization(msg) => write!(f, "serialization error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Trait for session store backends.
///
/// `read` never reports a missing key as an error, and an I/O failure is
/// never reported as a missing key: a live session must not appear absent
/// just because the backend is down.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store a brand-new record. Fails with `KeyAlreadyExists` if the
    /// session was already created.
    async fn create(&self, id: Uuid, record: SessionRecord) -> Result<(), StoreError>;

    /// Get the record and its current version, or `None` if absent.
    async fn read(&self, id: Uuid) -> Result<Option<VersionedRecord>, StoreError>;

    /// Replace the record, provided the stored version still equals
    /// `expected_version`. Writes `expected_version + 1`.
    async fn update(
        &self,
        id: Uuid,
        record: SessionRecord,
        expected_version: u64,
    ) -> Result<(), StoreError>;

    /// Remove the entry. Deleting an absent key is not an error.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    /// Full enumeration, for diagnostics only.
    async fn read_all(&self) -> Result<HashMap<Uuid, SessionRecord>, StoreError>;
}

/// In-memory session store.
///
/// Every operation holds the process-wide lock for its full duration. No
/// persistence and no eviction; intended for tests and low-traffic use.
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, VersionedRecord>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, id: Uuid, record: SessionRecord) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&id) {
            return Err(StoreError::KeyAlreadyExists);
        }
        sessions.insert(id, VersionedRecord::initial(record));
        Ok(())
    }

    async fn read(&self, id: Uuid) -> Result<Option<VersionedRecord>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&id).cloned())
    }

    async fn update(
        &self,
        id: Uuid,
        record: SessionRecord,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&id) {
            None => Err(StoreError::KeyNotFound),
            Some(stored) if stored.version != expected_version => {
                Err(StoreError::VersionConflict)
            }
            Some(stored) => {
                stored.version = expected_version + 1;
                stored.record = record;
                Ok(())
            }
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(&id);
        Ok(())
    }

    async fn read_all(&self) -> Result<HashMap<Uuid, SessionRecord>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .iter()
            .map(|(id, stored)| (*id, stored.record.clone()))
            .collect())
    }
}

/// Create the store backend selected by configuration.
pub async fn create_session_store(
    config: &StoreConfig,
) -> Result<Arc<dyn SessionStore>, StoreError> {
    match config {
        StoreConfig::Memory => {
            info!("Using in-memory session store (no persistence)");
            Ok(Arc::new(MemorySessionStore::new()))
        }
        StoreConfig::Redis {
            host,
            port,
            password,
            timeout_secs,
        } => {
            info!("Connecting to Redis session store at {}:{}", host, port);
            let store = RedisSessionStore::connect(
                host,
                *port,
                password.as_deref(),
                Duration::from_secs(*timeout_secs),
            )
            .await?;
            Ok(Arc::new(store))
        }
    }
}
