// Session manager for high-level session operations
// Validates or mints tokens, loads and appends session records, and reports
// processed files into the session history

use super::store::{SessionStore, StoreError};
use super::types::{FileRecord, SessionRecord};
use crate::history::SessionHistory;
use crate::token::TokenSigner;
use chrono::Duration;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Retry budget for a stale read-modify-write cycle on the append path.
const UPDATE_RETRIES: usize = 4;

/// Session manager errors.
///
/// Token failures never appear here; they are recovered by starting a fresh
/// session. Store I/O failures are passed through, and impossible state
/// combinations are surfaced as `Internal` rather than silently retried.
#[derive(Debug, Clone)]
pub enum SessionError {
    Store(StoreError),
    Internal(String),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Store(e) => write!(f, "{}", e),
            SessionError::Internal(msg) => write!(f, "internal session error: {}", msg),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self {
        SessionError::Store(e)
    }
}

/// What one processed upload produced: the token to attach as the cookie
/// and the session record as stored after the append.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub token: String,
    pub session_id: Uuid,
    pub record: SessionRecord,
    /// False when this upload minted a brand-new session.
    pub reused_session: bool,
}

/// Orchestrates token validation, record storage, and history reporting.
pub struct SessionManager {
    signer: TokenSigner,
    store: Arc<dyn SessionStore>,
    history: Arc<SessionHistory>,
    max_token_age: Duration,
}

impl SessionManager {
    pub fn new(
        signer: TokenSigner,
        store: Arc<dyn SessionStore>,
        history: Arc<SessionHistory>,
        max_token_age: Duration,
    ) -> Self {
        Self {
            signer,
            store,
            history,
            max_token_age,
        }
    }

    pub fn max_token_age(&self) -> Duration {
        self.max_token_age
    }

    /// Verify a presented token and return the session id it proves
    /// possession of. The only path from a credential to a trusted id.
    pub fn verify_token(&self, token: &str) -> Result<Uuid, crate::token::TokenError> {
        self.signer.verify(token, self.max_token_age)
    }

    /// Process one uploaded file under the presented credential.
    ///
    /// A missing or invalid token (any failure kind) starts a fresh session
    /// instead of surfacing an error: a user whose token expired mid-session
    /// simply begins a new one.
    pub async fn process_upload(
        &self,
        incoming_token: Option<&str>,
        file: FileRecord,
    ) -> Result<UploadOutcome, SessionError> {
        if let Some(token) = incoming_token {
            match self.signer.verify(token, self.max_token_age) {
                Ok(id) => return self.append_to_session(id, token.to_string(), file).await,
                Err(e) => {
                    warn!("Rejected session token ({}), starting a new session", e);
                }
            }
        }

        self.start_session(file).await
    }

    /// Diagnostic lookup of a single session record.
    pub async fn get(&self, id: Uuid) -> Result<Option<SessionRecord>, SessionError> {
        Ok(self.store.read(id).await?.map(|stored| stored.record))
    }

    /// Diagnostic enumeration of every session record.
    pub async fn get_all(&self) -> Result<HashMap<Uuid, SessionRecord>, SessionError> {
        Ok(self.store.read_all().await?)
    }

    async fn start_session(&self, file: FileRecord) -> Result<UploadOutcome, SessionError> {
        let id = Uuid::new_v4();
        let record = SessionRecord::new(file.clone());

        match self.store.create(id, record.clone()).await {
            Ok(()) => {}
            // A fresh 128-bit id colliding means something is deeply wrong;
            // surface it instead of retrying.
            Err(StoreError::KeyAlreadyExists) => {
                return Err(SessionError::Internal(format!(
                    "freshly minted session id {} already exists",
                    id
                )));
            }
            Err(e) => return Err(e.into()),
        }

        info!("Created session {} for {}", id, file.filename);
        self.history.record(id, &file).await;

        Ok(UploadOutcome {
            token: self.signer.mint(id),
            session_id: id,
            record,
            reused_session: false,
        })
    }

    async fn append_to_session(
        &self,
        id: Uuid,
        token: String,
        file: FileRecord,
    ) -> Result<UploadOutcome, SessionError> {
        for attempt in 0..UPDATE_RETRIES {
            match self.store.read(id).await? {
                Some(stored) => {
                    let mut record = stored.record;
                    record.append(file.clone());

                    match self.store.update(id, record.clone(), stored.version).await {
                        Ok(()) => {
                            debug!("Appended {} to session {}", file.filename, id);
                            self.history.record(id, &file).await;
                            return Ok(UploadOutcome {
                                token,
                                session_id: id,
                                record,
                                reused_session: true,
                            });
                        }
                        // Another request won the write; re-read and re-append
                        // so neither upload is lost.
                        Err(StoreError::VersionConflict) | Err(StoreError::KeyNotFound) => {
                            debug!(
                                "Session {} changed under us (attempt {}), retrying",
                                id,
                                attempt + 1
                            );
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                None => {
                    // Valid token but the store lost the record independently
                    // of token validity; recreate under the same id.
                    let record = SessionRecord::new(file.clone());
                    match self.store.create(id, record.clone()).await {
                        Ok(()) => {
                            info!("Recreated session {} for {}", id, file.filename);
                            self.history.record(id, &file).await;
                            return Ok(UploadOutcome {
                                token,
                                session_id: id,
                                record,
                                reused_session: true,
                            });
                        }
                        Err(StoreError::KeyAlreadyExists) => {
                            debug!(
                                "Session {} was recreated concurrently (attempt {}), retrying",
                                id,
                                attempt + 1
                            );
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }

        Err(SessionError::Internal(format!(
            "update retries exhausted for session {}",
            id
        )))
    }
}
