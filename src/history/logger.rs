// Session history logger
//
// Keeps an in-memory sequence of processed-file entries, loaded from a JSON
// file at startup and rewritten wholesale at shutdown. Bounded to the most
// recent `capacity` entries at save time; everything here is best-effort and
// must never fail a session operation.

use crate::session::FileRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

/// Default bound on persisted history entries.
pub const DEFAULT_CAPACITY: usize = 100;

/// One processed file, as persisted in the history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub time: DateTime<Utc>,
    pub session_id: String,
    pub filename: String,
    pub sum: i64,
}

/// History persistence failure. Logged for operators, never propagated to
/// session operations.
#[derive(Debug)]
pub enum HistoryError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
}

impl std::fmt::Display for HistoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryError::Io(e) => write!(f, "history file I/O error: {}", e),
            HistoryError::Serialization(e) => write!(f, "history encoding error: {}", e),
        }
    }
}

impl std::error::Error for HistoryError {}

/// Bounded session history log.
pub struct SessionHistory {
    path: PathBuf,
    capacity: usize,
    entries: Mutex<Vec<HistoryEntry>>,
}

impl SessionHistory {
    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Load prior log content, if any. Called once at startup.
    ///
    /// A missing file starts an empty log; an unreadable or corrupt file is
    /// reported and likewise starts empty.
    pub async fn open(&self) {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No session history at {}, starting empty", self.path.display());
                return;
            }
            Err(e) => {
                warn!(
                    "Failed to read session history {}: {}, starting empty",
                    self.path.display(),
                    e
                );
                return;
            }
        };

        match serde_json::from_str::<Vec<HistoryEntry>>(&contents) {
            Ok(loaded) => {
                debug!(
                    "Loaded {} session history entries from {}",
                    loaded.len(),
                    self.path.display()
                );
                *self.entries.lock().await = loaded;
            }
            Err(e) => {
                warn!(
                    "Session history {} is corrupt ({}), starting empty",
                    self.path.display(),
                    e
                );
            }
        }
    }

    /// Append one processed file to the in-memory log.
    pub async fn record(&self, session_id: Uuid, file: &FileRecord) {
        let mut entries = self.entries.lock().await;
        entries.push(HistoryEntry {
            time: Utc::now(),
            session_id: session_id.to_string(),
            filename: file.filename.clone(),
            sum: file.sum,
        });
    }

    /// Truncate to the most recent `capacity` entries and rewrite the log
    /// file. Called once at shutdown; entries logged after the last save are
    /// lost on a crash, which is accepted.
    pub async fn save(&self) -> Result<(), HistoryError> {
        let mut entries = self.entries.lock().await;
        if entries.len() > self.capacity {
            let excess = entries.len() - self.capacity;
            entries.drain(..excess);
        }

        let encoded =
            serde_json::to_string_pretty(&*entries).map_err(HistoryError::Serialization)?;
        tokio::fs::write(&self.path, encoded)
            .await
            .map_err(HistoryError::Io)?;

        debug!(
            "Saved {} session history entries to {}",
            entries.len(),
            self.path.display()
        );
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
