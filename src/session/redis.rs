// Redis-backed session store
// Durable backend; each operation is one round trip with a timeout.
// Conditional writes enforce create-not-exist (SET NX) and version-checked
// update (Lua compare-and-swap).

use super::store::{SessionStore, StoreError};
use super::types::{SessionRecord, VersionedRecord};
use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

const KEY_PREFIX: &str = "session:";

/// Compare-and-swap update: replaces the value only while the stored
/// version still matches. Atomic on the server, so two racing writers
/// cannot both pass the version check.
const UPDATE_SCRIPT: &str = r#"
    local current = redis.call('GET', KEYS[1])
    if not current then
        return -1
    end
    local decoded = cjson.decode(current)
    if tonumber(decoded.version) ~= tonumber(ARGV[1]) then
        return -2
    end
    redis.call('SET', KEYS[1], ARGV[2])
    return 0
"#;

/// Redis session store.
pub struct RedisSessionStore {
    conn: Arc<Mutex<MultiplexedConnection>>,
    timeout: Duration,
}

impl RedisSessionStore {
    /// Connect to Redis and return the store.
    pub async fn connect(
        host: &str,
        port: u16,
        password: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let url = match password {
            Some(password) if !password.is_empty() => {
                format!("redis://:{}@{}:{}/", password, host, port)
            }
            _ => format!("redis://{}:{}/", host, port),
        };

        let client = redis::Client::open(url.as_str())
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let conn = with_timeout(timeout, client.get_multiplexed_tokio_connection()).await?;

        debug!("Redis session store connected to {}:{}", host, port);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            timeout,
        })
    }

    fn session_key(id: Uuid) -> String {
        format!("{}{}", KEY_PREFIX, id)
    }

    fn encode(record: &SessionRecord, version: u64) -> Result<String, StoreError> {
        serde_json::to_string(&VersionedRecord {
            version,
            record: record.clone(),
        })
        .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn decode(value: &str) -> Result<VersionedRecord, StoreError> {
        serde_json::from_str(value).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

/// Bound a Redis round trip; an elapsed timeout is reported as the store
/// being unavailable rather than hanging the caller.
async fn with_timeout<T>(
    timeout: Duration,
    fut: impl Future<Output = Result<T, redis::RedisError>>,
) -> Result<T, StoreError> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(StoreError::Unavailable(e.to_string())),
        Err(_) => Err(StoreError::Unavailable("operation timed out".to_string())),
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create(&self, id: Uuid, record: SessionRecord) -> Result<(), StoreError> {
        let value = Self::encode(&record, 1)?;
        let mut conn = self.conn.lock().await;

        let created: bool =
            with_timeout(self.timeout, conn.set_nx(Self::session_key(id), value)).await?;
        if !created {
            return Err(StoreError::KeyAlreadyExists);
        }
        Ok(())
    }

    async fn read(&self, id: Uuid) -> Result<Option<VersionedRecord>, StoreError> {
        let mut conn = self.conn.lock().await;

        let value: Option<String> =
            with_timeout(self.timeout, conn.get(Self::session_key(id))).await?;
        match value {
            None => Ok(None),
            Some(value) => Ok(Some(Self::decode(&value)?)),
        }
    }

    async fn update(
        &self,
        id: Uuid,
        record: SessionRecord,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let value = Self::encode(&record, expected_version + 1)?;
        let mut conn = self.conn.lock().await;

        let outcome = with_timeout(
            self.timeout,
            redis::Script::new(UPDATE_SCRIPT)
                .key(Self::session_key(id))
                .arg(expected_version)
                .arg(value)
                .invoke_async::<_, i64>(&mut *conn),
        )
        .await?;

        match outcome {
            0 => Ok(()),
            -1 => Err(StoreError::KeyNotFound),
            -2 => Err(StoreError::VersionConflict),
            other => Err(StoreError::Unavailable(format!(
                "unexpected script result: {}",
                other
            ))),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;
        let _: () = with_timeout(self.timeout, conn.del(Self::session_key(id))).await?;
        Ok(())
    }

    async fn read_all(&self) -> Result<HashMap<Uuid, SessionRecord>, StoreError> {
        let mut conn = self.conn.lock().await;

        let keys: Vec<String> =
            with_timeout(self.timeout, conn.keys(format!("{}*", KEY_PREFIX))).await?;
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let values: Vec<Option<String>> =
            with_timeout(self.timeout, conn.mget(keys.clone())).await?;

        let mut all = HashMap::new();
        for (key, value) in keys.iter().zip(values) {
            // A key can expire between KEYS and MGET.
            let Some(value) = value else { continue };
            let id = key
                .strip_prefix(KEY_PREFIX)
                .and_then(|raw| Uuid::parse_str(raw).ok())
                .ok_or_else(|| {
                    StoreError::Serialization(format!("malformed session key: {}", key))
                })?;
            all.insert(id, Self::decode(&value)?.record);
        }
        Ok(all)
    }
}
