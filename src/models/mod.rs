// Configuration models

use serde::Deserialize;

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub signer: SignerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

/// Token signer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SignerConfig {
    /// Secret key the signing key is derived from.
    pub secret_key: String,
    /// Domain-separation salt for the key derivation.
    pub salt: String,
    /// Maximum accepted token age in seconds.
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: i64,
}

/// Session store backend selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
    /// In-process map; data is lost on restart.
    Memory,
    /// Durable Redis backend.
    Redis {
        host: String,
        #[serde(default = "default_redis_port")]
        port: u16,
        #[serde(default)]
        password: Option<String>,
        /// Per-operation timeout in seconds.
        #[serde(default = "default_store_timeout_secs")]
        timeout_secs: u64,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Memory
    }
}

/// Session history log configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_file")]
    pub file: String,
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            file: default_history_file(),
            capacity: default_history_capacity(),
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_max_age_secs() -> i64 {
    86400
}

fn default_redis_port() -> u16 {
    6379
}

fn default_store_timeout_secs() -> u64 {
    5
}

fn default_history_file() -> String {
    "sessions.json".to_string()
}

fn default_history_capacity() -> usize {
    crate::history::logger::DEFAULT_CAPACITY
}

impl AppConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.signer.secret_key.is_empty() {
            return Err("signer.secret_key must not be empty".to_string());
        }
        if self.signer.salt.is_empty() {
            return Err("signer.salt must not be empty".to_string());
        }
        if self.signer.max_age_secs <= 0 {
            return Err("signer.max_age_secs must be positive".to_string());
        }
        if self.history.capacity == 0 {
            return Err("history.capacity must be positive".to_string());
        }
        if let StoreConfig::Redis { host, .. } = &self.store {
            if host.is_empty() {
                return Err("store.host must not be empty for the redis backend".to_string());
            }
        }
        Ok(())
    }
}
