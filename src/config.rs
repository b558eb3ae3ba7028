use crate::models::AppConfig;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Arc<AppConfig>, String> {
    let path = path.as_ref();
    info!("Loading configuration from: {}", path.display());

    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

    let mut config: AppConfig = serde_yaml::from_str(&contents)
        .map_err(|e| format!("Failed to parse YAML config: {}", e))?;

    // The secret may be supplied through the environment instead of the file.
    if let Ok(secret) = std::env::var("SESSION_SECRET_KEY") {
        config.signer.secret_key = secret;
    }

    config.validate()?;

    info!(
        "Configuration loaded successfully (store backend: {})",
        match &config.store {
            crate::models::StoreConfig::Memory => "memory",
            crate::models::StoreConfig::Redis { .. } => "redis",
        }
    );

    Ok(Arc::new(config))
}

/// Load configuration with fallback options
pub fn load_config_with_fallback() -> Result<Arc<AppConfig>, String> {
    // Try loading from environment variable first
    if let Ok(config_path) = std::env::var("CONFIG_PATH") {
        match load_config(&config_path) {
            Ok(config) => return Ok(config),
            Err(e) => warn!(
                "Failed to load config from CONFIG_PATH ({}): {}",
                config_path, e
            ),
        }
    }

    // Try common config file locations
    let paths = vec!["config.yaml", "config.yml", "./config.yaml", "./config.yml"];

    for path in paths {
        if Path::new(path).exists() {
            match load_config(path) {
                Ok(config) => return Ok(config),
                Err(e) => warn!("Failed to load config from '{}': {}", path, e),
            }
        }
    }

    Err(
        "No configuration file found. Please create a config.yaml file or set CONFIG_PATH environment variable. \
        See config.example.yaml for an example configuration.".to_string()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppConfig, StoreConfig};

    #[test]
    fn test_load_valid_config() {
        let yaml = r#"
signer:
  secret_key: "test-secret"
  salt: "file-upload"
  max_age_secs: 3600
store:
  backend: redis
  host: "127.0.0.1"
  password: "hunter2"
history:
  file: "sessions.json"
  capacity: 100
"#;

        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());

        assert_eq!(config.signer.max_age_secs, 3600);
        match &config.store {
            StoreConfig::Redis { host, port, password, timeout_secs } => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(*port, 6379);
                assert_eq!(password.as_deref(), Some("hunter2"));
                assert_eq!(*timeout_secs, 5);
            }
            other => panic!("expected redis store config, got {:?}", other),
        }
    }

    #[test]
    fn test_store_defaults_to_memory() {
        let yaml = r#"
signer:
  secret_key: "test-secret"
  salt: "file-upload"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert!(matches!(config.store, StoreConfig::Memory));
        assert_eq!(config.history.capacity, 100);
    }

    #[test]
    fn test_validation_rejects_empty_secret() {
        let yaml = r#"
signer:
  secret_key: ""
  salt: "file-upload"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("secret_key"));
    }

    #[test]
    fn test_validation_rejects_nonpositive_max_age() {
        let yaml = r#"
signer:
  secret_key: "test-secret"
  salt: "file-upload"
  max_age_secs: 0
"#;

        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }
}
