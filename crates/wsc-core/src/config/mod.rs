//! Configuration management for the webstack client

mod client;
pub mod serde_utils;

pub use client::{BackoffConfig, ClientConfig, EndpointConfig, PollConfig, RetryConfig};

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("webstack-client")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    Ok(())
}

/// Load and validate a client configuration
pub fn load_client_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    let config: ClientConfig = load_config(path)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(
            load_config::<ClientConfig>(&path),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn test_save_then_load_client_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = ClientConfig::new("http://controller", "testuser", "pass");
        config
            .default_headers
            .insert("X-Request-Origin".to_string(), "tests".to_string());
        config.poll.max_interval = Duration::from_millis(750);
        save_config(&path, &config).unwrap();

        let loaded = load_client_config(&path).unwrap();
        assert_eq!(loaded.base_url, "http://controller");
        assert_eq!(loaded.password.as_deref(), Some("pass"));
        assert_eq!(loaded.poll.max_interval, Duration::from_millis(750));
        assert_eq!(
            loaded.default_headers.get("X-Request-Origin").map(String::as_str),
            Some("tests")
        );
    }

    #[test]
    fn test_invalid_config_is_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "base_url = \"\"\n").unwrap();
        assert!(matches!(
            load_client_config(&path),
            Err(ConfigError::Invalid(_))
        ));
    }
}
