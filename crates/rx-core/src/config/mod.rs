//! Configuration management for rexec

mod client;

pub use client::{ClientConfig, DEFAULT_DEPLOY_URL, DEFAULT_SERVER_URL};

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rexec")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Get the default location of the file-backed credential cache
pub fn default_credential_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("rexec"))
        .unwrap_or_else(default_config_dir)
        .join("session.json")
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

/// Load the client configuration, falling back to defaults when the file is absent
pub fn load_or_default(path: &Path) -> Result<ClientConfig, ConfigError> {
    match load_config::<ClientConfig>(path) {
        Ok(config) => {
            config.validate()?;
            Ok(config)
        }
        Err(ConfigError::NotFound(_)) => {
            tracing::debug!("No config at {:?}, using defaults", path);
            Ok(ClientConfig::default())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("config.toml");

        let mut config = ClientConfig::default();
        config.server_url = "ws://example.test:9000/service/ws".to_string();
        save_config(&path, &config).unwrap();

        let loaded: ClientConfig = load_config(&path).unwrap();
        assert_eq!(loaded.server_url, "ws://example.test:9000/service/ws");
        assert_eq!(loaded.deploy_url, DEFAULT_DEPLOY_URL);
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let dir = tempdir().expect("Failed to create temp dir");
        let result = load_config::<ClientConfig>(&dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempdir().expect("Failed to create temp dir");
        let config = load_or_default(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
    }

    #[test]
    fn test_load_or_default_rejects_invalid() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "server_url = \"http://wrong-scheme\"\n").unwrap();

        assert!(matches!(
            load_or_default(&path),
            Err(ConfigError::Invalid(_))
        ));
    }
}
