//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// WebSocket endpoint of the backend
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8081/service/ws";

/// HTTP endpoint receiving multipart uploads
pub const DEFAULT_DEPLOY_URL: &str = "http://localhost:8081/service/deploy";

/// Configuration for the rexec client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket URL the connection manager opens
    pub server_url: String,

    /// Upload endpoint for deployments
    pub deploy_url: String,

    /// Bound on establishing the WebSocket connection
    #[serde(with = "secs")]
    pub connect_timeout: Duration,

    /// Bound on delivering one upload request
    #[serde(with = "secs")]
    pub upload_timeout: Duration,

    /// How long the CLI waits for an asynchronous reply.
    ///
    /// The coordinator itself never times out a pending request.
    #[serde(with = "secs")]
    pub reply_timeout: Duration,

    /// Credential cache file (defaults to the platform data directory)
    pub credential_path: Option<PathBuf>,

    /// Longest accepted username, in characters
    pub max_username_len: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            deploy_url: DEFAULT_DEPLOY_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            upload_timeout: Duration::from_secs(120),
            reply_timeout: Duration::from_secs(60),
            credential_path: None,
            max_username_len: 40,
        }
    }
}

impl ClientConfig {
    /// Resolved credential cache path
    pub fn credential_path(&self) -> PathBuf {
        self.credential_path
            .clone()
            .unwrap_or_else(super::default_credential_path)
    }

    /// Reject values the client cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.server_url.starts_with("ws://") || self.server_url.starts_with("wss://")) {
            return Err(ConfigError::Invalid(format!(
                "server_url must be a ws:// or wss:// URL, got {}",
                self.server_url
            )));
        }
        if !(self.deploy_url.starts_with("http://") || self.deploy_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "deploy_url must be an http:// or https:// URL, got {}",
                self.deploy_url
            )));
        }
        if self.max_username_len == 0 {
            return Err(ConfigError::Invalid(
                "max_username_len must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Durations as whole seconds in TOML
mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
