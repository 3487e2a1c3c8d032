//! Client setup shared by the networked commands
//!
//! Each invocation opens one connection, waits for the backend to assign an
//! identity (and for any automatic login from cached credentials to settle),
//! runs one command, and closes the connection again.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use rx_client::ClientHandle;
use rx_core::config::{self, ClientConfig};
use rx_core::{ErrorKind, FileCredentialStore, Phase, SessionView};

use crate::output::print_warning;

/// Connection settings gathered from global flags
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Explicit config file (defaults to the platform config directory)
    pub config_path: Option<PathBuf>,
    /// Overrides `server_url`
    pub server_url: Option<String>,
    /// Overrides `deploy_url`
    pub deploy_url: Option<String>,
}

impl ClientOptions {
    /// Config file in effect
    pub fn config_path(&self) -> PathBuf {
        self.config_path
            .clone()
            .unwrap_or_else(config::default_config_path)
    }

    /// Load the config file (or defaults) and apply flag overrides
    pub fn load_config(&self) -> Result<ClientConfig> {
        let path = self.config_path();
        let mut config = config::load_or_default(&path)
            .with_context(|| format!("Failed to load config from {:?}", path))?;

        if let Some(url) = &self.server_url {
            config.server_url = url.clone();
        }
        if let Some(url) = &self.deploy_url {
            config.deploy_url = url.clone();
        }
        config.validate()?;

        Ok(config)
    }

    /// Credential cache for this config
    pub fn credential_store(&self, config: &ClientConfig) -> FileCredentialStore {
        FileCredentialStore::new(config.credential_path())
    }
}

/// A connected client plus the config it was opened with
pub struct Connected {
    pub handle: ClientHandle,
    pub config: ClientConfig,
}

impl Connected {
    /// State once the client became ready
    pub fn view(&self) -> SessionView {
        self.handle.snapshot()
    }

    /// Close the connection
    pub async fn close(self) {
        if let Err(e) = self.handle.shutdown().await {
            tracing::debug!("Client already stopped: {}", e);
        }
    }
}

/// Connect and wait until the client accepts commands
pub async fn open_client(options: &ClientOptions) -> Result<Connected> {
    let config = options.load_config()?;
    let store = Arc::new(options.credential_store(&config));

    tracing::debug!("Connecting to {}", config.server_url);
    let handle = rx_client::connect(&config, store)
        .await
        .with_context(|| format!("Failed to connect to {}", config.server_url))?;

    let view = handle
        .wait_ready(config.reply_timeout)
        .await
        .context("Backend did not assign a connection identity")?;

    if view.phase == Phase::Disconnected {
        let reason = view
            .last_error
            .as_ref()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| "closed by server".to_string());
        anyhow::bail!("Connection to {} closed: {}", config.server_url, reason);
    }

    if let Some(error) = &view.last_error {
        if error.kind == ErrorKind::Authentication {
            print_warning(&format!(
                "Cached login rejected ({}); please log in again",
                error.message
            ));
        }
    }

    Ok(Connected { handle, config })
}

/// Fail unless a session is established
pub fn require_session(view: &SessionView) -> Result<()> {
    if !view.is_authenticated() {
        anyhow::bail!("Not logged in. Run 'rexec login <username>' first");
    }
    Ok(())
}
