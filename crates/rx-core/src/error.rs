//! Core error types for rexec

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use rx_protocol::{ExecutableId, ProtocolError};
use thiserror::Error;

/// Top-level error type for client operations
#[derive(Error, Debug)]
pub enum ClientError {
    /// Login or registration rejected by the backend
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Upload rejected or execution environment setup failed
    #[error("Deployment failed: {0}")]
    Deployment(String),

    /// Requested run failed
    #[error("Execution failed: {0}")]
    Execution(String),

    /// Command invoked while its precondition does not hold
    #[error("Precondition not met: {0}")]
    PreconditionNotMet(Precondition),

    /// The connection to the backend is gone
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Caller input outside the accepted limits
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No reply arrived within the caller's wait bound
    #[error("No reply within {0:?}")]
    ReplyTimeout(Duration),

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Credential store error
    #[error("Credential store error: {0}")]
    Credentials(#[from] CredentialError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Build the error matching a backend-reported failure
    pub fn from_backend(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::Authentication => ClientError::Authentication(message),
            ErrorKind::Deployment => ClientError::Deployment(message),
            ErrorKind::Execution => ClientError::Execution(message),
            ErrorKind::Connection => ClientError::ConnectionLost(message),
        }
    }
}

/// Which flow a surfaced error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    Deployment,
    Execution,
    Connection,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Authentication => write!(f, "authentication"),
            ErrorKind::Deployment => write!(f, "deployment"),
            ErrorKind::Execution => write!(f, "execution"),
            ErrorKind::Connection => write!(f, "connection"),
        }
    }
}

/// The guard a rejected command failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// Identity not yet assigned or automatic login still in flight
    NotReady,
    /// Command requires no active session
    AlreadyAuthenticated,
    /// Command requires an active session
    NotAuthenticated,
    /// A deployment is already in flight
    DeploymentPending,
    /// An execution is already in flight
    ExecutionPending,
    /// The backend has not assigned a connection identity yet
    NoConnectionIdentity,
    /// The executable is not part of the current session
    UnknownExecutable(ExecutableId),
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precondition::NotReady => write!(f, "client is not ready yet"),
            Precondition::AlreadyAuthenticated => write!(f, "already authenticated"),
            Precondition::NotAuthenticated => write!(f, "not authenticated"),
            Precondition::DeploymentPending => write!(f, "a deployment is already in progress"),
            Precondition::ExecutionPending => write!(f, "an execution is already in progress"),
            Precondition::NoConnectionIdentity => {
                write!(f, "no connection identity has been assigned")
            }
            Precondition::UnknownExecutable(id) => write!(f, "unknown executable: {}", id),
        }
    }
}

/// Transport-level errors from the connection and upload channels
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection could not be established
    #[error("Failed to connect to {url}: {message}")]
    Connect { url: String, message: String },

    /// Connection attempt exceeded the configured timeout
    #[error("Connection to {url} timed out after {timeout:?}")]
    ConnectTimeout { url: String, timeout: Duration },

    /// The connection is closed
    #[error("Connection closed")]
    Closed,

    /// A frame could not be written
    #[error("Send failed: {0}")]
    Send(String),

    /// The upload request could not be delivered
    #[error("Upload failed: {0}")]
    Upload(String),
}

/// Credential cache errors
#[derive(Error, Debug)]
pub enum CredentialError {
    /// I/O error on the backing file
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored data could not be read back
    #[error("Corrupt credential store {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
