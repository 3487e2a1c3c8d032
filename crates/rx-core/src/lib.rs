//! rx-core: Core abstractions and configuration for rexec
//!
//! This crate provides the shared domain types, error taxonomy, transport
//! traits, credential storage, and configuration used by the client library
//! and the CLI.

pub mod config;
pub mod credentials;
pub mod error;
pub mod traits;
pub mod types;

pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use error::{ClientError, ConfigError, CredentialError, ErrorKind, Precondition, TransportError};
pub use types::{
    Credentials, LastError, PendingDeployment, PendingExecution, Phase, Session, SessionView,
};

pub use rx_protocol::{ConnectionId, Executable, ExecutableId, ExecutionOutput};
