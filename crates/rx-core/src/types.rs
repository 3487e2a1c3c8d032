//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use rx_protocol::{ConnectionId, Executable, ExecutableId, ExecutionOutput};

use crate::error::{ClientError, ErrorKind};

/// Username/password pair as cached between reloads
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Coordinator lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for the backend to assign a connection identity
    Connecting,
    /// Identity assigned, no session
    Identified,
    /// Identity assigned, login from cached credentials in flight
    AutoLoginPending,
    /// Session established
    Authenticated,
    /// Connection closed; no further transitions
    Disconnected,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Connecting => write!(f, "connecting"),
            Phase::Identified => write!(f, "identified"),
            Phase::AutoLoginPending => write!(f, "auto-login pending"),
            Phase::Authenticated => write!(f, "authenticated"),
            Phase::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// The authenticated user's view of their deployed executables
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub executables: Vec<Executable>,
}

impl Session {
    /// Build a session from a backend listing.
    ///
    /// Entries repeating an earlier identifier are dropped.
    pub fn from_listing(listing: Vec<Executable>) -> Self {
        let mut session = Self::default();
        for executable in listing {
            if !session.push(executable.clone()) {
                tracing::warn!(id = %executable.id, "Duplicate executable id in listing, skipping");
            }
        }
        session
    }

    /// Whether an executable with this id is part of the session
    pub fn contains(&self, id: &ExecutableId) -> bool {
        self.executables.iter().any(|e| &e.id == id)
    }

    /// Look up an executable by id
    pub fn get(&self, id: &ExecutableId) -> Option<&Executable> {
        self.executables.iter().find(|e| &e.id == id)
    }

    /// Append an executable. Returns false if the id is already present.
    pub fn push(&mut self, executable: Executable) -> bool {
        if self.contains(&executable.id) {
            return false;
        }
        self.executables.push(executable);
        true
    }

    pub fn len(&self) -> usize {
        self.executables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executables.is_empty()
    }
}

/// Deployment awaiting its `deployOutput`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDeployment {
    pub name: String,
}

/// Execution awaiting its `executeOutput`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingExecution {
    /// Local tag for log correlation; never sent to the backend
    pub request_id: Uuid,
    pub executable_id: ExecutableId,
}

/// Most recent unacknowledged failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastError {
    pub kind: ErrorKind,
    pub message: String,
}

impl LastError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Convert into the matching client error
    pub fn to_error(&self) -> ClientError {
        ClientError::from_backend(self.kind, self.message.clone())
    }
}

/// Immutable snapshot of the coordinator state handed to observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub phase: Phase,
    /// Whether the presentation layer may act on this state
    pub ready: bool,
    pub connection_id: Option<ConnectionId>,
    pub session: Option<Session>,
    /// Name of the account last used for login or registration
    pub username: Option<String>,
    pub pending_deployment: Option<PendingDeployment>,
    pub pending_execution: Option<PendingExecution>,
    pub last_execution: Option<ExecutionOutput>,
    pub last_error: Option<LastError>,
}

impl SessionView {
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn executables(&self) -> &[Executable] {
        self.session
            .as_ref()
            .map(|s| s.executables.as_slice())
            .unwrap_or(&[])
    }
}

impl Default for SessionView {
    fn default() -> Self {
        Self {
            phase: Phase::Connecting,
            ready: false,
            connection_id: None,
            session: None,
            username: None,
            pending_deployment: None,
            pending_execution: None,
            last_execution: None,
            last_error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_from_listing_drops_duplicates() {
        let session = Session::from_listing(vec![
            Executable::new("e1", "first"),
            Executable::new("e2", "second"),
            Executable::new("e1", "again"),
        ]);
        assert_eq!(session.len(), 2);
        assert_eq!(session.get(&ExecutableId::new("e1")).unwrap().name, "first");
    }

    #[test]
    fn test_session_push_preserves_order() {
        let mut session = Session::default();
        assert!(session.push(Executable::new("a", "one")));
        assert!(session.push(Executable::new("b", "two")));
        assert!(!session.push(Executable::new("a", "dup")));

        let names: Vec<_> = session.executables.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["one", "two"]);
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("alice", "hunter2");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(format!("{}", Phase::Connecting), "connecting");
        assert_eq!(format!("{}", Phase::AutoLoginPending), "auto-login pending");
    }

    #[test]
    fn test_default_view_is_not_ready() {
        let view = SessionView::default();
        assert_eq!(view.phase, Phase::Connecting);
        assert!(!view.ready);
        assert!(!view.is_authenticated());
        assert!(view.executables().is_empty());
    }
}
