//! Message types for the rexec protocol
//!
//! Every message is a JSON object carried in a single WebSocket text frame and
//! discriminated by its `type` field.
//!
//! # Message Flow
//!
//! 1. Client connects; backend sends `sendId` with the connection identity
//! 2. Client sends `login` or `register`; backend answers `loginOutput`
//! 3. Client uploads an artifact out of band (HTTP, tagged with the identity);
//!    backend answers `deployOutput` on the connection
//! 4. Client sends `execute`; backend answers `executeOutput`
//! 5. Client sends `logout` (no reply)
//!
//! Replies carry no request identifier. Correlation is positional: the client
//! keeps at most one request of each kind in flight.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::ids::{ConnectionId, ExecutableId};

/// A deployed executable as listed by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Executable {
    /// Backend-assigned identifier
    pub id: ExecutableId,
    /// Human-readable name chosen at deploy time
    pub name: String,
}

impl Executable {
    /// Create a new executable entry
    pub fn new(id: impl Into<ExecutableId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Result of a remote execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutput {
    /// Process exit code
    pub exit_code: i32,
    /// Captured standard output
    #[serde(default)]
    pub stdout: String,
    /// Captured standard error
    #[serde(default)]
    pub stderr: String,
}

/// Message sent from the client to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Outbound {
    /// Authenticate an existing account
    Login { username: String, password: String },

    /// End the authenticated session
    Logout,

    /// Create a new account
    Register { username: String, password: String },

    /// Run a deployed executable
    Execute {
        id: ExecutableId,
        /// Arguments joined with `;` (see [`crate::args`])
        args: String,
    },
}

impl Outbound {
    /// Wire name of this message
    pub fn kind(&self) -> &'static str {
        match self {
            Outbound::Login { .. } => "login",
            Outbound::Logout => "logout",
            Outbound::Register { .. } => "register",
            Outbound::Execute { .. } => "execute",
        }
    }

    /// Serialize to a JSON text frame
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from a JSON text frame
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Message pushed from the backend to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Inbound {
    /// Identity assigned to this connection
    SendId { id: ConnectionId },

    /// Reply to `login` or `register`
    LoginOutput {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exec: Option<Vec<Executable>>,
    },

    /// Reply to an out-of-band upload
    DeployOutput {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<ExecutableId>,
    },

    /// Reply to `execute`
    ExecuteOutput {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<ExecutionOutput>,
    },

    /// Any message type this client does not know about
    #[serde(other)]
    Unknown,
}

impl Inbound {
    /// Wire name of this message
    pub fn kind(&self) -> &'static str {
        match self {
            Inbound::SendId { .. } => "sendId",
            Inbound::LoginOutput { .. } => "loginOutput",
            Inbound::DeployOutput { .. } => "deployOutput",
            Inbound::ExecuteOutput { .. } => "executeOutput",
            Inbound::Unknown => "unknown",
        }
    }

    /// Backend error carried by a reply, if any.
    ///
    /// Empty strings count as absent.
    pub fn error(&self) -> Option<&str> {
        let error = match self {
            Inbound::LoginOutput { error, .. }
            | Inbound::DeployOutput { error, .. }
            | Inbound::ExecuteOutput { error, .. } => error.as_deref(),
            Inbound::SendId { .. } | Inbound::Unknown => None,
        };
        error.filter(|e| !e.is_empty())
    }

    /// Serialize to a JSON text frame
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from a JSON text frame
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_wire_format() {
        let msg = Outbound::Login {
            username: "a".to_string(),
            password: "p".to_string(),
        };
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"type": "login", "username": "a", "password": "p"})
        );
    }

    #[test]
    fn test_logout_wire_format() {
        assert_eq!(Outbound::Logout.to_json().unwrap(), r#"{"type":"logout"}"#);
    }

    #[test]
    fn test_execute_wire_format() {
        let msg = Outbound::Execute {
            id: ExecutableId::new("e1"),
            args: "x;y".to_string(),
        };
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"type": "execute", "id": "e1", "args": "x;y"})
        );
    }

    #[test]
    fn test_send_id_parse() {
        let msg = Inbound::from_json(r#"{"type":"sendId","id":"c1"}"#).unwrap();
        assert_eq!(
            msg,
            Inbound::SendId {
                id: ConnectionId::new("c1")
            }
        );
    }

    #[test]
    fn test_login_output_with_exec() {
        let msg =
            Inbound::from_json(r#"{"type":"loginOutput","exec":[{"id":"e1","name":"f"}]}"#)
                .unwrap();
        match msg {
            Inbound::LoginOutput { error, exec } => {
                assert!(error.is_none());
                assert_eq!(exec.unwrap(), vec![Executable::new("e1", "f")]);
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_execute_output_parse() {
        let msg = Inbound::from_json(
            r#"{"type":"executeOutput","output":{"exitCode":0,"stdout":"ok","stderr":""}}"#,
        )
        .unwrap();
        match msg {
            Inbound::ExecuteOutput { output, .. } => {
                let output = output.unwrap();
                assert_eq!(output.exit_code, 0);
                assert_eq!(output.stdout, "ok");
                assert_eq!(output.stderr, "");
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_numeric_ids_accepted() {
        let msg = Inbound::from_json(r#"{"type":"deployOutput","id":17}"#).unwrap();
        assert_eq!(
            msg,
            Inbound::DeployOutput {
                error: None,
                id: Some(ExecutableId::new("17")),
            }
        );
    }

    #[test]
    fn test_unknown_type_is_tolerated() {
        let msg = Inbound::from_json(r#"{"type":"somethingNew","payload":1}"#).unwrap();
        assert_eq!(msg, Inbound::Unknown);
    }

    #[test]
    fn test_empty_error_is_absent() {
        let msg = Inbound::from_json(r#"{"type":"deployOutput","error":"","id":"e2"}"#).unwrap();
        assert!(msg.error().is_none());

        let msg = Inbound::from_json(r#"{"type":"loginOutput","error":"bad creds"}"#).unwrap();
        assert_eq!(msg.error(), Some("bad creds"));
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(Inbound::from_json("not json").is_err());
        assert!(Inbound::from_json(r#"{"id":"c1"}"#).is_err());
    }
}
