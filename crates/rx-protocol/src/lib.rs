//! rx-protocol: Wire protocol for the rexec remote execution service
//!
//! This crate defines the JSON messages exchanged with the backend over the
//! WebSocket connection, the identifier types they carry, and the argument
//! encoding used by `execute` requests.

pub mod args;
pub mod error;
pub mod ids;
pub mod message;

pub use args::{decode_args, encode_args, ARG_DELIMITER};
pub use error::ProtocolError;
pub use ids::{ConnectionId, ExecutableId};
pub use message::{Executable, ExecutionOutput, Inbound, Outbound};
