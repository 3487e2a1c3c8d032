//! Protocol error types

use thiserror::Error;

/// Errors that can occur during protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Message could not be encoded or decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Argument contains the delimiter and cannot be represented on the wire
    #[error("Argument {index} contains the reserved delimiter '{delimiter}': {arg:?}")]
    UnencodableArgument {
        index: usize,
        arg: String,
        delimiter: char,
    },
}
