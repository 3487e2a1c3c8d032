//! Identifier types
//!
//! The backend treats identifiers as opaque. Depending on the deployment they
//! arrive as JSON strings or numbers, so both forms are accepted and kept as
//! their string representation.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Identity assigned by the backend to a single live connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(#[serde(deserialize_with = "string_or_number")] pub String);

/// Identifier of a deployed executable
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutableId(#[serde(deserialize_with = "string_or_number")] pub String);

macro_rules! impl_id {
    ($name:ident) => {
        impl $name {
            /// Create a new identifier
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the raw identifier string
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

impl_id!(ConnectionId);
impl_id!(ExecutableId);

/// Accept either a JSON string or a JSON number
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Num(n) => n.to_string(),
    })
}
