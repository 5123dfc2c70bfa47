//! Identifier wrappers for the credit proposal pipeline.
//!
//! All identifiers render as 32 lowercase hex characters (a UUID without
//! hyphens) so they can be embedded in storage keys as-is.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

const ID_LEN: usize = 32;
const SEP: u8 = 0x1f;

/// Error returned when parsing an identifier fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdParseError {
    message: String,
}

impl IdParseError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for IdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for IdParseError {}

macro_rules! define_hex_id {
    ($name:ident, $label:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4().simple().to_string())
            }

            /// Accepts either the hyphenated or the simple UUID form and
            /// normalises to the simple form.
            pub fn parse(value: &str) -> Result<Self, IdParseError> {
                let uuid = Uuid::parse_str(value.trim())
                    .map_err(|e| IdParseError::new(format!("Invalid {}: {}", $label, e)))?;
                Ok(Self(uuid.simple().to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

define_hex_id!(ProposalId, "proposal ID");
define_hex_id!(DocumentId, "document ID");

/// Identifier of a persisted decision.
///
/// Unlike the UUID-backed ids, a decision id may also be derived from the
/// identity of the object that triggered it, and tests inject arbitrary
/// labels, so it is an opaque token restricted to key-safe characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionId(String);

impl DecisionId {
    /// Fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Deterministic identifier for a source object.
    ///
    /// The same parts always produce the same id; parts are separated so
    /// `("ab", "c")` and `("a", "bc")` never collide.
    pub fn derived_from(parts: &[&str]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(part.as_bytes());
            hasher.update(&[SEP]);
        }
        Self(hasher.finalize().to_hex()[..ID_LEN].to_string())
    }

    /// Wraps an externally supplied token.
    pub fn parse(value: &str) -> Result<Self, IdParseError> {
        if value.is_empty() {
            return Err(IdParseError::new("Invalid decision ID: empty"));
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(IdParseError::new(format!(
                "Invalid decision ID: {value:?} contains characters outside [A-Za-z0-9_-]"
            )));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DecisionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DecisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DecisionId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
