//! Opaque identifiers for sessions and contexts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque session identifier chosen by the external caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

/// Identifier of a concrete context, derived from the context by its handler kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(String);

macro_rules! string_id {
    ($ty:ident) => {
        impl $ty {
            /// Create an identifier from any string-like value.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $ty {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $ty {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(SessionId);
string_id!(ContextId);

impl ContextId {
    /// Context id shared by every root handler.
    pub const ROOT: &'static str = "root";

    /// The root context id.
    pub fn root() -> Self {
        Self::new(Self::ROOT)
    }
}
