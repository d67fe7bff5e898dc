//! The fixed hierarchy of handler kinds.
//!
//! Handlers form a single chain from the session root down to the leaf
//! contexts: `Root → Process → Thread → Leaf`. Each step down crosses an
//! execution boundary (process or thread), so a `Leaf` handler sits three hops
//! away from its `Root`.

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of handler, and therefore of the context it observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HandlerType {
    /// Per-session entry point living next to the external caller.
    Root,
    /// One handler per session and process.
    Process,
    /// One handler per session and thread inside a process.
    Thread,
    /// One handler per session and leaf context (document, worker scope...).
    Leaf,
}

impl HandlerType {
    /// Every handler type, ordered from the root downwards.
    pub const ALL: [HandlerType; 4] = [Self::Root, Self::Process, Self::Thread, Self::Leaf];

    /// Distance from the root (`Root` is 0).
    pub fn depth(self) -> usize {
        match self {
            Self::Root => 0,
            Self::Process => 1,
            Self::Thread => 2,
            Self::Leaf => 3,
        }
    }

    /// The handler type one level closer to the root.
    pub fn parent(self) -> Option<Self> {
        self.depth().checked_sub(1).map(|d| Self::ALL[d])
    }

    /// The handler type one level further from the root.
    pub fn child(self) -> Option<Self> {
        Self::ALL.get(self.depth() + 1).copied()
    }

    /// True when `other` is this type or lies below it.
    pub fn contains(self, other: Self) -> bool {
        self.depth() <= other.depth()
    }

    /// The next hop type when routing from `self` toward `destination`.
    ///
    /// Returns `None` when `destination` is `self` or above it.
    pub fn next_toward(self, destination: Self) -> Option<Self> {
        if destination.depth() > self.depth() {
            self.child()
        } else {
            None
        }
    }

    /// Folder-like namespace for modules hosted by this handler type.
    pub fn module_path(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Process => "process",
            Self::Thread => "thread",
            Self::Leaf => "leaf",
        }
    }

    /// Canonical name, as used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Root => "Root",
            Self::Process => "Process",
            Self::Thread => "Thread",
            Self::Leaf => "Leaf",
        }
    }

    /// Parse a handler type name (case-insensitive).
    pub fn parse(value: &str) -> Result<Self, ProtocolError> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| ProtocolError::UnknownHandlerType(value.to_string()))
    }
}

impl fmt::Display for HandlerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandlerType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
