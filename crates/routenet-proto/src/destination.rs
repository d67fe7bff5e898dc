//! Command destinations and context descriptors.
//!
//! A destination names the handler type that should run a command and either
//! one concrete context id or a [`ContextDescriptor`] selecting every matching
//! context. On the wire the two forms share one object:
//!
//! ```json
//! {"type":"Leaf","id":"ctx-42"}
//! {"type":"Leaf","contextDescriptor":{"type":"All"}}
//! ```
//!
//! Exactly one of `id` and `contextDescriptor` must be present.

use crate::error::ProtocolError;
use crate::handler_type::HandlerType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Abstract selection of contexts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContextDescriptor {
    /// Every context of the destination type.
    All,
    /// Exactly one context; the id format depends on the handler type.
    SpecificContext {
        /// Id of the selected context.
        id: String,
    },
}

impl fmt::Display for ContextDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::SpecificContext { id } => write!(f, "SpecificContext({id})"),
        }
    }
}

/// Which context(s) of the destination type a command targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DestinationTarget {
    /// One concrete context.
    Id(String),
    /// Every context matching the descriptor.
    Descriptor(ContextDescriptor),
}

/// Where a command should be handled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDestination", into = "RawDestination")]
pub struct CommandDestination {
    handler_type: HandlerType,
    target: DestinationTarget,
}

impl CommandDestination {
    /// Target one concrete context.
    pub fn context(handler_type: HandlerType, id: impl Into<String>) -> Self {
        Self {
            handler_type,
            target: DestinationTarget::Id(id.into()),
        }
    }

    /// Target every context of `handler_type` matching `descriptor`.
    pub fn broadcast(handler_type: HandlerType, descriptor: ContextDescriptor) -> Self {
        Self {
            handler_type,
            target: DestinationTarget::Descriptor(descriptor),
        }
    }

    /// The handler type that should run the command.
    pub fn handler_type(&self) -> HandlerType {
        self.handler_type
    }

    /// The concrete or abstract target.
    pub fn target(&self) -> &DestinationTarget {
        &self.target
    }

    /// Concrete context id, when the destination names one.
    pub fn id(&self) -> Option<&str> {
        match &self.target {
            DestinationTarget::Id(id) => Some(id),
            DestinationTarget::Descriptor(_) => None,
        }
    }

    /// Context descriptor, when the destination is a broadcast.
    pub fn descriptor(&self) -> Option<&ContextDescriptor> {
        match &self.target {
            DestinationTarget::Id(_) => None,
            DestinationTarget::Descriptor(d) => Some(d),
        }
    }

    /// True when the destination selects contexts through a descriptor.
    pub fn is_broadcast(&self) -> bool {
        matches!(self.target, DestinationTarget::Descriptor(_))
    }
}

impl fmt::Display for CommandDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            DestinationTarget::Id(id) => write!(f, "{}({id})", self.handler_type),
            DestinationTarget::Descriptor(d) => write!(f, "{}[{d}]", self.handler_type),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDestination {
    #[serde(rename = "type")]
    handler_type: HandlerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context_descriptor: Option<ContextDescriptor>,
}

impl TryFrom<RawDestination> for CommandDestination {
    type Error = ProtocolError;

    fn try_from(raw: RawDestination) -> Result<Self, Self::Error> {
        let target = match (raw.id, raw.context_descriptor) {
            (Some(id), None) => DestinationTarget::Id(id),
            (None, Some(descriptor)) => DestinationTarget::Descriptor(descriptor),
            (Some(_), Some(_)) => {
                return Err(ProtocolError::InvalidDestination(
                    "id and contextDescriptor are mutually exclusive".to_string(),
                ))
            }
            (None, None) => {
                return Err(ProtocolError::InvalidDestination(
                    "one of id or contextDescriptor is required".to_string(),
                ))
            }
        };
        Ok(Self {
            handler_type: raw.handler_type,
            target,
        })
    }
}

impl From<CommandDestination> for RawDestination {
    fn from(destination: CommandDestination) -> Self {
        let (id, context_descriptor) = match destination.target {
            DestinationTarget::Id(id) => (Some(id), None),
            DestinationTarget::Descriptor(d) => (None, Some(d)),
        };
        Self {
            handler_type: destination.handler_type,
            id,
            context_descriptor,
        }
    }
}
