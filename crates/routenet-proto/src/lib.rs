//! # routenet-proto
//!
//! Value types shared by every participant of a routenet network, and the
//! JSON-lines frames spoken by the `routenetd` daemon.
//!
//! ## Overview
//!
//! - [`HandlerType`]: the fixed hierarchy of handler kinds (`Root` down to `Leaf`)
//! - [`CommandDestination`]: where a command should run, either one concrete
//!   context or every context matching a [`ContextDescriptor`]
//! - [`Command`]: a protocol command addressed to a destination
//! - [`Event`]: the envelope that bubbles from any handler up to the root
//! - [`SessionDataItem`]: session-scoped configuration handed to new handlers
//! - [`wire`]: request/response frames for the daemon's stdin/stdout protocol
//!
//! ## Quick Start
//!
//! ```rust
//! use routenet_proto::{Command, CommandDestination, HandlerType};
//!
//! let command = Command::new(
//!     "nav",
//!     "go",
//!     CommandDestination::context(HandlerType::Leaf, "ctx-42"),
//! )
//! .with_params(serde_json::json!({ "url": "https://example.com" }));
//!
//! assert_eq!(command.qualified_name(), "nav.go");
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod command;
pub mod destination;
pub mod error;
pub mod event;
pub mod handler_type;
pub mod ids;
pub mod session_data;
pub mod wire;

pub use self::command::Command;
pub use self::destination::{CommandDestination, ContextDescriptor, DestinationTarget};
pub use self::error::{ProtocolError, Result};
pub use self::event::{ContextInfo, Event, EventOptions};
pub use self::handler_type::HandlerType;
pub use self::ids::{ContextId, SessionId};
pub use self::session_data::SessionDataItem;
