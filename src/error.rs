//! Unified error handling for routenet.
//!
//! This module provides the error hierarchy surfaced by command routing, with
//! stable codes for metric labels and wire replies.

use routenet_proto::{CommandDestination, HandlerType};
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// Module Errors (opaque to the router)
// ============================================================================

/// Failure reported by a module while executing a command.
///
/// The router never inspects these; they travel back to the original caller
/// unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ModuleError {
    code: String,
    message: String,
    data: Option<Value>,
}

impl ModuleError {
    /// Create a module error with a snake_case code.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            data: None,
        }
    }

    /// The params did not match what the command expects.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new("invalid_argument", message)
    }

    /// Attach structured details.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Module-defined error code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Human readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Structured details, if any.
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }
}

// ============================================================================
// Routing Errors
// ============================================================================

/// Errors that can occur while routing a command.
#[derive(Debug, Error)]
pub enum RouteError {
    /// No module on the route to the destination supports the command.
    #[error("{module}.{command} is not supported for destination {destination}")]
    UnsupportedCommand {
        module: String,
        command: String,
        destination: CommandDestination,
    },

    /// The link to the next hop went away while the command was in flight.
    ///
    /// `relayed` is set once the abort has passed back through a forwarding
    /// handler. Only the handler owning the lost link may retry.
    #[error("link to {hop} aborted: {reason}")]
    TransportAbort {
        hop: String,
        reason: String,
        relayed: bool,
    },

    /// The handler has no further hop toward the destination.
    #[error("{from} has no route to {destination}")]
    DestinationUnreachable {
        from: String,
        destination: CommandDestination,
    },

    /// The invoked module failed.
    #[error("module error: {0}")]
    ModuleExecution(#[from] ModuleError),

    /// A context id does not exist in the context tree.
    #[error("unknown context {handler_type}({id})")]
    UnknownContext { handler_type: HandlerType, id: String },

    /// A registry was asked for a handler type it has no kind for.
    #[error("no handler kind registered for {0}")]
    UnregisteredHandlerType(HandlerType),

    /// The execution domain hosting a context is not running.
    #[error("domain {0} is not running")]
    DomainUnavailable(String),
}

impl RouteError {
    /// Create an unsupported-command error.
    pub fn unsupported(
        module: impl Into<String>,
        command: impl Into<String>,
        destination: &CommandDestination,
    ) -> Self {
        Self::UnsupportedCommand {
            module: module.into(),
            command: command.into(),
            destination: destination.clone(),
        }
    }

    /// Create a transport-abort error.
    pub fn aborted(hop: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TransportAbort {
            hop: hop.into(),
            reason: reason.into(),
            relayed: false,
        }
    }

    /// Mark an abort as coming from further down the route. Other errors are
    /// returned unchanged.
    pub fn relayed(self) -> Self {
        match self {
            Self::TransportAbort { hop, reason, .. } => Self::TransportAbort {
                hop,
                reason,
                relayed: true,
            },
            other => other,
        }
    }

    /// Create a destination-unreachable error.
    pub fn unreachable(from: impl Into<String>, destination: &CommandDestination) -> Self {
        Self::DestinationUnreachable {
            from: from.into(),
            destination: destination.clone(),
        }
    }

    /// Create an unknown-context error.
    pub fn unknown_context(handler_type: HandlerType, id: impl Into<String>) -> Self {
        Self::UnknownContext {
            handler_type,
            id: id.into(),
        }
    }

    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnsupportedCommand { .. } => "unsupported_command",
            Self::TransportAbort { .. } => "transport_abort",
            Self::DestinationUnreachable { .. } => "destination_unreachable",
            Self::ModuleExecution(_) => "module_execution",
            Self::UnknownContext { .. } => "unknown_context",
            Self::UnregisteredHandlerType(_) => "unregistered_handler_type",
            Self::DomainUnavailable(_) => "domain_unavailable",
        }
    }

    /// Code reported to clients: module errors keep their own code.
    pub fn wire_code(&self) -> String {
        match self {
            Self::ModuleExecution(e) => e.code().to_string(),
            other => other.error_code().to_string(),
        }
    }

    /// Only the loss of this handler's own link may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransportAbort { relayed: false, .. })
    }
}

/// Result type for routed commands.
pub type RouteResult<T = Value> = Result<T, RouteError>;
