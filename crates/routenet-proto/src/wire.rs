//! JSON-lines frames spoken by the `routenetd` daemon.
//!
//! Clients write one [`ClientRequest`] per line on stdin; the daemon writes one
//! [`DaemonMessage`] per line on stdout:
//!
//! ```json
//! {"kind":"command","id":1,"sessionId":"S1","command":{"moduleName":"diagnostics","commandName":"ping","destination":{"type":"Leaf","id":"ctx-42"}}}
//! {"kind":"result","id":1,"result":{"pong":true,"handler":"Leaf","context":"ctx-42"}}
//! ```
//!
//! Protocol events reaching a session root are streamed as `event` frames
//! without a request id.

use crate::command::Command;
use crate::destination::CommandDestination;
use crate::error::ProtocolError;
use crate::event::Event;
use crate::ids::SessionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A command as written by a client; `retryOnAbort` may be omitted and then
/// falls back to the daemon's configured default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandFrame {
    /// Protocol module name.
    pub module_name: String,
    /// Command name within the module.
    pub command_name: String,
    /// Module-specific parameters.
    #[serde(default)]
    pub params: Value,
    /// Where the command should run.
    pub destination: CommandDestination,
    /// Explicit retry policy, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_on_abort: Option<bool>,
}

impl CommandFrame {
    /// Turn the frame into a command, resolving the retry default.
    pub fn into_command(self, default_retry_on_abort: bool) -> Command {
        Command {
            module_name: self.module_name,
            command_name: self.command_name,
            params: self.params,
            destination: self.destination,
            retry_on_abort: self.retry_on_abort.unwrap_or(default_retry_on_abort),
        }
    }
}

/// A request line written by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ClientRequest {
    /// Route a command within a session, creating the session root on first use.
    #[serde(rename_all = "camelCase")]
    Command {
        /// Client-chosen correlation id.
        id: u64,
        /// Session to route in.
        session_id: SessionId,
        /// The command.
        command: CommandFrame,
    },
    /// Destroy every handler of a session.
    #[serde(rename_all = "camelCase")]
    EndSession {
        /// Client-chosen correlation id.
        id: u64,
        /// Session to end.
        session_id: SessionId,
    },
    /// Fetch the Prometheus text exposition.
    Metrics {
        /// Client-chosen correlation id.
        id: u64,
    },
}

impl ClientRequest {
    /// Parse one request line.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(line.trim())?)
    }

    /// Correlation id of the request.
    pub fn id(&self) -> u64 {
        match self {
            Self::Command { id, .. } | Self::EndSession { id, .. } | Self::Metrics { id } => *id,
        }
    }
}

/// Error body of an `error` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable snake_case error code.
    pub code: String,
    /// Human readable message.
    pub message: String,
}

/// A line written by the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DaemonMessage {
    /// Successful command result.
    Result {
        /// Id of the originating request.
        id: u64,
        /// Module-specific result value.
        result: Value,
    },
    /// Failed request; `id` is absent when the request line could not be parsed.
    Error {
        /// Id of the originating request.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        /// Error details.
        error: ErrorBody,
    },
    /// A protocol event that reached a session root.
    Event {
        /// The event envelope.
        event: Event,
    },
    /// Metrics exposition.
    Metrics {
        /// Id of the originating request.
        id: u64,
        /// Prometheus text format.
        text: String,
    },
}

impl DaemonMessage {
    /// Build an error frame.
    pub fn error(id: Option<u64>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            id,
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    /// Serialize as one line (without the trailing newline).
    pub fn to_line(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}
