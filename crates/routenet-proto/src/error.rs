//! Error types for protocol values and wire frames.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Errors raised while building or decoding protocol values.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A destination carried both or neither of `id` and `contextDescriptor`.
    #[error("invalid destination: {0}")]
    InvalidDestination(String),

    /// A handler type name did not match any known kind.
    #[error("unknown handler type: {0}")]
    UnknownHandlerType(String),

    /// A frame was not valid JSON or did not match the expected shape.
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
}
