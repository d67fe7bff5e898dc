//! Telemetry utilities for command timing and span construction.

use std::time::Instant;

/// Guard for timing module execution and recording metrics.
///
/// Records latency when dropped.
pub struct CommandTimer {
    module: String,
    command: String,
    start: Instant,
}

impl CommandTimer {
    /// Start timing a command.
    pub fn new(module: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            command: command.into(),
            start: Instant::now(),
        }
    }
}

impl Drop for CommandTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_command(&self.module, &self.command, duration);
    }
}

/// Standardized span constructors for routing observability.
pub mod spans {
    use tracing::{Span, debug_span, info_span};

    /// Span covering one execution domain's actor loop.
    pub fn domain(id: &str) -> Span {
        info_span!("domain", id = %id)
    }

    /// Span covering one handler's processing of a command.
    pub fn command(qualified: &str, handler: &str, destination: &str) -> Span {
        debug_span!("route.command", name = %qualified, handler = %handler, destination = %destination)
    }

    /// Span covering one client connection of the daemon.
    pub fn client(session: &str) -> Span {
        info_span!("client", session = %session)
    }
}
