//! Protocol commands.

use crate::destination::CommandDestination;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A protocol command addressed to a destination.
///
/// Commands are transient values: built per call, cloned when they cross a
/// boundary, and never mutated once dispatch has begun.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    /// Protocol module name (e.g. `nav`).
    pub module_name: String,
    /// Command name within the module (e.g. `go`).
    pub command_name: String,
    /// Module-specific parameters.
    #[serde(default)]
    pub params: Value,
    /// Where the command should run.
    pub destination: CommandDestination,
    /// Retry once if the link to the next hop is lost mid-command.
    #[serde(default)]
    pub retry_on_abort: bool,
}

impl Command {
    /// Create a command with null params and no retry.
    pub fn new(
        module_name: impl Into<String>,
        command_name: impl Into<String>,
        destination: CommandDestination,
    ) -> Self {
        Self {
            module_name: module_name.into(),
            command_name: command_name.into(),
            params: Value::Null,
            destination,
            retry_on_abort: false,
        }
    }

    /// Set the command parameters.
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    /// Set the retry-on-abort flag.
    pub fn with_retry_on_abort(mut self, retry: bool) -> Self {
        self.retry_on_abort = retry;
        self
    }

    /// `module.command`, as used in logs and metrics.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module_name, self.command_name)
    }
}
