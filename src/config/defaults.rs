//! Default value functions for configuration.

pub fn default_node_name() -> String {
    "routenetd".to_string()
}

// =============================================================================
// Routing Defaults
// =============================================================================

pub fn default_retry_on_abort() -> bool {
    false
}

// =============================================================================
// Domain Defaults
// =============================================================================

/// Requests buffered per execution domain before senders wait.
pub fn default_inbox_capacity() -> usize {
    256
}

// =============================================================================
// Log Defaults
// =============================================================================

pub fn default_log_filter() -> String {
    "info".to_string()
}
