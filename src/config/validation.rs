//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::collections::HashSet;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("node.name is required")]
    MissingNodeName,
    #[error("domains.inbox_capacity must be at least 1")]
    ZeroInboxCapacity,
    #[error("process id must not be empty")]
    EmptyProcessId,
    #[error("duplicate process id '{0}'")]
    DuplicateProcess(String),
    #[error("thread id in process '{0}' must not be empty")]
    EmptyThreadId(String),
    #[error("duplicate thread id '{thread}' in process '{process}'")]
    DuplicateThread { process: String, thread: String },
    #[error("leaf id in thread '{0}' must not be empty")]
    EmptyLeafId(String),
    #[error("duplicate leaf id '{0}'")]
    DuplicateLeaf(String),
    #[error("process id '{0}' must not contain '/'")]
    ReservedSeparator(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.node.name.trim().is_empty() {
        errors.push(ValidationError::MissingNodeName);
    }
    if config.domains.inbox_capacity == 0 {
        errors.push(ValidationError::ZeroInboxCapacity);
    }

    let mut processes = HashSet::new();
    // Leaf ids address contexts directly, so they are unique across the whole tree.
    let mut leaves = HashSet::new();
    for process in &config.processes {
        if process.id.is_empty() {
            errors.push(ValidationError::EmptyProcessId);
        } else if process.id.contains('/') {
            errors.push(ValidationError::ReservedSeparator(process.id.clone()));
        } else if !processes.insert(process.id.as_str()) {
            errors.push(ValidationError::DuplicateProcess(process.id.clone()));
        }

        let mut threads = HashSet::new();
        for thread in &process.threads {
            if thread.id.is_empty() {
                errors.push(ValidationError::EmptyThreadId(process.id.clone()));
            } else if !threads.insert(thread.id.as_str()) {
                errors.push(ValidationError::DuplicateThread {
                    process: process.id.clone(),
                    thread: thread.id.clone(),
                });
            }

            for leaf in &thread.leaves {
                if leaf.is_empty() {
                    errors.push(ValidationError::EmptyLeafId(thread.id.clone()));
                } else if !leaves.insert(leaf.as_str()) {
                    errors.push(ValidationError::DuplicateLeaf(leaf.clone()));
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
