//! Protocol modules: the business logic behind commands.
//!
//! - [`registry`]: static table of module classes, populated at startup
//! - [`cache`]: per-handler lazy instantiation
//! - [`table`]: `CommandTable` for name-to-method dispatch
//! - [`builtin`]: modules shipped with the daemon

pub mod builtin;
pub mod cache;
pub mod registry;
pub mod table;

pub use cache::ModuleCache;
pub use registry::{ModuleClass, ModuleFactory, ModuleRegistry, ModuleScope};
pub use table::{CommandFn, CommandTable, TableModule};

pub use crate::error::ModuleError;

use crate::events::EventEmitter;
use async_trait::async_trait;
use routenet_proto::{
    CommandDestination, ContextId, EventOptions, HandlerType, SessionDataItem, SessionId,
};
use serde_json::Value;
use std::sync::Arc;

/// A module instance living in one handler's cache.
#[async_trait]
pub trait Module: Send + Sync {
    /// Whether this instance can execute `command`.
    fn supports_command(&self, command: &str) -> bool;

    /// Execute `command` for `destination`.
    async fn invoke(
        &self,
        command: &str,
        params: Value,
        destination: &CommandDestination,
    ) -> Result<Value, ModuleError>;

    /// Called once when the owning handler is destroyed.
    fn destroy(&self) {}
}

/// What a module knows about the handler that created it.
#[derive(Clone)]
pub struct ModuleContext {
    session_id: SessionId,
    handler_type: HandlerType,
    context_id: ContextId,
    emitter: EventEmitter,
    session_data: Arc<[SessionDataItem]>,
}

impl ModuleContext {
    pub fn new(
        handler_type: HandlerType,
        context_id: ContextId,
        emitter: EventEmitter,
        session_data: Arc<[SessionDataItem]>,
    ) -> Self {
        Self {
            session_id: emitter.session_id().clone(),
            handler_type,
            context_id,
            emitter,
            session_data,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn handler_type(&self) -> HandlerType {
        self.handler_type
    }

    pub fn context_id(&self) -> &ContextId {
        &self.context_id
    }

    /// Session data items that matched the handler's context at creation.
    pub fn session_data(&self) -> &[SessionDataItem] {
        &self.session_data
    }

    /// Emit an event on the owning handler.
    pub fn emit_event(&self, name: &str, data: Value, options: EventOptions) {
        self.emitter.emit(name, data, options);
    }

    pub fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }
}
