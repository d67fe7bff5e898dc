//! Level-specific handler behavior.
//!
//! A [`HandlerKind`] supplies what differs between the levels of the
//! hierarchy: how a context maps to a context id, how a command reaches the
//! next hop, and what happens with session data and on destruction.

use super::Handler;
use crate::context::Context;
use crate::error::{RouteError, RouteResult};
use crate::transport::{self, Connector};
use async_trait::async_trait;
use routenet_proto::{Command, ContextId, HandlerType, SessionDataItem};
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait HandlerKind: Send + Sync {
    fn handler_type(&self) -> HandlerType;

    /// Namespace of the modules hosted at this level.
    fn module_path(&self) -> &'static str {
        self.handler_type().module_path()
    }

    /// Context id of the handler observing `context`.
    fn context_id(&self, context: &Context) -> ContextId {
        ContextId::new(context.id.as_str())
    }

    /// Receives the session data items matching the handler's context, once,
    /// at creation.
    fn apply_initial_session_data_items(&self, _handler: &Handler, _items: &[SessionDataItem]) {}

    /// Move `command` one hop closer to its destination.
    async fn forward_command(&self, handler: &Handler, command: &Command) -> RouteResult {
        Err(RouteError::unreachable(handler.name(), &command.destination))
    }

    /// Called once while the handler is being destroyed.
    fn handler_destroyed(&self, _handler: &Handler) {}
}

/// A level that forwards to the level below through a [`Connector`].
pub struct RelayKind {
    handler_type: HandlerType,
    connector: Arc<dyn Connector>,
}

impl RelayKind {
    pub fn new(handler_type: HandlerType, connector: Arc<dyn Connector>) -> Self {
        Self {
            handler_type,
            connector,
        }
    }
}

#[async_trait]
impl HandlerKind for RelayKind {
    fn handler_type(&self) -> HandlerType {
        self.handler_type
    }

    fn context_id(&self, context: &Context) -> ContextId {
        match self.handler_type {
            // One root per session, whatever context it is given.
            HandlerType::Root => ContextId::root(),
            _ => ContextId::new(context.id.as_str()),
        }
    }

    async fn forward_command(&self, handler: &Handler, command: &Command) -> RouteResult {
        transport::forward_command(handler, self.connector.as_ref(), command).await
    }

    fn handler_destroyed(&self, handler: &Handler) {
        self.connector.release(handler);
    }
}

/// The bottom level. Has no next hop.
#[derive(Debug, Default)]
pub struct LeafKind;

impl HandlerKind for LeafKind {
    fn handler_type(&self) -> HandlerType {
        HandlerType::Leaf
    }
}

/// Kind table consulted by a registry when it creates handlers.
#[derive(Clone, Default)]
pub struct HandlerKinds {
    kinds: HashMap<HandlerType, Arc<dyn HandlerKind>>,
}

impl HandlerKinds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relay kinds for every level above the leaves, all using `connector`.
    pub fn standard(connector: Arc<dyn Connector>) -> Self {
        let mut kinds = Self::new();
        for handler_type in [HandlerType::Root, HandlerType::Process, HandlerType::Thread] {
            kinds.insert(Arc::new(RelayKind::new(handler_type, Arc::clone(&connector))));
        }
        kinds.insert(Arc::new(LeafKind));
        kinds
    }

    /// Register `kind` for its handler type, replacing any previous one.
    pub fn insert(&mut self, kind: Arc<dyn HandlerKind>) -> &mut Self {
        self.kinds.insert(kind.handler_type(), kind);
        self
    }

    pub fn with(mut self, kind: Arc<dyn HandlerKind>) -> Self {
        self.insert(kind);
        self
    }

    pub fn get(&self, handler_type: HandlerType) -> Option<Arc<dyn HandlerKind>> {
        self.kinds.get(&handler_type).cloned()
    }
}
