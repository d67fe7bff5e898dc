use super::HandlerKind;
use crate::context::Context;
use crate::error::{RouteError, RouteResult};
use crate::events::{DESTROYED_EVENT, EventEmitter, EventsDispatcher, HANDLER_EVENT, ListenerId};
use crate::modules::{ModuleCache, ModuleClass, ModuleContext, ModuleRegistry};
use crate::registry::matching;
use crate::telemetry::{CommandTimer, spans};
use routenet_proto::{
    Command, CommandDestination, ContextId, ContextInfo, Event, EventOptions, HandlerType,
    SessionDataItem, SessionId,
};
use serde_json::{Value, json};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{Instrument, debug};

/// The (session, type, context) tuple a handler is addressed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerIdentity {
    pub session_id: SessionId,
    pub handler_type: HandlerType,
    pub context_id: ContextId,
}

impl HandlerIdentity {
    pub fn new(
        session_id: impl Into<SessionId>,
        handler_type: HandlerType,
        context_id: impl Into<ContextId>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            handler_type,
            context_id: context_id.into(),
        }
    }

    /// Display name, for logs only.
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for HandlerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.session_id, self.handler_type, self.context_id
        )
    }
}

/// A node of the routing network, bound to one session and one context.
///
/// Owns its module cache and event dispatcher. The context is only borrowed
/// weakly; it belongs to the context tree.
pub struct Handler {
    identity: HandlerIdentity,
    name: String,
    kind: Arc<dyn HandlerKind>,
    context: Weak<Context>,
    modules: ModuleCache,
    emitter: EventEmitter,
    session_data: Arc<[SessionDataItem]>,
    destroyed: AtomicBool,
}

impl Handler {
    /// Build a handler. `session_data` is the full session snapshot; only the
    /// items matching `context` are exposed to modules.
    pub fn new(
        identity: HandlerIdentity,
        kind: Arc<dyn HandlerKind>,
        context: &Arc<Context>,
        modules: Arc<ModuleRegistry>,
        session_data: Vec<SessionDataItem>,
    ) -> Self {
        let info = ContextInfo::new(identity.handler_type, identity.context_id.clone());
        let emitter = EventEmitter::new(
            Arc::new(EventsDispatcher::new()),
            identity.session_id.clone(),
            info,
        );
        let applicable: Arc<[SessionDataItem]> =
            matching::matching_items(&session_data, context).into();
        let module_ctx = ModuleContext::new(
            identity.handler_type,
            identity.context_id.clone(),
            emitter.clone(),
            applicable,
        );
        crate::metrics::add_active_handlers(identity.handler_type.as_str(), 1);

        Self {
            name: identity.name(),
            identity,
            kind,
            context: Arc::downgrade(context),
            modules: ModuleCache::new(modules, module_ctx),
            emitter,
            session_data: session_data.into(),
            destroyed: AtomicBool::new(false),
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Execute `command` here or pass it toward its destination.
    pub async fn handle_command(&self, command: &Command) -> RouteResult {
        let route_span = spans::command(
            &command.qualified_name(),
            &self.name,
            &command.destination.to_string(),
        );
        let result = self.route(command).instrument(route_span).await;
        // Counted where the command entered, not once per relaying hop.
        if let Err(e) = &result
            && self.handler_type() == HandlerType::Root
        {
            crate::metrics::record_command_error(&command.module_name, e.error_code());
        }
        result
    }

    async fn route(&self, command: &Command) -> RouteResult {
        let destination = &command.destination;

        if self.is_destroyed() {
            let err = RouteError::aborted(self.name.as_str(), "handler destroyed");
            return Err(self.fail(command, err));
        }
        if !self.handler_type().contains(destination.handler_type()) {
            let err = RouteError::unreachable(self.name.as_str(), destination);
            return Err(self.fail(command, err));
        }
        if !self.supports_command(&command.module_name, &command.command_name, destination) {
            let err = RouteError::unsupported(
                command.module_name.as_str(),
                command.command_name.as_str(),
                destination,
            );
            return Err(self.fail(command, err));
        }

        let instances = self
            .modules
            .get_module_instances(&command.module_name, destination);
        if let Some(module) = instances
            .into_iter()
            .find(|m| m.supports_command(&command.command_name))
        {
            debug!("Executing command locally");
            let _timer = CommandTimer::new(&command.module_name, &command.command_name);
            return module
                .invoke(&command.command_name, command.params.clone(), destination)
                .await
                .map_err(|e| self.fail(command, e.into()));
        }

        debug!("Forwarding command");
        self.kind.forward_command(self, command).await
    }

    fn fail(&self, command: &Command, error: RouteError) -> RouteError {
        debug!(command = %command.qualified_name(), error = %error, "Command failed");
        error
    }

    /// True if any class on the route to `destination` declares `command`.
    pub fn supports_command(
        &self,
        module: &str,
        command: &str,
        destination: &CommandDestination,
    ) -> bool {
        self.get_all_module_classes(module, destination)
            .iter()
            .any(|class| class.declares(command))
    }

    pub fn get_all_module_classes(
        &self,
        module: &str,
        destination: &CommandDestination,
    ) -> Vec<Arc<ModuleClass>> {
        self.modules.get_all_module_classes(module, destination)
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Emit an event from this handler. Never fails.
    pub fn emit_event(&self, name: &str, data: Value, options: EventOptions) {
        self.emitter.emit(name, data, options);
    }

    pub fn on<F>(&self, name: &str, listener: F) -> ListenerId
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.emitter.dispatcher().on(name, listener)
    }

    pub fn off(&self, name: &str, id: ListenerId) -> bool {
        self.emitter.dispatcher().off(name, id)
    }

    /// Subscribe to every envelope emitted on or bubbled through this handler.
    pub fn on_event<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on(HANDLER_EVENT, listener)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Hand the items matching this handler's context to its kind.
    ///
    /// Called once by the registry right after construction. Returns how many
    /// items matched.
    pub fn apply_initial_session_data_items(&self, items: &[SessionDataItem]) -> usize {
        let Some(context) = self.context() else {
            return 0;
        };
        let matching = matching::matching_items(items, &context);
        if !matching.is_empty() {
            debug!(handler = %self.name, items = matching.len(), "Applying session data");
        }
        self.kind.apply_initial_session_data_items(self, &matching);
        matching.len()
    }

    /// Tear the handler down. Safe to call more than once.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(handler = %self.name, "Destroying handler");

        let notice = Event {
            name: DESTROYED_EVENT.to_string(),
            data: json!({ "name": self.name }),
            is_protocol_event: false,
            session_id: self.identity.session_id.clone(),
            context: self.emitter.context().clone(),
        };
        self.emitter.dispatcher().emit(DESTROYED_EVENT, &notice);
        self.kind.handler_destroyed(self);
        self.modules.destroy();
        self.emitter.dispatcher().destroy();
        crate::metrics::add_active_handlers(self.handler_type().as_str(), -1);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn identity(&self) -> &HandlerIdentity {
        &self.identity
    }

    pub fn session_id(&self) -> &SessionId {
        &self.identity.session_id
    }

    pub fn handler_type(&self) -> HandlerType {
        self.identity.handler_type
    }

    pub fn context_id(&self) -> &ContextId {
        &self.identity.context_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module_path(&self) -> &'static str {
        self.kind.module_path()
    }

    /// The observed context, if it is still alive.
    pub fn context(&self) -> Option<Arc<Context>> {
        self.context.upgrade()
    }

    pub fn events(&self) -> &Arc<EventsDispatcher> {
        self.emitter.dispatcher()
    }

    pub fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }

    pub fn modules(&self) -> &ModuleCache {
        &self.modules
    }

    /// The session data snapshot this handler was created with.
    pub fn session_data(&self) -> &[SessionDataItem] {
        &self.session_data
    }
}

impl Drop for Handler {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("name", &self.name)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
