use super::{Domain, DomainDirectory, DomainHandle};
use crate::config::Config;
use crate::context::{Context, ContextTree, ROOT_DOMAIN};
use crate::error::{RouteError, RouteResult};
use crate::handler::{Handler, HandlerKinds};
use crate::modules::ModuleRegistry;
use crate::registry::Registry;
use crate::session::SessionStore;
use crate::transport::DomainConnector;
use routenet_proto::{Command, ContextId, HandlerType, SessionId};
use std::sync::Arc;
use tracing::{debug, info};

/// Composition root of a routing network.
///
/// Owns the context tree, the module registry, the session data store, the
/// directory of running domains, and the registry of session roots, which
/// lives in the caller's own domain.
pub struct Network {
    tree: Arc<ContextTree>,
    directory: DomainDirectory,
    modules: Arc<ModuleRegistry>,
    sessions: Arc<SessionStore>,
    root: Registry,
    inbox_capacity: usize,
}

impl Network {
    /// Requests buffered per domain when no capacity is given.
    pub const DEFAULT_INBOX_CAPACITY: usize = 256;

    pub fn new(modules: ModuleRegistry) -> Self {
        Self::with_inbox_capacity(modules, Self::DEFAULT_INBOX_CAPACITY)
    }

    pub fn with_inbox_capacity(modules: ModuleRegistry, inbox_capacity: usize) -> Self {
        let tree = Arc::new(ContextTree::new());
        let directory = DomainDirectory::new();
        let modules = Arc::new(modules);
        let sessions = Arc::new(SessionStore::new());

        let connector = DomainConnector::new(Arc::clone(&tree), directory.clone())
            .with_session_store(Arc::clone(&sessions));
        let root = Registry::new(
            ROOT_DOMAIN,
            HandlerKinds::standard(Arc::new(connector)),
            Arc::clone(&modules),
        );

        Self {
            tree,
            directory,
            modules,
            sessions,
            root,
            inbox_capacity,
        }
    }

    /// Build a network and its topology from configuration.
    ///
    /// Must run inside a tokio runtime.
    pub fn from_config(config: &Config, modules: ModuleRegistry) -> RouteResult<Self> {
        let network = Self::with_inbox_capacity(modules, config.domains.inbox_capacity);
        for process in &config.processes {
            network.add_process(&process.id)?;
            for thread in &process.threads {
                let thread_context = network.add_thread(&process.id, &thread.id)?;
                for leaf in &thread.leaves {
                    network.add_leaf(&thread_context.id, leaf)?;
                }
            }
        }
        info!(
            contexts = network.tree.len(),
            domains = network.directory.len(),
            "Topology loaded"
        );
        Ok(network)
    }

    // ========================================================================
    // Topology
    // ========================================================================

    /// Start (or replace) the domain `id`.
    ///
    /// A replacement is published before the old domain is killed, so a
    /// parent retrying after the kill always finds a running domain.
    pub fn spawn_domain(&self, id: &str) -> DomainHandle {
        let connector = DomainConnector::new(Arc::clone(&self.tree), self.directory.clone());
        let registry = Registry::new(
            id,
            HandlerKinds::standard(Arc::new(connector)),
            Arc::clone(&self.modules),
        );
        let handle = Domain::spawn(id, registry, Arc::clone(&self.tree), self.inbox_capacity);
        if let Some(previous) = self.directory.insert(handle.clone()) {
            previous.kill();
        }
        handle
    }

    /// Kill a domain. Commands in flight there fail with a transport abort.
    pub fn kill_domain(&self, id: &str) -> bool {
        match self.directory.remove(id) {
            Some(handle) => {
                info!(domain = %id, "Killing execution domain");
                handle.kill();
                true
            }
            None => false,
        }
    }

    /// Replace a domain with a fresh one. Its contexts stay in the tree;
    /// handlers are recreated on demand.
    pub fn restart_domain(&self, id: &str) -> DomainHandle {
        info!(domain = %id, "Restarting execution domain");
        self.spawn_domain(id)
    }

    /// Add a context whose domain is already running.
    pub fn add_context(&self, context: Context) -> RouteResult<Arc<Context>> {
        if context.domain != ROOT_DOMAIN && self.directory.get(&context.domain).is_none() {
            return Err(RouteError::DomainUnavailable(context.domain));
        }
        debug!(context = %context.id, kind = %context.handler_type, domain = %context.domain, "Context added");
        self.tree.insert(context)
    }

    /// Add a process context running in its own domain.
    pub fn add_process(&self, id: &str) -> RouteResult<Arc<Context>> {
        if self.directory.get(id).is_none() {
            self.spawn_domain(id);
        }
        self.add_context(Context::new(
            HandlerType::Process,
            id,
            Some(ContextId::ROOT.to_string()),
            id,
        ))
    }

    /// Add a thread of `process`. Its context and domain id is `process/thread`.
    pub fn add_thread(&self, process: &str, thread: &str) -> RouteResult<Arc<Context>> {
        if self.tree.get(HandlerType::Process, process).is_none() {
            return Err(RouteError::unknown_context(HandlerType::Process, process));
        }
        let id = format!("{process}/{thread}");
        if self.directory.get(&id).is_none() {
            self.spawn_domain(&id);
        }
        self.add_context(Context::new(
            HandlerType::Thread,
            id.as_str(),
            Some(process.to_string()),
            id.as_str(),
        ))
    }

    /// Add a leaf context hosted by the thread `thread_id`.
    pub fn add_leaf(&self, thread_id: &str, id: &str) -> RouteResult<Arc<Context>> {
        let thread = self
            .tree
            .get(HandlerType::Thread, thread_id)
            .ok_or_else(|| RouteError::unknown_context(HandlerType::Thread, thread_id))?;
        self.add_context(Context::new(
            HandlerType::Leaf,
            id,
            Some(thread_id.to_string()),
            thread.domain.as_str(),
        ))
    }

    /// Remove a context and everything below it, destroying their handlers.
    ///
    /// Domains owned by removed processes and threads are killed. Returns the
    /// number of contexts removed.
    pub async fn remove_context(&self, handler_type: HandlerType, id: &str) -> usize {
        let removed = self.tree.remove(handler_type, id);
        for context in &removed {
            match context.handler_type {
                HandlerType::Process | HandlerType::Thread if context.domain == context.id => {
                    self.kill_domain(&context.domain);
                }
                _ => {
                    if let Some(handle) = self.directory.get(&context.domain) {
                        // A killed domain has nothing left to destroy.
                        let _ = handle.destroy_context(context.handler_type, &context.id).await;
                    }
                }
            }
        }
        removed.len()
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// The root handler of a session, created on first use.
    pub fn session(&self, session_id: impl Into<SessionId>) -> RouteResult<Arc<Handler>> {
        let session_id = session_id.into();
        let items = self.sessions.items(&session_id);
        self.root
            .get_or_create_with(&session_id, HandlerType::Root, &self.tree.root(), &items)
    }

    /// Route `command` from the root of `session_id`.
    pub async fn handle_command(
        &self,
        session_id: impl Into<SessionId>,
        command: &Command,
    ) -> RouteResult {
        self.session(session_id)?.handle_command(command).await
    }

    /// Destroy every handler of a session in every domain.
    pub async fn end_session(&self, session_id: &SessionId) -> usize {
        let mut destroyed = self.root.destroy_session(session_id);
        for handle in self.directory.handles() {
            destroyed += handle.end_session(session_id.clone()).await.unwrap_or(0);
        }
        self.sessions.clear(session_id);
        info!(session = %session_id, destroyed, "Session ended");
        destroyed
    }

    /// Session data handed to handlers created from now on.
    pub fn session_data(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The registry of a domain; `root` is the registry of session roots.
    pub fn registry(&self, domain: &str) -> Option<Registry> {
        if domain == ROOT_DOMAIN {
            Some(self.root.clone())
        } else {
            self.directory.get(domain).map(|h| h.registry().clone())
        }
    }

    pub fn tree(&self) -> &Arc<ContextTree> {
        &self.tree
    }

    pub fn domains(&self) -> &DomainDirectory {
        &self.directory
    }

    pub fn modules(&self) -> &Arc<ModuleRegistry> {
        &self.modules
    }

    /// Destroy the session roots and stop every domain.
    pub async fn shutdown(&self) {
        let roots = self.root.shutdown();
        let handles = self.directory.handles();
        for handle in &handles {
            handle.shutdown().await;
        }
        info!(roots, domains = handles.len(), "Network shut down");
    }
}
