//! Execution domains.
//!
//! A domain stands in for one process or thread of the observed application.
//! It is an actor task owning that domain's [`Registry`]: requests arrive on an
//! mpsc inbox and are answered over oneshot channels. Killing a domain drops
//! every pending reply, which callers observe as a transport abort.

mod network;

pub use network::Network;

use crate::context::{ContextTree, DomainId};
use crate::error::{RouteError, RouteResult};
use crate::events::{HANDLER_EVENT, ListenerId};
use crate::handler::{Handler, HandlerIdentity};
use crate::registry::Registry;
use crate::telemetry::spans;
use dashmap::DashMap;
use routenet_proto::{Command, Event, HandlerType, SessionDataItem, SessionId};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

/// Requests accepted by a domain actor.
pub enum DomainRequest {
    /// Find or create a handler and stream its envelopes to `upstream`.
    Attach {
        session_id: SessionId,
        handler_type: HandlerType,
        context_id: String,
        session_data: Vec<SessionDataItem>,
        upstream: mpsc::UnboundedSender<Event>,
        reply_tx: oneshot::Sender<RouteResult<HandlerIdentity>>,
    },
    /// Run a command on an attached handler.
    Command {
        identity: HandlerIdentity,
        command: Command,
        reply_tx: oneshot::Sender<RouteResult>,
    },
    /// Destroy the handlers observing a context.
    DestroyContext {
        handler_type: HandlerType,
        context_id: String,
        reply_tx: oneshot::Sender<usize>,
    },
    /// Destroy the handlers of a session.
    EndSession {
        session_id: SessionId,
        reply_tx: oneshot::Sender<usize>,
    },
    /// Stop after in-flight commands complete.
    Shutdown,
}

/// Cloneable address of a running domain.
#[derive(Clone)]
pub struct DomainHandle {
    id: DomainId,
    tx: mpsc::Sender<DomainRequest>,
    token: CancellationToken,
    registry: Registry,
}

impl DomainHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The domain's registry, for inspection.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled() || self.tx.is_closed()
    }

    /// Stop the domain immediately, aborting in-flight commands.
    pub fn kill(&self) {
        self.token.cancel();
    }

    pub async fn attach(
        &self,
        session_id: SessionId,
        handler_type: HandlerType,
        context_id: String,
        session_data: Vec<SessionDataItem>,
        upstream: mpsc::UnboundedSender<Event>,
    ) -> RouteResult<HandlerIdentity> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.request(DomainRequest::Attach {
            session_id,
            handler_type,
            context_id,
            session_data,
            upstream,
            reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.lost())?
    }

    pub async fn command(&self, identity: HandlerIdentity, command: Command) -> RouteResult {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.request(DomainRequest::Command {
            identity,
            command,
            reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.lost())?
    }

    pub async fn destroy_context(&self, handler_type: HandlerType, context_id: &str) -> RouteResult<usize> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.request(DomainRequest::DestroyContext {
            handler_type,
            context_id: context_id.to_string(),
            reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.lost())
    }

    pub async fn end_session(&self, session_id: SessionId) -> RouteResult<usize> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.request(DomainRequest::EndSession {
            session_id,
            reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.lost())
    }

    /// Ask the domain to stop once in-flight commands finish.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(DomainRequest::Shutdown).await;
    }

    async fn request(&self, request: DomainRequest) -> RouteResult<()> {
        if self.token.is_cancelled() {
            return Err(self.lost());
        }
        self.tx.send(request).await.map_err(|_| self.lost())
    }

    fn lost(&self) -> RouteError {
        RouteError::aborted(self.id.as_str(), "execution domain went away")
    }
}

/// Running domains by id.
#[derive(Clone, Default)]
pub struct DomainDirectory {
    domains: Arc<DashMap<DomainId, DomainHandle>>,
}

impl DomainDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle`, returning the handle it replaces.
    pub fn insert(&self, handle: DomainHandle) -> Option<DomainHandle> {
        self.domains.insert(handle.id.clone(), handle)
    }

    pub fn get(&self, id: &str) -> Option<DomainHandle> {
        self.domains.get(id).map(|h| h.value().clone())
    }

    pub fn remove(&self, id: &str) -> Option<DomainHandle> {
        self.domains.remove(id).map(|(_, handle)| handle)
    }

    pub fn handles(&self) -> Vec<DomainHandle> {
        self.domains.iter().map(|h| h.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

/// The actor behind a [`DomainHandle`].
pub struct Domain {
    id: DomainId,
    registry: Registry,
    tree: Arc<ContextTree>,
    inbox: mpsc::Receiver<DomainRequest>,
    token: CancellationToken,
    /// At most one upstream subscription per handler.
    upstreams: HashMap<HandlerIdentity, (Weak<Handler>, ListenerId)>,
    tasks: JoinSet<()>,
}

impl Domain {
    /// Start a domain actor on the current tokio runtime.
    pub fn spawn(
        id: impl Into<DomainId>,
        registry: Registry,
        tree: Arc<ContextTree>,
        inbox_capacity: usize,
    ) -> DomainHandle {
        let id = id.into();
        let (tx, inbox) = mpsc::channel(inbox_capacity.max(1));
        let token = CancellationToken::new();
        let domain = Domain {
            id: id.clone(),
            registry: registry.clone(),
            tree,
            inbox,
            token: token.clone(),
            upstreams: HashMap::new(),
            tasks: JoinSet::new(),
        };
        let span = spans::domain(&id);
        tokio::spawn(domain.run().instrument(span));

        DomainHandle {
            id,
            tx,
            token,
            registry,
        }
    }

    async fn run(mut self) {
        info!("Execution domain started");
        let mut graceful = false;

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    warn!(in_flight = self.tasks.len(), "Execution domain killed");
                    break;
                }
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if let Err(e) = joined
                        && e.is_panic()
                    {
                        error!(error = %e, "Command task panicked");
                    }
                }
                request = self.inbox.recv() => match request {
                    Some(DomainRequest::Shutdown) | None => {
                        graceful = true;
                        break;
                    }
                    Some(request) => self.handle(request),
                },
            }
        }

        if graceful {
            while self.tasks.join_next().await.is_some() {}
        } else {
            // Dropping the tasks drops their reply senders.
            self.tasks.shutdown().await;
        }
        self.token.cancel();
        let destroyed = self.registry.shutdown();
        info!(handlers = destroyed, "Execution domain stopped");
    }

    fn handle(&mut self, request: DomainRequest) {
        match request {
            DomainRequest::Attach {
                session_id,
                handler_type,
                context_id,
                session_data,
                upstream,
                reply_tx,
            } => {
                let result = self.attach(&session_id, handler_type, &context_id, &session_data, upstream);
                let _ = reply_tx.send(result);
            }
            DomainRequest::Command {
                identity,
                command,
                reply_tx,
            } => match self.registry.get_by_identity(&identity) {
                Some(handler) => {
                    self.tasks.spawn(
                        async move {
                            let result = handler.handle_command(&command).await;
                            let _ = reply_tx.send(result);
                        }
                        .in_current_span(),
                    );
                }
                None => {
                    let _ = reply_tx.send(Err(RouteError::aborted(identity.name(), "handler is gone")));
                }
            },
            DomainRequest::DestroyContext {
                handler_type,
                context_id,
                reply_tx,
            } => {
                let destroyed = self.registry.destroy_context(handler_type, &context_id);
                debug!(context = %context_id, destroyed, "Context handlers destroyed");
                let _ = reply_tx.send(destroyed);
            }
            DomainRequest::EndSession {
                session_id,
                reply_tx,
            } => {
                let destroyed = self.registry.destroy_session(&session_id);
                let _ = reply_tx.send(destroyed);
            }
            // Handled by the run loop.
            DomainRequest::Shutdown => {}
        }
    }

    fn attach(
        &mut self,
        session_id: &SessionId,
        handler_type: HandlerType,
        context_id: &str,
        session_data: &[SessionDataItem],
        upstream: mpsc::UnboundedSender<Event>,
    ) -> RouteResult<HandlerIdentity> {
        let context = self
            .tree
            .get(handler_type, context_id)
            .ok_or_else(|| RouteError::unknown_context(handler_type, context_id))?;
        let handler = self
            .registry
            .get_or_create_with(session_id, handler_type, &context, session_data)?;

        let listener = handler.on_event(move |event| {
            upstream
                .send(event.clone())
                .map_err(|_| anyhow::anyhow!("upstream link closed"))
        });

        self.upstreams.retain(|_, (owner, _)| owner.strong_count() > 0);
        let identity = handler.identity().clone();
        if let Some((previous, id)) = self
            .upstreams
            .insert(identity.clone(), (Arc::downgrade(&handler), listener))
            && let Some(previous) = previous.upgrade()
        {
            previous.off(HANDLER_EVENT, id);
        }
        debug!(handler = %identity, "Handler attached");
        Ok(identity)
    }
}
