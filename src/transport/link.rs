use super::Transport;
use crate::context::Context;
use crate::domain::DomainHandle;
use crate::error::RouteResult;
use crate::events::EventEmitter;
use crate::handler::HandlerIdentity;
use async_trait::async_trait;
use routenet_proto::{Command, SessionDataItem};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Link from a parent handler to a child handler living in an execution
/// domain.
///
/// Commands travel as domain requests; the child's envelopes come back over
/// an unbounded channel and are re-emitted on the parent in arrival order.
pub struct DomainLink {
    identity: HandlerIdentity,
    domain: DomainHandle,
    closed: Arc<AtomicBool>,
    pump: JoinHandle<()>,
}

impl DomainLink {
    /// Attach to (creating if needed) the child observing `hop` in `domain`.
    pub async fn attach(
        domain: DomainHandle,
        parent: EventEmitter,
        hop: &Context,
        session_data: Vec<SessionDataItem>,
    ) -> RouteResult<Self> {
        let (upstream, mut events) = mpsc::unbounded_channel();
        let identity = domain
            .attach(
                parent.session_id().clone(),
                hop.handler_type,
                hop.id.clone(),
                session_data,
                upstream,
            )
            .await?;
        debug!(child = %identity, domain = %domain.id(), "Link attached");

        let closed = Arc::new(AtomicBool::new(false));
        let pump = tokio::spawn({
            let closed = Arc::clone(&closed);
            async move {
                while let Some(event) = events.recv().await {
                    parent.forward(&event);
                }
                // The child is gone or has been re-attached elsewhere.
                closed.store(true, Ordering::Release);
            }
        });

        Ok(Self {
            identity,
            domain,
            closed,
            pump,
        })
    }

    /// Identity of the child handler.
    pub fn identity(&self) -> &HandlerIdentity {
        &self.identity
    }
}

#[async_trait]
impl Transport for DomainLink {
    async fn send_command(&self, command: Command) -> RouteResult {
        self.domain.command(self.identity.clone(), command).await
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.domain.is_closed()
    }
}

impl Drop for DomainLink {
    fn drop(&mut self) {
        self.pump.abort();
    }
}
