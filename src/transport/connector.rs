use super::{Connector, DomainLink, Transport};
use crate::context::{Context, ContextTree};
use crate::domain::DomainDirectory;
use crate::error::{RouteError, RouteResult};
use crate::handler::{Handler, HandlerIdentity};
use crate::session::SessionStore;
use async_trait::async_trait;
use dashmap::DashMap;
use routenet_proto::{CommandDestination, ContextInfo};
use std::sync::Arc;
use tracing::debug;

/// Connector reaching child handlers through execution domain actors.
///
/// Links are cached per (parent, child) and re-attached once closed. The
/// session data handed to new children comes from the live session store when
/// one is configured (the root domain), otherwise from the parent's own
/// snapshot.
pub struct DomainConnector {
    tree: Arc<ContextTree>,
    directory: DomainDirectory,
    sessions: Option<Arc<SessionStore>>,
    links: DashMap<(HandlerIdentity, ContextInfo), Arc<DomainLink>>,
}

impl DomainConnector {
    pub fn new(tree: Arc<ContextTree>, directory: DomainDirectory) -> Self {
        Self {
            tree,
            directory,
            sessions: None,
            links: DashMap::new(),
        }
    }

    pub fn with_session_store(mut self, sessions: Arc<SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Number of cached links.
    pub fn link_count(&self) -> usize {
        self.links.len()
    }
}

#[async_trait]
impl Connector for DomainConnector {
    fn next_hops(
        &self,
        handler: &Handler,
        destination: &CommandDestination,
    ) -> RouteResult<Vec<Arc<Context>>> {
        let context = handler
            .context()
            .ok_or_else(|| RouteError::unreachable(handler.name(), destination))?;
        self.tree.next_hops(&context, destination)
    }

    async fn connect(&self, handler: &Handler, hop: &Arc<Context>) -> RouteResult<Arc<dyn Transport>> {
        let key = (handler.identity().clone(), hop.info());
        let cached = self.links.get(&key).map(|link| Arc::clone(link.value()));
        if let Some(link) = cached {
            if !link.is_closed() {
                return Ok(link as Arc<dyn Transport>);
            }
            debug!(hop = %hop.id, "Cached link closed, re-attaching");
        }

        let domain = self
            .directory
            .get(&hop.domain)
            .ok_or_else(|| RouteError::DomainUnavailable(hop.domain.clone()))?;
        let session_data = match &self.sessions {
            Some(store) => store.items(handler.session_id()),
            None => handler.session_data().to_vec(),
        };
        let link = Arc::new(
            DomainLink::attach(domain, handler.emitter().clone(), hop, session_data).await?,
        );
        self.links.insert(key, Arc::clone(&link));
        Ok(link as Arc<dyn Transport>)
    }

    fn invalidate(&self, handler: &Handler, hop: &Context) {
        self.links.remove(&(handler.identity().clone(), hop.info()));
    }

    fn release(&self, handler: &Handler) {
        self.links.retain(|(owner, _), _| owner != handler.identity());
    }
}
