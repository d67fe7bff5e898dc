//! Handler registry.
//!
//! One [`Registry`] exists per execution domain. It is the only shared
//! mutable structure of the routing core and guarantees that at most one live
//! handler exists per (session, type, context id).

pub mod matching;

use crate::context::{Context, DomainId};
use crate::error::{RouteError, RouteResult};
use crate::events::DESTROYED_EVENT;
use crate::handler::{Handler, HandlerIdentity, HandlerKinds};
use crate::modules::ModuleRegistry;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use routenet_proto::{ContextDescriptor, ContextId, HandlerType, SessionDataItem, SessionId};
use std::sync::{Arc, Weak};
use tracing::debug;

struct RegistryInner {
    domain: DomainId,
    kinds: HandlerKinds,
    modules: Arc<ModuleRegistry>,
    handlers: DashMap<HandlerIdentity, Arc<Handler>>,
}

/// Creates, deduplicates, finds and forgets the handlers of one domain.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Registry {
    pub fn new(domain: impl Into<DomainId>, kinds: HandlerKinds, modules: Arc<ModuleRegistry>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                domain: domain.into(),
                kinds,
                modules,
                handlers: DashMap::new(),
            }),
        }
    }

    pub fn domain(&self) -> &str {
        &self.inner.domain
    }

    pub fn modules(&self) -> &Arc<ModuleRegistry> {
        &self.inner.modules
    }

    /// Find or create the handler of `handler_type` observing `context`.
    pub fn get_or_create(
        &self,
        session_id: &SessionId,
        handler_type: HandlerType,
        context: &Arc<Context>,
    ) -> RouteResult<Arc<Handler>> {
        self.get_or_create_with(session_id, handler_type, context, &[])
    }

    /// Like [`get_or_create`](Self::get_or_create), handing `session_data` to
    /// the handler if this call creates it.
    ///
    /// Creation runs under the map entry lock, so concurrent callers for the
    /// same identity all receive the same handler and session data is applied
    /// exactly once. Kind hooks must not call back into this registry.
    pub fn get_or_create_with(
        &self,
        session_id: &SessionId,
        handler_type: HandlerType,
        context: &Arc<Context>,
        session_data: &[SessionDataItem],
    ) -> RouteResult<Arc<Handler>> {
        let kind = self
            .inner
            .kinds
            .get(handler_type)
            .ok_or(RouteError::UnregisteredHandlerType(handler_type))?;
        let identity = HandlerIdentity::new(session_id.clone(), handler_type, kind.context_id(context));

        match self.inner.handlers.entry(identity) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let handler = Arc::new(Handler::new(
                    entry.key().clone(),
                    kind,
                    context,
                    Arc::clone(&self.inner.modules),
                    session_data.to_vec(),
                ));
                handler.apply_initial_session_data_items(session_data);
                self.detach_on_destroy(&handler);
                debug!(domain = %self.inner.domain, handler = %handler.name(), "Handler created");
                entry.insert(Arc::clone(&handler));
                Ok(handler)
            }
        }
    }

    fn detach_on_destroy(&self, handler: &Arc<Handler>) {
        let registry: Weak<RegistryInner> = Arc::downgrade(&self.inner);
        let weak_handler = Arc::downgrade(handler);
        handler.on(DESTROYED_EVENT, move |_| {
            if let (Some(inner), Some(handler)) = (registry.upgrade(), weak_handler.upgrade()) {
                Registry { inner }.remove(&handler);
            }
            Ok(())
        });
    }

    pub fn get(
        &self,
        session_id: &SessionId,
        handler_type: HandlerType,
        context_id: &ContextId,
    ) -> Option<Arc<Handler>> {
        let identity = HandlerIdentity::new(session_id.clone(), handler_type, context_id.clone());
        self.get_by_identity(&identity)
    }

    pub fn get_by_identity(&self, identity: &HandlerIdentity) -> Option<Arc<Handler>> {
        self.inner.handlers.get(identity).map(|h| Arc::clone(h.value()))
    }

    /// Forget `handler`. A different handler registered under the same
    /// identity is left alone.
    pub fn remove(&self, handler: &Arc<Handler>) -> bool {
        let removed = self
            .inner
            .handlers
            .remove_if(handler.identity(), |_, existing| Arc::ptr_eq(existing, handler))
            .is_some();
        if removed {
            debug!(domain = %self.inner.domain, handler = %handler.name(), "Handler removed");
        }
        removed
    }

    pub fn match_context(&self, descriptor: &ContextDescriptor, context: &Context) -> bool {
        matching::match_context(descriptor, context)
    }

    /// Snapshot of the live handlers.
    pub fn handlers(&self) -> Vec<Arc<Handler>> {
        self.inner
            .handlers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.handlers.is_empty()
    }

    /// Destroy every handler observing the given context.
    pub fn destroy_context(&self, handler_type: HandlerType, context_id: &str) -> usize {
        self.destroy_where(|id| id.handler_type == handler_type && id.context_id.as_str() == context_id)
    }

    /// Destroy every handler of a session.
    pub fn destroy_session(&self, session_id: &SessionId) -> usize {
        self.destroy_where(|id| &id.session_id == session_id)
    }

    /// Destroy every handler.
    pub fn shutdown(&self) -> usize {
        self.destroy_where(|_| true)
    }

    fn destroy_where(&self, predicate: impl Fn(&HandlerIdentity) -> bool) -> usize {
        // Collected first: destroy notifications re-enter the map.
        let doomed: Vec<Arc<Handler>> = self
            .inner
            .handlers
            .iter()
            .filter(|entry| predicate(entry.key()))
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for handler in &doomed {
            handler.destroy();
        }
        doomed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::LeafKind;
    use routenet_proto::SessionDataItem;
    use serde_json::json;

    fn registry() -> Registry {
        let kinds = HandlerKinds::new().with(Arc::new(LeafKind));
        Registry::new("p1/main", kinds, Arc::new(ModuleRegistry::new()))
    }

    fn leaf(id: &str) -> Arc<Context> {
        Arc::new(Context::new(HandlerType::Leaf, id, Some("p1/main".into()), "p1/main"))
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let registry = registry();
        let ctx = leaf("ctx-42");
        let s1 = SessionId::new("S1");

        let a = registry.get_or_create(&s1, HandlerType::Leaf, &ctx).unwrap();
        let b = registry.get_or_create(&s1, HandlerType::Leaf, &ctx).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);

        let other = registry
            .get_or_create(&SessionId::new("S2"), HandlerType::Leaf, &ctx)
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &other));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_concurrent_creation_yields_one_handler() {
        let registry = registry();
        let ctx = leaf("ctx-42");
        let handlers: Vec<Arc<Handler>> = std::thread::scope(|scope| {
            let joins: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        registry
                            .get_or_create(&SessionId::new("S1"), HandlerType::Leaf, &ctx)
                            .unwrap()
                    })
                })
                .collect();
            joins.into_iter().map(|j| j.join().unwrap()).collect()
        });
        assert!(handlers.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregistered_type_fails() {
        let registry = registry();
        let err = registry
            .get_or_create(&SessionId::new("S1"), HandlerType::Thread, &leaf("x"))
            .unwrap_err();
        assert!(matches!(err, RouteError::UnregisteredHandlerType(HandlerType::Thread)));
    }

    #[test]
    fn test_destroy_detaches_handler() {
        let registry = registry();
        let s1 = SessionId::new("S1");
        let handler = registry.get_or_create(&s1, HandlerType::Leaf, &leaf("ctx-42")).unwrap();

        handler.destroy();
        assert!(registry.get(&s1, HandlerType::Leaf, &"ctx-42".into()).is_none());
        assert!(registry.is_empty());
        assert!(!registry.remove(&handler));
    }

    #[test]
    fn test_remove_checks_instance() {
        let registry = registry();
        let ctx = leaf("ctx-42");
        let s1 = SessionId::new("S1");
        let live = registry.get_or_create(&s1, HandlerType::Leaf, &ctx).unwrap();
        let stranger = Arc::new(Handler::new(
            live.identity().clone(),
            Arc::new(LeafKind),
            &ctx,
            Arc::new(ModuleRegistry::new()),
            Vec::new(),
        ));

        assert!(!registry.remove(&stranger));
        assert!(registry.get(&s1, HandlerType::Leaf, &"ctx-42".into()).is_some());
    }

    #[test]
    fn test_bulk_destroy() {
        let registry = registry();
        let (s1, s2) = (SessionId::new("S1"), SessionId::new("S2"));
        for session in [&s1, &s2] {
            for id in ["ctx-1", "ctx-2"] {
                registry.get_or_create(session, HandlerType::Leaf, &leaf(id)).unwrap();
            }
        }
        assert_eq!(registry.destroy_context(HandlerType::Leaf, "ctx-1"), 2);
        assert_eq!(registry.destroy_session(&s2), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.shutdown(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_session_data_only_applied_on_creation() {
        let registry = registry();
        let ctx = leaf("ctx-42");
        let s1 = SessionId::new("S1");
        let items = vec![SessionDataItem::new("nav", "pref", ContextDescriptor::All, json!(1))];

        let handler = registry.get_or_create_with(&s1, HandlerType::Leaf, &ctx, &items).unwrap();
        let again = registry.get_or_create_with(&s1, HandlerType::Leaf, &ctx, &[]).unwrap();
        assert!(Arc::ptr_eq(&handler, &again));
        assert_eq!(again.session_data(), items.as_slice());
    }

    #[test]
    fn test_match_context() {
        let registry = registry();
        let ctx = leaf("ctx-42");
        assert!(registry.match_context(&ContextDescriptor::All, &ctx));
        assert!(!registry.match_context(
            &ContextDescriptor::SpecificContext { id: "ctx-1".into() },
            &ctx
        ));
    }
}
