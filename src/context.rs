//! Contexts observed by handlers and the tree that owns them.
//!
//! Handlers only keep a weak back-reference to their context; the
//! [`ContextTree`] is the owner. Every context lives in one execution domain,
//! which is where its handlers are created.

use crate::error::{RouteError, RouteResult};
use crate::registry::matching::match_context;
use parking_lot::RwLock;
use routenet_proto::{
    CommandDestination, ContextDescriptor, ContextId, ContextInfo, DestinationTarget, HandlerType,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Name of an execution domain.
pub type DomainId = String;

/// Domain of the session roots, local to the external caller.
pub const ROOT_DOMAIN: &str = "root";

/// A concrete part of the running application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    pub handler_type: HandlerType,
    pub id: String,
    /// Id of the enclosing context, one level up. `None` only for the root.
    pub parent: Option<String>,
    pub domain: DomainId,
}

impl Context {
    pub fn new(
        handler_type: HandlerType,
        id: impl Into<String>,
        parent: Option<String>,
        domain: impl Into<DomainId>,
    ) -> Self {
        Self {
            handler_type,
            id: id.into(),
            parent,
            domain: domain.into(),
        }
    }

    /// The single root context.
    pub fn root() -> Self {
        Self::new(HandlerType::Root, ContextId::ROOT, None, ROOT_DOMAIN)
    }

    pub fn info(&self) -> ContextInfo {
        ContextInfo::new(self.handler_type, self.id.as_str())
    }
}

/// Owner of every known context, keyed by type and id.
pub struct ContextTree {
    contexts: RwLock<BTreeMap<(HandlerType, String), Arc<Context>>>,
}

impl Default for ContextTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextTree {
    /// A tree holding only the root context.
    pub fn new() -> Self {
        let root = Context::root();
        let mut contexts = BTreeMap::new();
        contexts.insert((root.handler_type, root.id.clone()), Arc::new(root));
        Self {
            contexts: RwLock::new(contexts),
        }
    }

    pub fn root(&self) -> Arc<Context> {
        self.get(HandlerType::Root, ContextId::ROOT)
            .unwrap_or_else(|| Arc::new(Context::root()))
    }

    /// Insert a context below an existing parent of the level above.
    ///
    /// Re-inserting an existing key replaces the context.
    pub fn insert(&self, context: Context) -> RouteResult<Arc<Context>> {
        let Some(parent_type) = context.handler_type.parent() else {
            return Ok(self.root());
        };
        let parent_id = context
            .parent
            .as_deref()
            .ok_or_else(|| RouteError::unknown_context(parent_type, "<none>"))?;

        let mut contexts = self.contexts.write();
        if !contexts.contains_key(&(parent_type, parent_id.to_string())) {
            return Err(RouteError::unknown_context(parent_type, parent_id));
        }
        let context = Arc::new(context);
        contexts.insert(
            (context.handler_type, context.id.clone()),
            Arc::clone(&context),
        );
        Ok(context)
    }

    /// Remove a context and everything below it.
    ///
    /// Returns the removed contexts, outermost first. The root cannot be
    /// removed.
    pub fn remove(&self, handler_type: HandlerType, id: &str) -> Vec<Arc<Context>> {
        if handler_type == HandlerType::Root {
            return Vec::new();
        }
        let mut contexts = self.contexts.write();
        let Some(top) = contexts.remove(&(handler_type, id.to_string())) else {
            return Vec::new();
        };

        let mut removed = vec![top];
        let mut level = 0;
        while level < removed.len() {
            let parent = Arc::clone(&removed[level]);
            level += 1;
            let Some(child_type) = parent.handler_type.child() else {
                continue;
            };
            let children: Vec<(HandlerType, String)> = contexts
                .range((child_type, String::new())..)
                .take_while(|((ty, _), _)| *ty == child_type)
                .filter(|(_, ctx)| ctx.parent.as_deref() == Some(parent.id.as_str()))
                .map(|(key, _)| key.clone())
                .collect();
            for key in children {
                if let Some(child) = contexts.remove(&key) {
                    removed.push(child);
                }
            }
        }
        removed
    }

    pub fn get(&self, handler_type: HandlerType, id: &str) -> Option<Arc<Context>> {
        self.contexts
            .read()
            .get(&(handler_type, id.to_string()))
            .cloned()
    }

    /// All contexts of one type, in id order.
    pub fn contexts_of(&self, handler_type: HandlerType) -> Vec<Arc<Context>> {
        self.contexts
            .read()
            .range((handler_type, String::new())..)
            .take_while(|((ty, _), _)| *ty == handler_type)
            .map(|(_, ctx)| Arc::clone(ctx))
            .collect()
    }

    /// Contexts of one type satisfying a descriptor.
    pub fn matching(
        &self,
        handler_type: HandlerType,
        descriptor: &ContextDescriptor,
    ) -> Vec<Arc<Context>> {
        self.contexts_of(handler_type)
            .into_iter()
            .filter(|ctx| match_context(descriptor, ctx))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.contexts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The enclosing context of `context` at `level`, or `context` itself.
    pub fn ancestor(&self, context: &Arc<Context>, level: HandlerType) -> Option<Arc<Context>> {
        if !level.contains(context.handler_type) {
            return None;
        }
        let mut current = Arc::clone(context);
        while current.handler_type != level {
            let parent_type = current.handler_type.parent()?;
            let parent_id = current.parent.as_deref()?;
            current = self.get(parent_type, parent_id)?;
        }
        Some(current)
    }

    /// True when `context` is `ancestor` or lies below it.
    pub fn is_within(&self, context: &Arc<Context>, ancestor: &Context) -> bool {
        self.ancestor(context, ancestor.handler_type)
            .is_some_and(|found| found.id == ancestor.id)
    }

    /// Contexts one level below `from` on the way to `destination`.
    ///
    /// A specific destination yields a single hop. A descriptor yields one hop
    /// per distinct intermediate context with at least one matching
    /// destination below it, possibly none.
    pub fn next_hops(
        &self,
        from: &Context,
        destination: &CommandDestination,
    ) -> RouteResult<Vec<Arc<Context>>> {
        let unreachable =
            || RouteError::unreachable(format!("{}({})", from.handler_type, from.id), destination);
        let hop_type = from
            .handler_type
            .next_toward(destination.handler_type())
            .ok_or_else(unreachable)?;

        let targets = match destination.target() {
            DestinationTarget::Id(id) => {
                let target = self
                    .get(destination.handler_type(), id)
                    .ok_or_else(unreachable)?;
                if !self.is_within(&target, from) {
                    return Err(unreachable());
                }
                vec![target]
            }
            DestinationTarget::Descriptor(descriptor) => self
                .matching(destination.handler_type(), descriptor)
                .into_iter()
                .filter(|ctx| self.is_within(ctx, from))
                .collect(),
        };

        let mut seen = HashSet::new();
        let mut hops = Vec::new();
        for target in targets {
            let Some(hop) = self.ancestor(&target, hop_type) else {
                continue;
            };
            if seen.insert(hop.id.clone()) {
                hops.push(hop);
            }
        }
        if hops.is_empty() && destination.id().is_some() {
            return Err(unreachable());
        }
        Ok(hops)
    }
}
