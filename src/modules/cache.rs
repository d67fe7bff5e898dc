//! Per-handler module instance cache.

use super::{Module, ModuleClass, ModuleContext, ModuleRegistry, ModuleScope};
use parking_lot::Mutex;
use routenet_proto::{CommandDestination, DestinationTarget, HandlerType};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Instances keyed by (class slot, scope key).
type InstanceMap = HashMap<(usize, String), Arc<dyn Module>>;

/// Lazily built module instances owned by one handler.
pub struct ModuleCache {
    registry: Arc<ModuleRegistry>,
    handler_type: HandlerType,
    context: ModuleContext,
    instances: Mutex<InstanceMap>,
    destroyed: AtomicBool,
}

impl ModuleCache {
    pub fn new(registry: Arc<ModuleRegistry>, context: ModuleContext) -> Self {
        Self {
            registry,
            handler_type: context.handler_type(),
            context,
            instances: Mutex::new(HashMap::new()),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Every class that could serve `module` for `destination` somewhere on
    /// the route from this handler down to the destination.
    ///
    /// Classes hosted at the destination level come first, this handler's own
    /// level last. Nothing is instantiated.
    pub fn get_all_module_classes(
        &self,
        module: &str,
        destination: &CommandDestination,
    ) -> Vec<Arc<ModuleClass>> {
        let dest_type = destination.handler_type();
        if !self.handler_type.contains(dest_type) {
            return Vec::new();
        }
        (self.handler_type.depth()..=dest_type.depth())
            .rev()
            .flat_map(|depth| {
                self.registry
                    .classes_for(module, HandlerType::ALL[depth], dest_type)
            })
            .collect()
    }

    /// The first local instance for `module` and `destination`, if any class
    /// is hosted at this level.
    pub fn get_module_instance(
        &self,
        module: &str,
        destination: &CommandDestination,
    ) -> Option<Arc<dyn Module>> {
        self.registry
            .classes_for(module, self.handler_type, destination.handler_type())
            .first()
            .and_then(|class| self.instance_for(class, destination))
    }

    /// Every local instance for `module` and `destination`, in registration
    /// order of their classes.
    pub fn get_module_instances(
        &self,
        module: &str,
        destination: &CommandDestination,
    ) -> Vec<Arc<dyn Module>> {
        self.registry
            .classes_for(module, self.handler_type, destination.handler_type())
            .iter()
            .filter_map(|class| self.instance_for(class, destination))
            .collect()
    }

    /// Number of live instances.
    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Destroy and forget every instance. Later lookups return nothing.
    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
        let instances: Vec<_> = self.instances.lock().drain().map(|(_, m)| m).collect();
        for instance in instances {
            instance.destroy();
        }
    }

    fn instance_for(
        &self,
        class: &ModuleClass,
        destination: &CommandDestination,
    ) -> Option<Arc<dyn Module>> {
        if self.destroyed.load(Ordering::Acquire) {
            return None;
        }
        let key = (class.slot(), self.scope_key(class, destination));
        if let Some(existing) = self.instances.lock().get(&key) {
            return Some(Arc::clone(existing));
        }

        // Factories run unlocked; a concurrent loser is dropped unused.
        let created = class.instantiate(self.context.clone());
        let mut instances = self.instances.lock();
        Some(Arc::clone(instances.entry(key).or_insert(created)))
    }

    fn scope_key(&self, class: &ModuleClass, destination: &CommandDestination) -> String {
        match class.instance_scope() {
            ModuleScope::Shared => String::new(),
            ModuleScope::PerContext => match destination.target() {
                DestinationTarget::Id(id) => id.clone(),
                DestinationTarget::Descriptor(_)
                    if destination.handler_type() == self.handler_type =>
                {
                    self.context.context_id().to_string()
                }
                DestinationTarget::Descriptor(descriptor) => descriptor.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventEmitter, EventsDispatcher};
    use crate::modules::ModuleError;
    use async_trait::async_trait;
    use routenet_proto::{ContextDescriptor, ContextInfo, SessionId};
    use serde_json::{Value, json};
    use std::sync::atomic::AtomicUsize;

    struct Counter {
        destroyed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Module for Counter {
        fn supports_command(&self, command: &str) -> bool {
            command == "counter"
        }

        async fn invoke(
            &self,
            _command: &str,
            _params: Value,
            _destination: &CommandDestination,
        ) -> Result<Value, ModuleError> {
            Ok(json!(true))
        }

        fn destroy(&self) {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Fixture {
        cache: ModuleCache,
        created: Arc<AtomicUsize>,
        destroyed: Arc<AtomicUsize>,
    }

    fn fixture(handler_type: HandlerType, scope: ModuleScope) -> Fixture {
        let created = Arc::new(AtomicUsize::new(0));
        let destroyed = Arc::new(AtomicUsize::new(0));
        let mut registry = ModuleRegistry::new();
        for host in [HandlerType::Root, HandlerType::Thread, HandlerType::Leaf] {
            let created = Arc::clone(&created);
            let destroyed = Arc::clone(&destroyed);
            registry.register(
                ModuleClass::new("counter", host, HandlerType::Leaf, move |_| {
                    created.fetch_add(1, Ordering::SeqCst);
                    Arc::new(Counter {
                        destroyed: Arc::clone(&destroyed),
                    }) as Arc<dyn Module>
                })
                .commands(["counter"])
                .scope(scope),
            );
        }
        let emitter = EventEmitter::new(
            Arc::new(EventsDispatcher::new()),
            SessionId::new("S1"),
            ContextInfo::new(handler_type, "ctx-1"),
        );
        let ctx = ModuleContext::new(handler_type, "ctx-1".into(), emitter, Arc::from(Vec::new()));
        Fixture {
            cache: ModuleCache::new(Arc::new(registry), ctx),
            created,
            destroyed,
        }
    }

    #[test]
    fn test_classes_listed_destination_first() {
        let f = fixture(HandlerType::Root, ModuleScope::Shared);
        let dest = CommandDestination::context(HandlerType::Leaf, "ctx-1");
        let hosts: Vec<HandlerType> = f
            .cache
            .get_all_module_classes("counter", &dest)
            .iter()
            .map(|c| c.host())
            .collect();
        assert_eq!(hosts, vec![HandlerType::Leaf, HandlerType::Thread, HandlerType::Root]);
        assert_eq!(f.created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_no_classes_above_handler() {
        let f = fixture(HandlerType::Leaf, ModuleScope::Shared);
        let dest = CommandDestination::context(HandlerType::Thread, "t");
        assert!(f.cache.get_all_module_classes("counter", &dest).is_empty());
    }

    #[test]
    fn test_shared_instance_is_reused() {
        let f = fixture(HandlerType::Leaf, ModuleScope::Shared);
        let a = CommandDestination::context(HandlerType::Leaf, "ctx-1");
        let b = CommandDestination::context(HandlerType::Leaf, "ctx-2");
        let first = f.cache.get_module_instance("counter", &a).unwrap();
        let second = f.cache.get_module_instance("counter", &b).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(f.created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_per_context_instances_are_distinct() {
        let f = fixture(HandlerType::Root, ModuleScope::PerContext);
        let a = CommandDestination::context(HandlerType::Leaf, "ctx-1");
        let b = CommandDestination::context(HandlerType::Leaf, "ctx-2");
        let all = CommandDestination::broadcast(HandlerType::Leaf, ContextDescriptor::All);

        let first = f.cache.get_module_instance("counter", &a).unwrap();
        let again = f.cache.get_module_instance("counter", &a).unwrap();
        let other = f.cache.get_module_instance("counter", &b).unwrap();
        f.cache.get_module_instance("counter", &all).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(f.cache.len(), 3);
    }

    #[test]
    fn test_destroy_releases_instances() {
        let f = fixture(HandlerType::Leaf, ModuleScope::Shared);
        let dest = CommandDestination::context(HandlerType::Leaf, "ctx-1");
        assert_eq!(f.cache.get_module_instances("counter", &dest).len(), 1);

        f.cache.destroy();
        assert_eq!(f.destroyed.load(Ordering::SeqCst), 1);
        assert!(f.cache.is_empty());
        assert!(f.cache.get_module_instance("counter", &dest).is_none());
    }
}
