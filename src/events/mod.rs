//! Per-handler publish/subscribe.
//!
//! An [`EventsDispatcher`] delivers events synchronously to the listeners
//! registered for a name. Bubbling toward the session root is not a feature of
//! the dispatcher: a parent subscribes to [`HANDLER_EVENT`] on its child and
//! re-emits what it sees through [`EventEmitter::forward`].

use parking_lot::Mutex;
use routenet_proto::{ContextInfo, Event, EventOptions, SessionId};
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::warn;

/// Channel every envelope emitted on a handler is published on.
pub const HANDLER_EVENT: &str = "message-handler-event";

/// Emitted once when a handler is destroyed.
pub const DESTROYED_EVENT: &str = "message-handler-destroyed";

/// Event callback. Returning an error is logged and does not stop delivery.
pub type Listener = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

/// Handle returned by [`EventsDispatcher::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Named-event hub owned by one handler.
pub struct EventsDispatcher {
    listeners: Mutex<HashMap<String, Vec<(ListenerId, Listener)>>>,
    next_id: AtomicU64,
    destroyed: AtomicBool,
}

impl Default for EventsDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventsDispatcher {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Register a listener for `name`.
    ///
    /// Listeners added to a destroyed dispatcher are dropped immediately.
    pub fn on<F>(&self, name: &str, listener: F) -> ListenerId
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if !self.is_destroyed() {
            self.listeners
                .lock()
                .entry(name.to_string())
                .or_default()
                .push((id, Arc::new(listener)));
        }
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn off(&self, name: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(list) = listeners.get_mut(name) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            listeners.remove(name);
        }
        removed
    }

    /// Deliver `event` to the listeners currently registered for `name`.
    ///
    /// The listener list is snapshotted before delivery, so listeners may
    /// subscribe or unsubscribe from inside their callback. A listener that
    /// fails or panics is logged and skipped. Returns the number of listeners
    /// that accepted the event.
    pub fn emit(&self, name: &str, event: &Event) -> usize {
        let snapshot: Vec<Listener> = match self.listeners.lock().get(name) {
            Some(list) => list.iter().map(|(_, l)| Arc::clone(l)).collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for listener in snapshot {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    crate::metrics::record_listener_failure();
                    warn!(event = %name, error = %e, "Event listener failed");
                }
                Err(_) => {
                    crate::metrics::record_listener_failure();
                    warn!(event = %name, "Event listener panicked");
                }
            }
        }
        delivered
    }

    /// Number of listeners registered for `name`.
    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners.lock().get(name).map_or(0, Vec::len)
    }

    /// Drop every listener. Emits already in flight finish on their snapshot.
    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
        self.listeners.lock().clear();
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

/// Cloneable emitting handle shared by a handler and its modules.
///
/// Stamps every event with the owning handler's session and context.
#[derive(Clone)]
pub struct EventEmitter {
    dispatcher: Arc<EventsDispatcher>,
    session_id: SessionId,
    context: ContextInfo,
}

impl EventEmitter {
    pub fn new(dispatcher: Arc<EventsDispatcher>, session_id: SessionId, context: ContextInfo) -> Self {
        Self {
            dispatcher,
            session_id,
            context,
        }
    }

    /// Build an envelope and publish it on [`HANDLER_EVENT`].
    ///
    /// Internal events are also published under their own name for listeners
    /// in the same domain.
    pub fn emit(&self, name: &str, data: Value, options: EventOptions) {
        let event = Event {
            name: name.to_string(),
            data,
            is_protocol_event: options.is_protocol_event,
            session_id: self.session_id.clone(),
            context: self.context.clone(),
        };
        crate::metrics::record_event(name);
        self.dispatcher.emit(HANDLER_EVENT, &event);
        if !event.is_protocol_event {
            self.dispatcher.emit(name, &event);
        }
    }

    /// Re-publish an envelope received from a child handler, unchanged.
    pub fn forward(&self, event: &Event) {
        self.dispatcher.emit(HANDLER_EVENT, event);
    }

    pub fn dispatcher(&self) -> &Arc<EventsDispatcher> {
        &self.dispatcher
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn context(&self) -> &ContextInfo {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use routenet_proto::HandlerType;
    use serde_json::json;

    fn emitter() -> EventEmitter {
        EventEmitter::new(
            Arc::new(EventsDispatcher::new()),
            SessionId::new("S1"),
            ContextInfo::new(HandlerType::Leaf, "ctx-42"),
        )
    }

    fn recorder(dispatcher: &EventsDispatcher, name: &str) -> Arc<Mutex<Vec<Event>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        dispatcher.on(name, move |event| {
            sink.lock().push(event.clone());
            Ok(())
        });
        seen
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let dispatcher = EventsDispatcher::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = Arc::clone(&order);
            dispatcher.on("tick", move |_| {
                order.lock().push(i);
                Ok(())
            });
        }
        let em = emitter();
        let event = Event {
            name: "tick".into(),
            data: Value::Null,
            is_protocol_event: false,
            session_id: em.session_id().clone(),
            context: em.context().clone(),
        };
        assert_eq!(dispatcher.emit("tick", &event), 3);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_failing_listener_does_not_stop_delivery() {
        let em = emitter();
        em.dispatcher().on(HANDLER_EVENT, |_| anyhow::bail!("boom"));
        let seen = recorder(em.dispatcher(), HANDLER_EVENT);

        em.emit("nav.navigated", json!({"url": "https://example.com"}), EventOptions::protocol());
        em.emit("nav.navigated", json!({"url": "https://example.org"}), EventOptions::protocol());

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].data["url"], "https://example.org");
    }

    #[test]
    fn test_panicking_listener_does_not_stop_delivery() {
        let em = emitter();
        em.dispatcher().on(HANDLER_EVENT, |_| panic!("listener bug"));
        let seen = recorder(em.dispatcher(), HANDLER_EVENT);

        em.emit("nav.navigated", json!(1), EventOptions::protocol());
        em.emit("nav.navigated", json!(2), EventOptions::protocol());

        assert_eq!(seen.lock().len(), 2);
        assert_eq!(em.dispatcher().listener_count(HANDLER_EVENT), 2);
    }

    #[test]
    fn test_internal_events_also_use_their_name() {
        let em = emitter();
        let envelopes = recorder(em.dispatcher(), HANDLER_EVENT);
        let bare = recorder(em.dispatcher(), "page-loaded");
        let protocol = recorder(em.dispatcher(), "nav.navigated");

        em.emit("page-loaded", json!(1), EventOptions::internal());
        em.emit("nav.navigated", json!(2), EventOptions::protocol());

        assert_eq!(envelopes.lock().len(), 2);
        assert_eq!(bare.lock().len(), 1);
        assert!(protocol.lock().is_empty());
    }

    #[test]
    fn test_envelope_is_stamped_with_origin() {
        let em = emitter();
        let seen = recorder(em.dispatcher(), HANDLER_EVENT);
        em.emit("nav.navigated", json!({}), EventOptions::protocol());

        let event = seen.lock()[0].clone();
        assert_eq!(event.session_id.as_str(), "S1");
        assert!(event.is_protocol_event);
        assert_eq!(event.context, ContextInfo::new(HandlerType::Leaf, "ctx-42"));
    }

    #[test]
    fn test_off_from_inside_listener_keeps_snapshot() {
        let dispatcher = Arc::new(EventsDispatcher::new());
        let second_calls = Arc::new(AtomicU64::new(0));

        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));
        {
            let inner = Arc::clone(&dispatcher);
            let slot = Arc::clone(&slot);
            dispatcher.on("x", move |_| {
                if let Some(id) = *slot.lock() {
                    inner.off("x", id);
                }
                Ok(())
            });
        }
        let calls = Arc::clone(&second_calls);
        let second = dispatcher.on("x", move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        *slot.lock() = Some(second);

        let em = emitter();
        let event = Event {
            name: "x".into(),
            data: Value::Null,
            is_protocol_event: false,
            session_id: em.session_id().clone(),
            context: em.context().clone(),
        };
        // The in-flight delivery still reaches the listener removed during it.
        dispatcher.emit("x", &event);
        dispatcher.emit("x", &event);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.listener_count("x"), 1);
    }

    #[test]
    fn test_off_unknown_listener() {
        let dispatcher = EventsDispatcher::new();
        let id = dispatcher.on("a", |_| Ok(()));
        assert!(!dispatcher.off("b", id));
        assert!(dispatcher.off("a", id));
        assert!(!dispatcher.off("a", id));
    }

    #[test]
    fn test_destroy_clears_listeners() {
        let em = emitter();
        let seen = recorder(em.dispatcher(), HANDLER_EVENT);
        em.dispatcher().destroy();
        em.emit("nav.navigated", json!({}), EventOptions::protocol());
        em.dispatcher().on(HANDLER_EVENT, |_| Ok(()));

        assert!(seen.lock().is_empty());
        assert_eq!(em.dispatcher().listener_count(HANDLER_EVENT), 0);
    }
}
