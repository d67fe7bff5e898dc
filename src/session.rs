//! Session-scoped data handed to newly created handlers.

use dashmap::DashMap;
use routenet_proto::{SessionDataItem, SessionId};

/// Session data items per session.
///
/// Only handlers created after an item is added see it; live handlers keep
/// the snapshot they were created with.
#[derive(Default)]
pub struct SessionStore {
    items: DashMap<SessionId, Vec<SessionDataItem>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, session_id: &SessionId, item: SessionDataItem) {
        self.items.entry(session_id.clone()).or_default().push(item);
    }

    /// Snapshot of a session's items, in insertion order.
    pub fn items(&self, session_id: &SessionId) -> Vec<SessionDataItem> {
        self.items
            .get(session_id)
            .map(|items| items.value().clone())
            .unwrap_or_default()
    }

    /// Drop a session's items, returning them.
    pub fn clear(&self, session_id: &SessionId) -> Vec<SessionDataItem> {
        self.items
            .remove(session_id)
            .map(|(_, items)| items)
            .unwrap_or_default()
    }

    /// Number of sessions holding data.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use routenet_proto::ContextDescriptor;
    use serde_json::json;

    #[test]
    fn test_items_are_per_session() {
        let store = SessionStore::new();
        let (s1, s2) = (SessionId::new("S1"), SessionId::new("S2"));
        store.add(&s1, SessionDataItem::new("nav", "a", ContextDescriptor::All, json!(1)));
        store.add(&s1, SessionDataItem::new("nav", "b", ContextDescriptor::All, json!(2)));

        let items = store.items(&s1);
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].category, "b");
        assert!(store.items(&s2).is_empty());

        assert_eq!(store.clear(&s1).len(), 2);
        assert!(store.is_empty());
    }
}
