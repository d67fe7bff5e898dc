//! Event envelopes.
//!
//! Every event emitted on a handler is wrapped in an [`Event`] envelope that
//! records the emitting session and context. Parent handlers re-emit the
//! envelopes of their children unchanged, so the envelope observed at the root
//! is the one built by the handler that emitted it.

use crate::handler_type::HandlerType;
use crate::ids::{ContextId, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The handler type and context id an event originated from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextInfo {
    /// Handler type of the emitter.
    #[serde(rename = "type")]
    pub handler_type: HandlerType,
    /// Context id of the emitter.
    pub context_id: ContextId,
}

impl ContextInfo {
    /// Build a context info record.
    pub fn new(handler_type: HandlerType, context_id: impl Into<ContextId>) -> Self {
        Self {
            handler_type,
            context_id: context_id.into(),
        }
    }
}

/// Options accepted when emitting an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventOptions {
    /// Protocol events are meant for external consumers and carry a
    /// `module.eventName` shaped name.
    pub is_protocol_event: bool,
}

impl EventOptions {
    /// Options for a protocol event.
    pub fn protocol() -> Self {
        Self {
            is_protocol_event: true,
        }
    }

    /// Options for an internal event.
    pub fn internal() -> Self {
        Self::default()
    }
}

/// Envelope delivered to event listeners and bubbled to the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Event name.
    pub name: String,
    /// Event payload.
    pub data: Value,
    /// Whether this is a protocol event.
    pub is_protocol_event: bool,
    /// Session the emitting handler belongs to.
    pub session_id: SessionId,
    /// Emitting handler.
    pub context: ContextInfo,
}

impl Event {
    /// Module part of a `module.eventName` name.
    pub fn module_name(&self) -> Option<&str> {
        self.name.split_once('.').map(|(module, _)| module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Event {
        Event {
            name: "nav.navigated".into(),
            data: json!({"url": "https://example.com"}),
            is_protocol_event: true,
            session_id: SessionId::new("S1"),
            context: ContextInfo::new(HandlerType::Leaf, "ctx-42"),
        }
    }

    #[test]
    fn envelope_uses_camel_case() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["isProtocolEvent"], json!(true));
        assert_eq!(value["sessionId"], json!("S1"));
        assert_eq!(value["context"], json!({"type": "Leaf", "contextId": "ctx-42"}));
    }

    #[test]
    fn module_name_is_the_prefix() {
        assert_eq!(sample().module_name(), Some("nav"));
        let mut internal = sample();
        internal.name = "handler-created".into();
        assert_eq!(internal.module_name(), None);
    }
}
