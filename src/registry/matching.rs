//! Context descriptor matching.
//!
//! New descriptor variants get a new match arm here; existing arms keep their
//! meaning.

use crate::context::Context;
use routenet_proto::{ContextDescriptor, SessionDataItem};

/// Whether `context` satisfies `descriptor`.
pub fn match_context(descriptor: &ContextDescriptor, context: &Context) -> bool {
    match descriptor {
        ContextDescriptor::All => true,
        ContextDescriptor::SpecificContext { id } => context.id == *id,
    }
}

/// The items of `items` whose descriptor matches `context`, in order.
pub fn matching_items(items: &[SessionDataItem], context: &Context) -> Vec<SessionDataItem> {
    items
        .iter()
        .filter(|item| match_context(&item.context_descriptor, context))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use routenet_proto::HandlerType;
    use serde_json::json;

    fn leaf(id: &str) -> Context {
        Context::new(HandlerType::Leaf, id, Some("t".into()), "t")
    }

    #[test]
    fn test_all_matches_everything() {
        assert!(match_context(&ContextDescriptor::All, &leaf("ctx-1")));
        assert!(match_context(&ContextDescriptor::All, &Context::root()));
    }

    #[test]
    fn test_specific_context_matches_by_id() {
        let descriptor = ContextDescriptor::SpecificContext { id: "ctx-1".into() };
        assert!(match_context(&descriptor, &leaf("ctx-1")));
        assert!(!match_context(&descriptor, &leaf("ctx-2")));
    }

    #[test]
    fn test_matching_items_keeps_order() {
        let items = vec![
            SessionDataItem::new("a", "x", ContextDescriptor::All, json!(1)),
            SessionDataItem::new(
                "b",
                "x",
                ContextDescriptor::SpecificContext { id: "ctx-2".into() },
                json!(2),
            ),
            SessionDataItem::new("c", "x", ContextDescriptor::All, json!(3)),
        ];
        let found = matching_items(&items, &leaf("ctx-1"));
        let modules: Vec<&str> = found.iter().map(|i| i.module_name.as_str()).collect();
        assert_eq!(modules, vec!["a", "c"]);
    }
}
