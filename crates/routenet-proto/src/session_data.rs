//! Session-scoped configuration items.

use crate::destination::ContextDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One item of session data, scoped to the contexts matching its descriptor.
///
/// What an item means is up to the module that owns it; the routing core only
/// hands matching items to freshly created handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDataItem {
    /// Owning module.
    pub module_name: String,
    /// Module-defined category (e.g. `preference`, `event`).
    pub category: String,
    /// Contexts the item applies to.
    pub context_descriptor: ContextDescriptor,
    /// Item value.
    pub value: Value,
}

impl SessionDataItem {
    /// Build an item.
    pub fn new(
        module_name: impl Into<String>,
        category: impl Into<String>,
        context_descriptor: ContextDescriptor,
        value: Value,
    ) -> Self {
        Self {
            module_name: module_name.into(),
            category: category.into(),
            context_descriptor,
            value,
        }
    }
}
