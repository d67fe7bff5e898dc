//! Static command tables.
//!
//! A module built on a [`CommandTable`] maps command names to plain method
//! pointers once, at registration, and dispatches through that map.

use super::{Module, ModuleError};
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use routenet_proto::CommandDestination;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A command implementation on module state `M`.
pub type CommandFn<M> = for<'a> fn(
    &'a M,
    Value,
    &'a CommandDestination,
) -> BoxFuture<'a, Result<Value, ModuleError>>;

/// Name-to-method map for one module.
pub struct CommandTable<M> {
    entries: HashMap<&'static str, CommandFn<M>>,
    order: Vec<&'static str>,
}

impl<M> Default for CommandTable<M> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<M> CommandTable<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command. Re-adding a name replaces its method.
    pub fn with(mut self, name: &'static str, method: CommandFn<M>) -> Self {
        if self.entries.insert(name, method).is_none() {
            self.order.push(name);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<CommandFn<M>> {
        self.entries.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Command names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.order.iter().copied()
    }
}

/// Module state paired with its command table.
pub struct TableModule<M> {
    state: M,
    table: Arc<CommandTable<M>>,
}

impl<M> TableModule<M> {
    pub fn new(state: M, table: Arc<CommandTable<M>>) -> Self {
        Self { state, table }
    }

    pub fn state(&self) -> &M {
        &self.state
    }
}

#[async_trait]
impl<M> Module for TableModule<M>
where
    M: Send + Sync + 'static,
{
    fn supports_command(&self, command: &str) -> bool {
        self.table.contains(command)
    }

    async fn invoke(
        &self,
        command: &str,
        params: Value,
        destination: &CommandDestination,
    ) -> Result<Value, ModuleError> {
        match self.table.get(command) {
            Some(method) => method(&self.state, params, destination).await,
            None => Err(ModuleError::new(
                "unknown_command",
                format!("no method for command {command}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use routenet_proto::HandlerType;
    use serde_json::json;

    struct Counter {
        step: i64,
    }

    impl Counter {
        fn add<'a>(
            &'a self,
            params: Value,
            _destination: &'a CommandDestination,
        ) -> BoxFuture<'a, Result<Value, ModuleError>> {
            async move {
                match params["value"].as_i64() {
                    Some(value) => Ok(json!(value + self.step)),
                    None => Err(ModuleError::invalid_argument("value must be an integer")),
                }
            }
            .boxed()
        }
    }

    fn module() -> TableModule<Counter> {
        let table = CommandTable::new().with("add", Counter::add);
        TableModule::new(Counter { step: 2 }, Arc::new(table))
    }

    #[tokio::test]
    async fn test_dispatches_by_name() {
        let dest = CommandDestination::context(HandlerType::Leaf, "ctx-1");
        let module = module();
        assert!(module.supports_command("add"));
        assert!(!module.supports_command("sub"));
        let result = module.invoke("add", json!({"value": 40}), &dest).await.unwrap();
        assert_eq!(result, json!(42));
    }

    #[tokio::test]
    async fn test_errors_pass_through() {
        let dest = CommandDestination::context(HandlerType::Leaf, "ctx-1");
        let err = module().invoke("add", json!({}), &dest).await.unwrap_err();
        assert_eq!(err.code(), "invalid_argument");

        let err = module().invoke("sub", json!({}), &dest).await.unwrap_err();
        assert_eq!(err.code(), "unknown_command");
    }

    #[test]
    fn test_names_keep_insertion_order() {
        let table: CommandTable<Counter> = CommandTable::new()
            .with("b", Counter::add)
            .with("a", Counter::add)
            .with("b", Counter::add);
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["b", "a"]);
    }
}
