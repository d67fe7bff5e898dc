//! Module class registry.
//!
//! A [`ModuleClass`] records which handler type hosts a module, which
//! destination type it serves, and the commands it declares. Several classes
//! may share a module name; lookups return them in registration order.

use super::table::{CommandTable, TableModule};
use super::{Module, ModuleContext};
use routenet_proto::HandlerType;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Builds a module instance for a handler.
pub type ModuleFactory = Arc<dyn Fn(ModuleContext) -> Arc<dyn Module> + Send + Sync>;

/// How many instances a handler keeps for a class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModuleScope {
    /// One instance per handler.
    #[default]
    Shared,
    /// One instance per concrete destination context.
    PerContext,
}

/// Registration record for one module implementation.
#[derive(Clone)]
pub struct ModuleClass {
    module_name: String,
    implementation: String,
    host: HandlerType,
    destination: HandlerType,
    commands: Vec<String>,
    scope: ModuleScope,
    factory: ModuleFactory,
    slot: usize,
}

impl ModuleClass {
    pub fn new<F>(
        module_name: impl Into<String>,
        host: HandlerType,
        destination: HandlerType,
        factory: F,
    ) -> Self
    where
        F: Fn(ModuleContext) -> Arc<dyn Module> + Send + Sync + 'static,
    {
        let module_name = module_name.into();
        Self {
            implementation: module_name.clone(),
            module_name,
            host,
            destination,
            commands: Vec::new(),
            scope: ModuleScope::Shared,
            factory: Arc::new(factory),
            slot: 0,
        }
    }

    /// Class whose commands are the entries of `table`.
    ///
    /// `build` creates the state each instance dispatches on.
    pub fn from_table<M, B>(
        module_name: impl Into<String>,
        host: HandlerType,
        destination: HandlerType,
        table: CommandTable<M>,
        build: B,
    ) -> Self
    where
        M: Send + Sync + 'static,
        B: Fn(ModuleContext) -> M + Send + Sync + 'static,
    {
        let table = Arc::new(table);
        let commands = table.names().map(str::to_string).collect();
        let shared = Arc::clone(&table);
        let mut class = Self::new(module_name, host, destination, move |ctx| {
            Arc::new(TableModule::new(build(ctx), Arc::clone(&shared))) as Arc<dyn Module>
        });
        class.commands = commands;
        class
    }

    /// Distinguishes classes sharing a module name.
    pub fn implementation(mut self, name: impl Into<String>) -> Self {
        self.implementation = name.into();
        self
    }

    /// Declare the commands this class supports.
    pub fn commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands = commands.into_iter().map(Into::into).collect();
        self
    }

    pub fn scope(mut self, scope: ModuleScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn implementation_name(&self) -> &str {
        &self.implementation
    }

    pub fn host(&self) -> HandlerType {
        self.host
    }

    pub fn destination(&self) -> HandlerType {
        self.destination
    }

    pub fn instance_scope(&self) -> ModuleScope {
        self.scope
    }

    pub fn declared_commands(&self) -> &[String] {
        &self.commands
    }

    /// Whether this class applies to a handler of type `host` serving
    /// `destination`.
    pub fn applies_to(&self, host: HandlerType, destination: HandlerType) -> bool {
        self.host == host && self.destination == destination
    }

    pub fn declares(&self, command: &str) -> bool {
        self.commands.iter().any(|c| c == command)
    }

    /// Namespace the class lives in: `leaf`, or `leaf-in-root` when it is
    /// hosted away from its destination.
    pub fn folder(&self) -> String {
        if self.host == self.destination {
            self.destination.module_path().to_string()
        } else {
            format!(
                "{}-in-{}",
                self.destination.module_path(),
                self.host.module_path()
            )
        }
    }

    pub(crate) fn instantiate(&self, ctx: ModuleContext) -> Arc<dyn Module> {
        (self.factory)(ctx)
    }

    /// Position in the owning registry; stable for its lifetime.
    pub(crate) fn slot(&self) -> usize {
        self.slot
    }
}

impl fmt::Debug for ModuleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleClass")
            .field("module", &self.module_name)
            .field("implementation", &self.implementation)
            .field("folder", &self.folder())
            .field("commands", &self.commands)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Static registry of module classes.
#[derive(Default)]
pub struct ModuleRegistry {
    classes: Vec<Arc<ModuleClass>>,
    index: HashMap<(String, HandlerType, HandlerType), Vec<usize>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a class. Later registrations resolve after earlier ones.
    pub fn register(&mut self, mut class: ModuleClass) -> &mut Self {
        let slot = self.classes.len();
        class.slot = slot;
        self.index
            .entry((class.module_name.clone(), class.host, class.destination))
            .or_default()
            .push(slot);
        self.classes.push(Arc::new(class));
        self
    }

    /// Classes for `module` hosted by `host` and serving `destination`.
    pub fn classes_for(
        &self,
        module: &str,
        host: HandlerType,
        destination: HandlerType,
    ) -> Vec<Arc<ModuleClass>> {
        self.index
            .get(&(module.to_string(), host, destination))
            .map(|slots| slots.iter().map(|&i| Arc::clone(&self.classes[i])).collect())
            .unwrap_or_default()
    }

    pub fn classes(&self) -> &[Arc<ModuleClass>] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
