//! Modules used by integration tests.

use async_trait::async_trait;
use routenet::modules::{Module, ModuleClass, ModuleContext, ModuleError, ModuleRegistry};
use routenet::proto::{CommandDestination, EventOptions, HandlerType};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

pub const NAV: &str = "nav";
pub const FLAKY: &str = "flaky";

/// Leaf navigation module.
///
/// - `navigate`: emits `nav.navigated` with its params, returns `{"ok": true}`
/// - `settings`: returns the values of the session data it was handed
/// - `whoami`: returns the context it runs in
/// - `reject`: always fails with `invalid_argument`
struct Nav {
    ctx: ModuleContext,
}

#[async_trait]
impl Module for Nav {
    fn supports_command(&self, command: &str) -> bool {
        matches!(command, "navigate" | "settings" | "whoami" | "reject")
    }

    async fn invoke(
        &self,
        command: &str,
        params: Value,
        _destination: &CommandDestination,
    ) -> Result<Value, ModuleError> {
        match command {
            "navigate" => {
                self.ctx
                    .emit_event("nav.navigated", params, EventOptions::protocol());
                Ok(json!({ "ok": true }))
            }
            "settings" => Ok(Value::Array(
                self.ctx
                    .session_data()
                    .iter()
                    .map(|item| item.value.clone())
                    .collect(),
            )),
            "whoami" => Ok(json!(self.ctx.context_id())),
            "reject" => Err(ModuleError::invalid_argument("bad url").with_data(json!({ "url": params }))),
            other => Err(ModuleError::new("unknown_command", other)),
        }
    }
}

/// Shared switchboard for `flaky` instances across every domain.
#[derive(Default)]
pub struct FlakyState {
    hanging: AtomicUsize,
    invocations: AtomicUsize,
    pub entered: Notify,
    pub completed: AtomicUsize,
}

impl FlakyState {
    /// Make the next `runs` invocations hang until their domain is killed.
    pub fn hang_next(&self, runs: usize) {
        self.hanging.store(runs, Ordering::SeqCst);
    }

    /// Invocations so far, hung or not.
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

struct Flaky {
    state: Arc<FlakyState>,
}

#[async_trait]
impl Module for Flaky {
    fn supports_command(&self, command: &str) -> bool {
        command == "run"
    }

    async fn invoke(
        &self,
        _command: &str,
        _params: Value,
        _destination: &CommandDestination,
    ) -> Result<Value, ModuleError> {
        self.state.invocations.fetch_add(1, Ordering::SeqCst);
        let hang = self
            .state
            .hanging
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if hang {
            self.state.entered.notify_one();
            std::future::pending::<()>().await;
        }
        let runs = self.state.completed.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(json!({ "runs": runs }))
    }
}

/// Registry with `diagnostics`, `nav` and `flaky`.
pub fn registry(flaky: &Arc<FlakyState>) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    routenet::modules::builtin::register(&mut registry);

    registry.register(
        ModuleClass::new(NAV, HandlerType::Leaf, HandlerType::Leaf, |ctx| {
            Arc::new(Nav { ctx }) as Arc<dyn Module>
        })
        .commands(["navigate", "settings", "whoami", "reject"]),
    );

    let state = Arc::clone(flaky);
    registry.register(
        ModuleClass::new(FLAKY, HandlerType::Leaf, HandlerType::Leaf, move |_ctx| {
            Arc::new(Flaky {
                state: Arc::clone(&state),
            }) as Arc<dyn Module>
        })
        .commands(["run"]),
    );

    registry
}
