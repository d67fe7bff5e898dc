//! Modules shipped with the daemon.

use super::{CommandTable, ModuleClass, ModuleContext, ModuleError, ModuleRegistry};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use routenet_proto::{CommandDestination, EventOptions, HandlerType};
use serde_json::{Value, json};
use uuid::Uuid;

/// Name of the diagnostics module.
pub const DIAGNOSTICS: &str = "diagnostics";

/// Liveness check available at every level of the hierarchy.
///
/// - `ping`: reports which handler and instance answered
/// - `echo`: returns its params and emits `diagnostics.echoed`
pub struct Diagnostics {
    ctx: ModuleContext,
    instance: Uuid,
}

impl Diagnostics {
    pub fn new(ctx: ModuleContext) -> Self {
        Self {
            ctx,
            instance: Uuid::new_v4(),
        }
    }

    fn table() -> CommandTable<Self> {
        CommandTable::new()
            .with("ping", Self::ping)
            .with("echo", Self::echo)
    }

    fn ping<'a>(
        &'a self,
        _params: Value,
        destination: &'a CommandDestination,
    ) -> BoxFuture<'a, Result<Value, ModuleError>> {
        async move {
            Ok(json!({
                "pong": true,
                "session": self.ctx.session_id(),
                "handler": self.ctx.handler_type(),
                "context": self.ctx.context_id(),
                "destination": destination.to_string(),
                "instance": self.instance.to_string(),
                "at": chrono::Utc::now().to_rfc3339(),
            }))
        }
        .boxed()
    }

    fn echo<'a>(
        &'a self,
        params: Value,
        _destination: &'a CommandDestination,
    ) -> BoxFuture<'a, Result<Value, ModuleError>> {
        async move {
            self.ctx
                .emit_event("diagnostics.echoed", params.clone(), EventOptions::protocol());
            Ok(params)
        }
        .boxed()
    }
}

/// Register `diagnostics` for every handler type, hosted at its own level.
pub fn register(registry: &mut ModuleRegistry) {
    for handler_type in HandlerType::ALL {
        registry.register(ModuleClass::from_table(
            DIAGNOSTICS,
            handler_type,
            handler_type,
            Diagnostics::table(),
            Diagnostics::new,
        ));
    }
}
