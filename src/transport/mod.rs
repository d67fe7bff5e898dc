//! Forwarding commands toward their destination.
//!
//! A [`Connector`] knows the next hops from a handler toward a destination
//! and how to open a [`Transport`] to each. [`forward_command`] is the shared
//! algorithm every relaying handler kind uses on top of them.

mod connector;
mod link;

pub use connector::DomainConnector;
pub use link::DomainLink;

use crate::context::Context;
use crate::error::{RouteError, RouteResult};
use crate::handler::Handler;
use async_trait::async_trait;
use futures_util::future::join_all;
use routenet_proto::{Command, CommandDestination};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// One live request/response link to a next-hop handler.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `command` and wait for its result. Losing the link while waiting
    /// yields [`RouteError::TransportAbort`].
    async fn send_command(&self, command: Command) -> RouteResult;

    fn is_closed(&self) -> bool;
}

/// Next-hop resolution and link management for one handler level.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Contexts one level below `handler` on the way to `destination`.
    fn next_hops(
        &self,
        handler: &Handler,
        destination: &CommandDestination,
    ) -> RouteResult<Vec<Arc<Context>>>;

    /// A transport to the handler observing `hop` in the same session,
    /// creating that handler if needed.
    async fn connect(&self, handler: &Handler, hop: &Arc<Context>) -> RouteResult<Arc<dyn Transport>>;

    /// Forget any cached link from `handler` to `hop`.
    fn invalidate(&self, handler: &Handler, hop: &Context);

    /// Forget every link owned by `handler`.
    fn release(&self, _handler: &Handler) {}
}

/// Send `command` to the next hop(s) toward its destination.
///
/// A specific destination goes to exactly one hop. A descriptor destination
/// goes to every hop concurrently and yields a JSON array; arrays returned by
/// hops above the destination level are flattened into it. Any failing hop
/// fails the whole broadcast.
///
/// Only an abort of this handler's own link is retried. Aborts returned from
/// further down arrive relayed and surface unchanged.
pub async fn forward_command(
    handler: &Handler,
    connector: &dyn Connector,
    command: &Command,
) -> RouteResult {
    forward(handler, connector, command)
        .await
        .map_err(RouteError::relayed)
}

async fn forward(handler: &Handler, connector: &dyn Connector, command: &Command) -> RouteResult {
    let destination = &command.destination;
    let hops = connector.next_hops(handler, destination)?;

    if !destination.is_broadcast() {
        let hop = hops
            .into_iter()
            .next()
            .ok_or_else(|| RouteError::unreachable(handler.name(), destination))?;
        return send_to_hop(handler, connector, hop, command).await;
    }

    debug!(hops = hops.len(), "Broadcasting command");
    let flatten = hops
        .first()
        .is_some_and(|hop| hop.handler_type != destination.handler_type());
    let results = join_all(
        hops.into_iter()
            .map(|hop| send_to_hop(handler, connector, hop, command)),
    )
    .await;

    let mut collected = Vec::new();
    for result in results {
        match result? {
            Value::Array(items) if flatten => collected.extend(items),
            value => collected.push(value),
        }
    }
    Ok(Value::Array(collected))
}

async fn send_to_hop(
    handler: &Handler,
    connector: &dyn Connector,
    hop: Arc<Context>,
    command: &Command,
) -> RouteResult {
    let error = match attempt(handler, connector, &hop, command).await {
        Err(e) if e.is_retryable() && command.retry_on_abort => e,
        other => return other,
    };

    warn!(hop = %hop.id, error = %error, "Transport aborted, retrying once");
    crate::metrics::record_forward_retry();
    connector.invalidate(handler, &hop);

    // A specific destination is resolved again; it may now live elsewhere.
    let hop = if command.destination.is_broadcast() {
        hop
    } else {
        connector
            .next_hops(handler, &command.destination)?
            .into_iter()
            .next()
            .ok_or_else(|| RouteError::unreachable(handler.name(), &command.destination))?
    };
    attempt(handler, connector, &hop, command).await
}

async fn attempt(
    handler: &Handler,
    connector: &dyn Connector,
    hop: &Arc<Context>,
    command: &Command,
) -> RouteResult {
    let transport = connector.connect(handler, hop).await?;
    transport.send_command(command.clone()).await
}
