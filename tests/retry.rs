//! Integration tests for retry after a domain dies mid-command.
//!
//! These run on the multi-threaded runtime, like the daemon, so a domain
//! replacement races with the parent's retry.

mod common;

use common::{FLAKY, TestNetwork};
use routenet::RouteError;
use routenet::proto::{Command, CommandDestination, HandlerType};
use serde_json::json;
use std::sync::Arc;

fn run(retry_on_abort: bool) -> Command {
    Command::new(FLAKY, "run", CommandDestination::context(HandlerType::Leaf, "ctx-42"))
        .with_retry_on_abort(retry_on_abort)
}

/// Start a command that hangs in `p1/main`, then run `disrupt` once it does.
async fn interrupted(
    net: &Arc<TestNetwork>,
    command: Command,
    disrupt: impl FnOnce(&TestNetwork),
) -> Result<serde_json::Value, RouteError> {
    net.flaky.hang_next(1);
    let root = net.network.session("S1").expect("root");
    let in_flight = tokio::spawn(async move { root.handle_command(&command).await });

    net.flaky.entered.notified().await;
    disrupt(net);

    in_flight.await.expect("command task")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_retry_reaches_restarted_domain() {
    let net = Arc::new(TestNetwork::spawn());

    let result = interrupted(&net, run(true), |net| {
        net.network.restart_domain("p1/main");
    })
    .await
    .expect("retried on the new domain");
    assert_eq!(result, json!({ "runs": 1 }));
    assert_eq!(net.flaky.invocations(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_abort_surfaces_without_retry() {
    let net = Arc::new(TestNetwork::spawn());

    let err = interrupted(&net, run(false), |net| {
        net.network.restart_domain("p1/main");
    })
    .await
    .unwrap_err();
    assert!(matches!(err, RouteError::TransportAbort { .. }));
    assert_eq!(net.flaky.invocations(), 1);

    // The restarted domain serves the next command.
    let result = net
        .network
        .handle_command("S1", &run(false))
        .await
        .expect("fresh command");
    assert_eq!(result, json!({ "runs": 1 }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_retry_that_aborts_again_surfaces() {
    let net = Arc::new(TestNetwork::spawn());
    net.flaky.hang_next(2);

    // Replace the thread domain every time the module starts running.
    let replacer = tokio::spawn({
        let net = Arc::clone(&net);
        async move {
            for _ in 0..2 {
                net.flaky.entered.notified().await;
                net.network.spawn_domain("p1/main");
            }
        }
    });

    let err = net
        .network
        .handle_command("S1", &run(true))
        .await
        .unwrap_err();
    assert!(matches!(err, RouteError::TransportAbort { .. }));
    assert!(!err.is_retryable());
    // One attempt plus one retry at the process level; nobody above retries.
    assert_eq!(net.flaky.invocations(), 2);
    assert_eq!(net.flaky.completed.load(std::sync::atomic::Ordering::SeqCst), 0);

    replacer.await.expect("replacer");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_retry_fails_when_domain_stays_down() {
    let net = Arc::new(TestNetwork::spawn());

    let err = interrupted(&net, run(true), |net| {
        net.network.kill_domain("p1/main");
    })
    .await
    .unwrap_err();
    assert!(matches!(err, RouteError::DomainUnavailable(_)));
    assert_eq!(net.flaky.invocations(), 1);
}
