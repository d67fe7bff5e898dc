//! routenetd - serves a routenet network over JSON lines on stdin/stdout.

use anyhow::Context as _;
use routenet::config::{self, Config, LogFormat};
use routenet::events::HANDLER_EVENT;
use routenet::modules::{ModuleRegistry, builtin};
use routenet::proto::wire::{ClientRequest, DaemonMessage};
use routenet::proto::{Event, SessionId};
use routenet::telemetry::spans;
use routenet::{Network, metrics};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{Instrument, error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration; without a path every default applies.
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path).with_context(|| format!("loading {path}"))?,
        None => Config::default(),
    };

    init_tracing(&config);

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("configuration has {} error(s)", errors.len());
    }

    metrics::init();

    let mut modules = ModuleRegistry::new();
    builtin::register(&mut modules);

    let network = Arc::new(Network::from_config(&config, modules)?);
    info!(
        node = %config.node.name,
        contexts = network.tree().len(),
        retry_on_abort = config.routing.retry_on_abort,
        "Starting routenetd"
    );

    // Every frame goes through one writer so lines never interleave.
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<DaemonMessage>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = out_rx.recv().await {
            let line = match message.to_line() {
                Ok(line) => line,
                Err(e) => {
                    error!(error = %e, "Failed to encode frame");
                    continue;
                }
            };
            if stdout.write_all(line.as_bytes()).await.is_err()
                || stdout.write_all(b"\n").await.is_err()
                || stdout.flush().await.is_err()
            {
                break;
            }
        }
    });

    let mut subscribed: HashSet<SessionId> = HashSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let request = match ClientRequest::parse(&line) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Rejected request line");
                let _ = out_tx.send(DaemonMessage::error(None, "invalid_request", e.to_string()));
                continue;
            }
        };

        match request {
            ClientRequest::Command {
                id,
                session_id,
                command,
            } => {
                let root = match network.session(session_id.clone()) {
                    Ok(root) => root,
                    Err(e) => {
                        let _ = out_tx.send(DaemonMessage::error(Some(id), e.wire_code(), e.to_string()));
                        continue;
                    }
                };
                if subscribed.insert(session_id.clone()) {
                    let events_tx = out_tx.clone();
                    root.on(HANDLER_EVENT, move |event: &Event| {
                        if event.is_protocol_event {
                            let _ = events_tx.send(DaemonMessage::Event {
                                event: event.clone(),
                            });
                        }
                        Ok(())
                    });
                }

                let command = command.into_command(config.routing.retry_on_abort);
                let out_tx = out_tx.clone();
                let span = spans::client(session_id.as_str());
                tokio::spawn(
                    async move {
                        let reply = match root.handle_command(&command).await {
                            Ok(result) => DaemonMessage::Result { id, result },
                            Err(e) => DaemonMessage::error(Some(id), e.wire_code(), e.to_string()),
                        };
                        let _ = out_tx.send(reply);
                    }
                    .instrument(span),
                );
            }
            ClientRequest::EndSession { id, session_id } => {
                subscribed.remove(&session_id);
                let destroyed = network.end_session(&session_id).await;
                let _ = out_tx.send(DaemonMessage::Result {
                    id,
                    result: serde_json::json!({ "destroyed": destroyed }),
                });
            }
            ClientRequest::Metrics { id } => {
                let _ = out_tx.send(DaemonMessage::Metrics {
                    id,
                    text: metrics::gather_metrics(),
                });
            }
        }
    }

    network.shutdown().await;
    drop(out_tx);
    let _ = writer.await;
    info!("routenetd stopped");
    Ok(())
}

/// Logs go to stderr; stdout carries the protocol.
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    match config.log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}
