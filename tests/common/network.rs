//! A small two-process topology.
//!
//! ```text
//! root
//! ├── p1
//! │   └── p1/main   (ctx-42, ctx-43)
//! └── p2
//!     └── p2/main   (ctx-77)
//! ```

use super::modules::{self, FlakyState};
use routenet::Network;
use routenet::proto::{Event, HandlerType};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub struct TestNetwork {
    pub network: Network,
    pub flaky: Arc<FlakyState>,
}

impl TestNetwork {
    pub fn spawn() -> Self {
        let flaky = Arc::new(FlakyState::default());
        let network = Network::new(modules::registry(&flaky));

        for process in ["p1", "p2"] {
            network.add_process(process).expect("add process");
            network.add_thread(process, "main").expect("add thread");
        }
        network.add_leaf("p1/main", "ctx-42").expect("add leaf");
        network.add_leaf("p1/main", "ctx-43").expect("add leaf");
        network.add_leaf("p2/main", "ctx-77").expect("add leaf");

        Self { network, flaky }
    }

    /// Live handlers of `handler_type` across every domain.
    #[allow(dead_code)]
    pub fn handlers_of(&self, handler_type: HandlerType) -> usize {
        let mut domains = vec![routenet::ROOT_DOMAIN.to_string()];
        domains.extend(
            self.network
                .domains()
                .handles()
                .iter()
                .map(|h| h.id().to_string()),
        );
        domains
            .iter()
            .filter_map(|d| self.network.registry(d))
            .flat_map(|r| r.handlers())
            .filter(|h| h.handler_type() == handler_type)
            .count()
    }
}

/// Collects envelopes delivered to a listener.
pub struct EventTap {
    pub tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
}

#[allow(dead_code)]
impl EventTap {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// A listener that feeds this tap.
    pub fn listener(&self) -> impl Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static {
        let tx = self.tx.clone();
        move |event: &Event| {
            let _ = tx.send(event.clone());
            Ok(())
        }
    }

    pub async fn next(&mut self) -> Option<Event> {
        tokio::time::timeout(Duration::from_secs(2), self.rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// True if nothing else arrives within a short grace period.
    pub async fn is_quiet(&mut self) -> bool {
        tokio::time::timeout(Duration::from_millis(100), self.rx.recv())
            .await
            .is_err()
    }
}
