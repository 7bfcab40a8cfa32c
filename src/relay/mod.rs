//! Query relay.
//!
//! # Data Flow
//! ```text
//! bus request (Text statement) on the query address
//!     → DataStore::query (verbatim, no validation)
//!     → reply Body::Records (lazy, single pass)
//!     → or fail(code, message) with the data service failure code
//! ```
//!
//! # Design Decisions
//! - Each statement runs in its own task so slow queries don't block the queue
//! - Non-text bodies are rejected with 400
//! - Statements come from trusted internal components and are not sanitized

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::bus::{Address, EventBus, Message};
use crate::datastore::DataStore;
use crate::observability::metrics;

/// Bus consumer forwarding query strings to the data service.
pub struct QueryRelay {
    bus: EventBus,
    store: Arc<dyn DataStore>,
    address: Address,
}

impl QueryRelay {
    pub fn new(bus: EventBus, store: Arc<dyn DataStore>, address: Address) -> Self {
        Self {
            bus,
            store,
            address,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Register on the query address and serve until shutdown.
    ///
    /// The consumer is registered before this returns, so requests sent right
    /// after find a handler.
    pub fn spawn(self, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        let mut consumer = self.bus.consumer(self.address.clone());
        tracing::info!(address = %self.address, "Query relay registered");

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    message = consumer.recv() => match message {
                        Some(message) => {
                            let store = self.store.clone();
                            tokio::spawn(relay(store, message));
                        }
                        None => break,
                    },
                    _ = shutdown.recv() => {
                        tracing::debug!(address = %self.address, "Query relay stopping");
                        break;
                    }
                }
            }
        })
    }
}

async fn relay(store: Arc<dyn DataStore>, mut message: Message) {
    let address = message.address().as_str().to_string();
    let body = message.take_body();
    let Some(statement) = body.as_text() else {
        tracing::warn!(address = %address, kind = body.kind(), "Query relay expects a text statement");
        metrics::record_bus_request(&address, "rejected");
        message.fail(400, format!("expected a text query, got {}", body.kind()));
        return;
    };

    tracing::debug!(address = %address, statement = %statement, "Relaying query");
    match store.query(statement).await {
        Ok(records) => {
            metrics::record_bus_request(&address, "ok");
            if !message.reply(records) {
                tracing::debug!(address = %address, "Query requester went away");
            }
        }
        Err(e) => {
            tracing::warn!(address = %address, error = %e, "Query failed");
            metrics::record_bus_request(&address, "failed");
            message.fail(e.failure_code(), e.to_string());
        }
    }
}
