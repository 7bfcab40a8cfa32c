//! In-process event bus.
//!
//! # Responsibilities
//! - Register consumers per address
//! - Deliver each message to exactly one consumer (round-robin)
//! - Correlate requests with their one-shot reply under a deadline

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

use crate::bus::address::Address;
use crate::bus::error::{BusError, BusResult};
use crate::bus::message::{Body, Message};

struct Registration {
    id: u64,
    tx: mpsc::Sender<Message>,
}

#[derive(Default)]
struct HandlerSet {
    registrations: Vec<Registration>,
    cursor: usize,
}

impl HandlerSet {
    fn next_sender(&mut self) -> Option<(u64, mpsc::Sender<Message>)> {
        if self.registrations.is_empty() {
            return None;
        }
        let index = self.cursor % self.registrations.len();
        self.cursor = self.cursor.wrapping_add(1);
        let registration = &self.registrations[index];
        Some((registration.id, registration.tx.clone()))
    }
}

struct BusInner {
    handlers: DashMap<Address, HandlerSet>,
    next_id: AtomicU64,
    buffer: usize,
}

impl BusInner {
    fn unregister(&self, address: &Address, id: u64) {
        if let Some(mut set) = self.handlers.get_mut(address) {
            set.registrations.retain(|r| r.id != id);
        }
        self.handlers.remove_if(address, |_, set| set.registrations.is_empty());
    }
}

/// Handle to the event bus. Clones share the same registry.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create a bus whose consumers each queue up to `buffer` messages.
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                handlers: DashMap::new(),
                next_id: AtomicU64::new(1),
                buffer: buffer.max(1),
            }),
        }
    }

    /// Register a consumer at `address`. Dropping it unregisters.
    pub fn consumer(&self, address: Address) -> MessageConsumer {
        let (tx, rx) = mpsc::channel(self.inner.buffer);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .handlers
            .entry(address.clone())
            .or_default()
            .registrations
            .push(Registration { id, tx });

        tracing::debug!(address = %address, consumer_id = id, "Consumer registered");
        MessageConsumer {
            address,
            id,
            rx,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Number of consumers registered at `address`.
    pub fn handler_count(&self, address: &Address) -> usize {
        self.inner
            .handlers
            .get(address)
            .map(|set| set.registrations.len())
            .unwrap_or(0)
    }

    /// Fire-and-forget delivery to one consumer.
    pub fn send(&self, address: &Address, body: impl Into<Body>) -> BusResult<()> {
        self.deliver(Message::new(address.clone(), body.into(), None))
    }

    /// Deliver to one consumer and wait up to `deadline` for its reply.
    pub async fn request(
        &self,
        address: &Address,
        body: impl Into<Body>,
        deadline: Duration,
    ) -> BusResult<Body> {
        let (tx, rx) = oneshot::channel();
        self.deliver(Message::new(address.clone(), body.into(), Some(tx)))?;

        match timeout(deadline, rx).await {
            Ok(Ok(Ok(body))) => Ok(body),
            Ok(Ok(Err(failure))) => Err(BusError::Failed {
                address: address.clone(),
                code: failure.code,
                message: failure.message,
            }),
            Ok(Err(_)) => Err(BusError::ReplyDropped(address.clone())),
            Err(_) => Err(BusError::Timeout {
                address: address.clone(),
                timeout: deadline,
            }),
        }
    }

    fn deliver(&self, mut message: Message) -> BusResult<()> {
        loop {
            let address = message.address().clone();
            // Guard must be released before unregister touches the same shard.
            let selected = match self.inner.handlers.get_mut(&address) {
                Some(mut set) => set.next_sender(),
                None => None,
            };
            let Some((id, tx)) = selected else {
                return Err(BusError::NoHandlers(address));
            };

            match tx.try_send(message) {
                Ok(()) => return Ok(()),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(address = %address, consumer_id = id, "Consumer queue full");
                    return Err(BusError::Overloaded(address));
                }
                Err(mpsc::error::TrySendError::Closed(returned)) => {
                    self.inner.unregister(&address, id);
                    message = returned;
                }
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Receiving end of a registration.
pub struct MessageConsumer {
    address: Address,
    id: u64,
    rx: mpsc::Receiver<Message>,
    bus: Weak<BusInner>,
}

impl MessageConsumer {
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Next message, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Next queued message without waiting.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }
}

impl Drop for MessageConsumer {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unregister(&self.address, self.id);
            tracing::debug!(address = %self.address, consumer_id = self.id, "Consumer unregistered");
        }
    }
}
