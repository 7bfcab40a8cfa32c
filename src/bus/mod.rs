//! Event bus subsystem.
//!
//! # Data Flow
//! ```text
//! send(address, body)
//!     → event_bus.rs (pick one consumer, round-robin)
//!     → consumer queue → Message
//!
//! request(address, body, deadline)
//!     → same delivery, plus a one-shot reply cell inside the Message
//!     → consumer calls reply()/fail() or drops the Message
//!     → requester resolves: Ok(body) | Failed | ReplyDropped | Timeout
//! ```
//!
//! # Design Decisions
//! - Point-to-point only; there is no broadcast publish
//! - Delivery is at-most-once and never retried
//! - A full consumer queue fails fast instead of blocking the sender
//! - Every request carries an explicit deadline

pub mod address;
pub mod error;
pub mod event_bus;
pub mod message;

pub use address::Address;
pub use error::{BusError, BusResult};
pub use event_bus::{EventBus, MessageConsumer};
pub use message::{Body, Message, ReplyFailure};
