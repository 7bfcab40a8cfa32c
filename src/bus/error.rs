//! Bus error definitions.

use std::time::Duration;
use thiserror::Error;

use crate::bus::address::Address;

/// Errors that can occur when delivering a message or awaiting its reply.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    /// Address was empty.
    #[error("bus address is empty")]
    EmptyAddress,

    /// Nobody is consuming the address.
    #[error("no handlers for address '{0}'")]
    NoHandlers(Address),

    /// Every consumer queue at the address is full.
    #[error("consumers for address '{0}' are overloaded")]
    Overloaded(Address),

    /// No reply arrived before the deadline.
    #[error("timed out after {}ms waiting for a reply from '{address}'", .timeout.as_millis())]
    Timeout { address: Address, timeout: Duration },

    /// Consumer replied with a failure.
    #[error("'{address}' failed with code {code}: {message}")]
    Failed {
        address: Address,
        code: u16,
        message: String,
    },

    /// Consumer dropped the message without replying.
    #[error("'{0}' dropped the message without replying")]
    ReplyDropped(Address),
}

impl BusError {
    /// Short label for metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            BusError::EmptyAddress => "empty_address",
            BusError::NoHandlers(_) => "no_handlers",
            BusError::Overloaded(_) => "overloaded",
            BusError::Timeout { .. } => "timeout",
            BusError::Failed { .. } => "failed",
            BusError::ReplyDropped(_) => "dropped",
        }
    }
}

/// Result type for bus operations.
pub type BusResult<T> = Result<T, BusError>;
