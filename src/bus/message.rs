//! Messages, payload bodies and correlated replies.

use serde_json::Value;
use std::fmt;
use tokio::sync::oneshot;

use crate::bus::address::Address;
use crate::datastore::{DataStoreError, RecordStream};

/// Payload carried by a bus message or reply.
pub enum Body {
    Empty,
    Text(String),
    Json(Value),
    /// Lazy query results; consumed at most once.
    Records(RecordStream),
}

impl Body {
    pub fn kind(&self) -> &'static str {
        match self {
            Body::Empty => "empty",
            Body::Text(_) => "text",
            Body::Json(_) => "json",
            Body::Records(_) => "records",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Render the body as JSON, draining a record stream into an array.
    pub async fn into_json(self) -> Result<Value, DataStoreError> {
        match self {
            Body::Empty => Ok(Value::Null),
            Body::Text(text) => Ok(Value::String(text)),
            Body::Json(value) => Ok(value),
            Body::Records(records) => records.collect_all().await.map(Value::Array),
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Empty"),
            Body::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Body::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Body::Records(records) => f.debug_tuple("Records").field(records).finish(),
        }
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

impl From<RecordStream> for Body {
    fn from(records: RecordStream) -> Self {
        Body::Records(records)
    }
}

/// Failure signalled by a consumer instead of a reply body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyFailure {
    pub code: u16,
    pub message: String,
}

pub(crate) type ReplySender = oneshot::Sender<Result<Body, ReplyFailure>>;

/// A message delivered to one consumer.
///
/// When the sender awaits a reply, the message owns the one-shot reply cell.
/// `reply` and `fail` consume the message, so it resolves at most once;
/// dropping it unanswered resolves the requester with `ReplyDropped`.
pub struct Message {
    address: Address,
    body: Body,
    reply: Option<ReplySender>,
}

impl Message {
    pub(crate) fn new(address: Address, body: Body, reply: Option<ReplySender>) -> Self {
        Self {
            address,
            body,
            reply,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Take the body out, leaving `Body::Empty`. The reply cell is kept.
    pub fn take_body(&mut self) -> Body {
        std::mem::replace(&mut self.body, Body::Empty)
    }

    pub fn expects_reply(&self) -> bool {
        self.reply.is_some()
    }

    /// Answer the sender. Returns false if nobody is waiting any more.
    pub fn reply(self, body: impl Into<Body>) -> bool {
        self.resolve(Ok(body.into()))
    }

    /// Signal failure to the sender. Returns false if nobody is waiting any more.
    pub fn fail(self, code: u16, message: impl Into<String>) -> bool {
        self.resolve(Err(ReplyFailure {
            code,
            message: message.into(),
        }))
    }

    fn resolve(mut self, outcome: Result<Body, ReplyFailure>) -> bool {
        match self.reply.take() {
            Some(tx) => {
                let delivered = tx.send(outcome).is_ok();
                if !delivered {
                    tracing::debug!(address = %self.address, "Reply discarded, requester gone");
                }
                delivered
            }
            None => false,
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("address", &self.address)
            .field("body", &self.body)
            .field("expects_reply", &self.expects_reply())
            .finish()
    }
}
