//! HTTP to bus bridge.
//!
//! # Data Flow
//! ```text
//! POST /bus/<address>?query  (+ form body)
//!     → Address::from_path (empty → 400, nothing sent)
//!     → RequestParams → flat JSON payload
//!     → EventBus::request with the reply deadline
//!     → success: store reply in the session, answer 200
//!     → failure: one notice on the invalid-credentials address, answer 4xx/5xx
//! ```
//!
//! # Design Decisions
//! - The round trip runs in its own task so a client hanging up does not
//!   cancel it; the reply still lands in the session
//! - Every call ends in exactly one response
//! - Notice delivery failures are logged and counted, never escalated

use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};
use std::time::Duration;

use crate::bus::{Address, BusError, EventBus};
use crate::config::GatewayConfig;
use crate::http::request::{RequestIdExt, RequestParams};
use crate::http::response::{reply_response, BridgeError};
use crate::observability::metrics;
use crate::session::{SessionCorrelator, SessionHandle};

/// Text of the failure notice.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "That username or password is invalid.";

/// Bridges `POST <mount>/<address>` requests onto the event bus.
#[derive(Clone)]
pub struct BusBridge {
    bus: EventBus,
    sessions: SessionCorrelator,
    mount_prefix: String,
    reply_timeout: Duration,
    failure_address: Address,
    reply_attribute: String,
    body_limit: usize,
}

impl BusBridge {
    pub fn from_config(
        bus: EventBus,
        sessions: SessionCorrelator,
        config: &GatewayConfig,
    ) -> Result<Self, BusError> {
        Ok(Self {
            bus,
            sessions,
            mount_prefix: config.bus.mount_prefix.clone(),
            reply_timeout: config.bus.reply_timeout(),
            failure_address: Address::new(config.bus.invalid_credentials_address.clone())?,
            reply_attribute: config.session.reply_attribute.clone(),
            body_limit: config.security.max_body_size,
        })
    }

    pub fn reply_timeout(&self) -> Duration {
        self.reply_timeout
    }

    /// Bridge one request for the given session.
    pub async fn handle(&self, session: SessionHandle, request: Request<Body>) -> Response {
        match self.bridge(session, request).await {
            Ok(payload) => reply_response(payload),
            Err(error) => error.into_response(),
        }
    }

    async fn bridge(
        &self,
        session: SessionHandle,
        request: Request<Body>,
    ) -> Result<Value, BridgeError> {
        let request_id = request.request_id().to_string();
        let address = Address::from_path(request.uri().path(), &self.mount_prefix)
            .map_err(|_| BridgeError::EmptyAddress)?;
        let params = RequestParams::from_request(request, self.body_limit).await?;

        tracing::debug!(
            request_id = %request_id,
            address = %address,
            params = params.len(),
            session = %session.id().short(),
            "Bridging request onto bus"
        );

        let bridge = self.clone();
        let payload = params.to_payload();
        tokio::spawn(async move { bridge.exchange(&address, payload, &session).await })
            .await
            .map_err(|e| BridgeError::Internal(e.to_string()))?
    }

    async fn exchange(
        &self,
        address: &Address,
        payload: Value,
        session: &SessionHandle,
    ) -> Result<Value, BridgeError> {
        let outcome = reply_within(&self.bus, address, payload, self.reply_timeout).await;

        match outcome {
            Ok(reply) => {
                metrics::record_bus_request(address.as_str(), "ok");
                if !self.sessions.set(session, self.reply_attribute.clone(), reply.clone()) {
                    tracing::debug!(
                        address = %address,
                        session = %session.id().short(),
                        "Session gone before reply arrived"
                    );
                }
                Ok(reply)
            }
            Err(error) => {
                metrics::record_bus_request(address.as_str(), error.outcome());
                tracing::warn!(address = %address, error = %error, "Bus round trip failed");
                self.notify_failure(address, &error);
                Err(error.into())
            }
        }
    }

    fn notify_failure(&self, address: &Address, error: &BusError) {
        let notice = json!({
            "address": address.as_str(),
            "message": INVALID_CREDENTIALS_MESSAGE,
            "reason": error.to_string(),
        });
        if let Err(e) = self.bus.send(&self.failure_address, notice) {
            metrics::record_notification_dropped();
            tracing::warn!(
                notice_address = %self.failure_address,
                error = %e,
                "Failure notice not delivered"
            );
        }
    }
}

/// Request `address` and read the whole reply, both under one deadline.
///
/// A record stream that stalls after the reply arrived counts as a timeout.
pub(crate) async fn reply_within(
    bus: &EventBus,
    address: &Address,
    payload: impl Into<crate::bus::Body>,
    deadline: Duration,
) -> Result<Value, BusError> {
    let round_trip = async {
        let body = bus.request(address, payload, deadline).await?;
        body.into_json().await.map_err(|e| BusError::Failed {
            address: address.clone(),
            code: e.failure_code(),
            message: e.to_string(),
        })
    };
    tokio::time::timeout(deadline, round_trip)
        .await
        .unwrap_or_else(|_| {
            Err(BusError::Timeout {
                address: address.clone(),
                timeout: deadline,
            })
        })
}
