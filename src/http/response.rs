//! Response mapping for bridged requests.
//!
//! # Responsibilities
//! - Turn bus replies into HTTP responses
//! - Map bridge and bus failures to status codes
//!
//! # Design Decisions
//! - Consumer failure codes in the 4xx/5xx range pass through
//! - No consumer → 503, deadline → 504, anything else → 502
//! - Error bodies are small JSON documents

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;

use crate::bus::BusError;

/// Failures of one bridged request.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Nothing followed the mount prefix.
    #[error("bus address missing from request path")]
    EmptyAddress,

    /// Body could not be read.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// Round trip failed.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// Round-trip task ended abnormally.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    pub fn status(&self) -> StatusCode {
        match self {
            BridgeError::EmptyAddress | BridgeError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            BridgeError::Bus(e) => bus_status(e),
            BridgeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// HTTP status for a failed round trip.
pub fn bus_status(error: &BusError) -> StatusCode {
    match error {
        BusError::EmptyAddress => StatusCode::BAD_REQUEST,
        BusError::NoHandlers(_) | BusError::Overloaded(_) => StatusCode::SERVICE_UNAVAILABLE,
        BusError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        BusError::Failed { code, .. } => StatusCode::from_u16(*code)
            .ok()
            .filter(|s| s.is_client_error() || s.is_server_error())
            .unwrap_or(StatusCode::BAD_GATEWAY),
        BusError::ReplyDropped(_) => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Successful reply: text as `text/plain`, null as an empty 200, anything else as JSON.
pub fn reply_response(payload: Value) -> Response {
    match payload {
        Value::Null => StatusCode::OK.into_response(),
        Value::String(text) => (StatusCode::OK, text).into_response(),
        other => (StatusCode::OK, Json(other)).into_response(),
    }
}
