//! Liveness probe.

use axum::http::header;
use axum::response::{IntoResponse, Response};

pub const STATUS_BODY: &str = "<html><body>All is well</body></html>";

/// Fixed success page. No state, no side effects.
pub fn status_response() -> Response {
    ([(header::CONTENT_TYPE, "text/html")], STATUS_BODY).into_response()
}
