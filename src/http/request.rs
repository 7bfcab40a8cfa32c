//! Request handling and parameter marshaling.
//!
//! # Responsibilities
//! - Read the request id stamped by the request-id layer
//! - Collect parameters from the query string and form bodies
//! - Flatten parameters into a bus payload
//!
//! # Design Decisions
//! - Parameters keep wire order and duplicates
//! - The bus payload collapses duplicates, last value wins
//! - Body size is capped before parsing

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Request};
use serde_json::{Map, Value};
use url::form_urlencoded;

use crate::http::response::BridgeError;

/// Header carrying the correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Access to the request id.
pub trait RequestIdExt {
    /// The request id, or `"unknown"` when the layer did not run.
    fn request_id(&self) -> &str;
}

impl RequestIdExt for HeaderMap {
    fn request_id(&self) -> &str {
        self.get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> &str {
        self.headers().request_id()
    }
}

/// Ordered request parameters for one HTTP request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    entries: Vec<(String, String)>,
}

impl RequestParams {
    /// Parameters from a query string and an optional form body, query first.
    pub fn parse(query: Option<&str>, form: Option<&[u8]>) -> Self {
        let mut entries: Vec<(String, String)> = query
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        if let Some(body) = form {
            entries.extend(form_urlencoded::parse(body).into_owned());
        }
        Self { entries }
    }

    /// Read query and form parameters from a request, consuming its body.
    pub async fn from_request(request: Request<Body>, limit: usize) -> Result<Self, BridgeError> {
        let (parts, body) = request.into_parts();
        let is_form = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false);

        let bytes = to_bytes(body, limit)
            .await
            .map_err(|e| BridgeError::InvalidBody(e.to_string()))?;

        let form = if is_form { Some(bytes.as_ref()) } else { None };
        Ok(Self::parse(parts.uri.query(), form))
    }

    /// Last value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `name`, in wire order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Flat string-keyed JSON object. Duplicate names keep the last value.
    pub fn to_payload(&self) -> Value {
        let mut object = Map::new();
        for (name, value) in &self.entries {
            object.insert(name.clone(), Value::String(value.clone()));
        }
        Value::Object(object)
    }
}
