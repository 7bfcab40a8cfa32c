//! Session correlation subsystem.
//!
//! # Data Flow
//! ```text
//! Request Cookie header
//!     → cookie.rs (extract session token)
//!     → store.rs (live session? touch it : issue a new one)
//!     → SessionScope { handle, set_cookie }
//!     → handler reads/writes attributes through the store
//!     → SessionScope::finish appends Set-Cookie for new sessions
//! ```
//!
//! # Design Decisions
//! - Sessions live in process memory only
//! - Expiry is inactivity based and checked on every access; a sweep task
//!   reclaims sessions nobody comes back for
//! - Handlers hold a `SessionHandle` (an id), never the record itself

pub mod cookie;
pub mod store;

use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::Response;
use serde_json::Value;

use crate::config::SessionConfig;

pub use cookie::SessionCookie;
pub use store::{ResolvedSession, SessionHandle, SessionId, SessionStore};

/// Binds requests to sessions through the session cookie.
#[derive(Clone)]
pub struct SessionCorrelator {
    store: SessionStore,
    cookie: SessionCookie,
}

impl SessionCorrelator {
    pub fn new(store: SessionStore, cookie: SessionCookie) -> Self {
        Self { store, cookie }
    }

    pub fn from_config(store: SessionStore, config: &SessionConfig) -> Self {
        Self::new(store, SessionCookie::from_config(config))
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Resolve the session for a request's cookies.
    pub fn resolve_session(&self, headers: &HeaderMap) -> SessionScope {
        let token = self.cookie.read(headers);
        let resolved = self.store.resolve(token.as_deref());
        let set_cookie = if resolved.created {
            let value = self.cookie.issue(resolved.handle.id());
            if value.is_none() {
                tracing::warn!(cookie = %self.cookie.name(), "Session cookie not representable as a header");
            }
            value
        } else {
            None
        };
        SessionScope {
            handle: resolved.handle,
            set_cookie,
        }
    }

    pub fn get(&self, handle: &SessionHandle, key: &str) -> Option<Value> {
        self.store.get(handle, key)
    }

    pub fn set(&self, handle: &SessionHandle, key: impl Into<String>, value: Value) -> bool {
        self.store.set(handle, key, value)
    }
}

/// A session bound to one in-flight request.
#[derive(Debug, Clone)]
pub struct SessionScope {
    pub handle: SessionHandle,
    set_cookie: Option<HeaderValue>,
}

impl SessionScope {
    pub fn is_new(&self) -> bool {
        self.set_cookie.is_some()
    }

    /// Attach the `Set-Cookie` directive when the session was just issued.
    pub fn finish(self, mut response: Response) -> Response {
        if let Some(value) = self.set_cookie {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        response
    }
}
