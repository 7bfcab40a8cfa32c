//! In-memory session store with inactivity expiry.

use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use uuid::Uuid;

use crate::observability::metrics;

/// Opaque session token exchanged through the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix safe to put in logs.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a session for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    id: SessionId,
}

impl SessionHandle {
    pub fn id(&self) -> &SessionId {
        &self.id
    }
}

/// Outcome of looking a token up.
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub handle: SessionHandle,
    /// True when a new session was issued and the cookie must be set.
    pub created: bool,
}

struct SessionRecord {
    attributes: HashMap<String, Value>,
    last_accessed: Instant,
}

impl SessionRecord {
    fn new(now: Instant) -> Self {
        Self {
            attributes: HashMap::new(),
            last_accessed: now,
        }
    }

    fn is_expired(&self, now: Instant, timeout: Duration) -> bool {
        now.duration_since(self.last_accessed) >= timeout
    }
}

/// Keyed session store shared by every handler.
///
/// Mutations of one session go through its map entry guard, so concurrent
/// requests carrying the same cookie are serialized per session while
/// different sessions proceed independently.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<DashMap<SessionId, SessionRecord>>,
    timeout: Duration,
}

impl SessionStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Look up the session named by `token`, issuing a new one when the token
    /// is absent, unknown or expired. Expired sessions are never revived.
    pub fn resolve(&self, token: Option<&str>) -> ResolvedSession {
        let now = Instant::now();
        if let Some(token) = token {
            let id = SessionId(token.to_string());
            let live = match self.inner.get_mut(&id) {
                Some(mut record) if !record.is_expired(now, self.timeout) => {
                    record.last_accessed = now;
                    true
                }
                _ => false,
            };
            if live {
                return ResolvedSession {
                    handle: SessionHandle { id },
                    created: false,
                };
            }
            if self
                .inner
                .remove_if(&id, |_, record| record.is_expired(now, self.timeout))
                .is_some()
            {
                tracing::debug!(session = %id.short(), "Session expired, replacing");
            }
        }

        let id = SessionId::generate();
        self.inner.insert(id.clone(), SessionRecord::new(now));
        metrics::record_sessions_active(self.inner.len());
        tracing::debug!(session = %id.short(), "Session created");
        ResolvedSession {
            handle: SessionHandle { id },
            created: true,
        }
    }

    /// Read an attribute. Unknown or expired sessions read as absent.
    pub fn get(&self, handle: &SessionHandle, key: &str) -> Option<Value> {
        let now = Instant::now();
        let mut record = self.inner.get_mut(&handle.id)?;
        if record.is_expired(now, self.timeout) {
            return None;
        }
        record.last_accessed = now;
        record.attributes.get(key).cloned()
    }

    /// Write an attribute. Returns false if the session is gone or expired.
    pub fn set(&self, handle: &SessionHandle, key: impl Into<String>, value: Value) -> bool {
        let now = Instant::now();
        match self.inner.get_mut(&handle.id) {
            Some(mut record) if !record.is_expired(now, self.timeout) => {
                record.last_accessed = now;
                record.attributes.insert(key.into(), value);
                true
            }
            _ => false,
        }
    }

    /// Remove an attribute, returning its previous value.
    pub fn remove(&self, handle: &SessionHandle, key: &str) -> Option<Value> {
        let now = Instant::now();
        let mut record = self.inner.get_mut(&handle.id)?;
        if record.is_expired(now, self.timeout) {
            return None;
        }
        record.last_accessed = now;
        record.attributes.remove(key)
    }

    /// Destroy a session explicitly.
    pub fn invalidate(&self, handle: &SessionHandle) -> bool {
        let removed = self.inner.remove(&handle.id).is_some();
        if removed {
            metrics::record_sessions_active(self.inner.len());
        }
        removed
    }

    /// Number of stored sessions, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drop every expired session. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner
            .retain(|_, record| !record.is_expired(now, self.timeout));
        let removed = before.saturating_sub(self.inner.len());
        metrics::record_sessions_active(self.inner.len());
        removed
    }

    /// Run `sweep_expired` every `interval` until shutdown.
    pub fn spawn_sweeper(
        &self,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = store.sweep_expired();
                        if removed > 0 {
                            tracing::debug!(removed, remaining = store.len(), "Expired sessions swept");
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!("Session sweeper stopping");
                        break;
                    }
                }
            }
        })
    }
}
