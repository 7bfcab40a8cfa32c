//! Session cookie parsing and emission.

use axum::http::{header, HeaderMap, HeaderValue};
use std::time::Duration;

use crate::config::SessionConfig;
use crate::session::store::SessionId;

/// Name, path and lifetime of the session cookie.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    name: String,
    path: String,
    max_age: Duration,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, path: impl Into<String>, max_age: Duration) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            max_age,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(&config.cookie_name, &config.cookie_path, config.timeout())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of the session cookie in the request, if any.
    ///
    /// All `Cookie` headers are scanned; the last matching pair wins.
    pub fn read(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(name, _)| *name == self.name)
            .map(|(_, value)| value.trim_matches('"').to_string())
            .filter(|value| !value.is_empty())
            .last()
    }

    /// `Set-Cookie` value issuing `id`.
    pub fn issue(&self, id: &SessionId) -> Option<HeaderValue> {
        let value = format!(
            "{}={}; Path={}; Max-Age={}; HttpOnly; SameSite=Lax",
            self.name,
            id,
            self.path,
            self.max_age.as_secs().max(1)
        );
        HeaderValue::from_str(&value).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::store::SessionStore;

    fn cookie() -> SessionCookie {
        SessionCookie::new("User123", "/something", Duration::from_secs(1800))
    }

    #[test]
    fn test_read_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("myCookie=x; User123=abc123; othercookie=somevalue"),
        );
        assert_eq!(cookie().read(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn test_read_across_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::COOKIE, HeaderValue::from_static("User123=\"quoted\""));
        assert_eq!(cookie().read(&headers), Some("quoted".to_string()));
    }

    #[test]
    fn test_read_missing_or_empty() {
        let mut headers = HeaderMap::new();
        assert_eq!(cookie().read(&headers), None);
        headers.insert(header::COOKIE, HeaderValue::from_static("User123=; User1234=x"));
        assert_eq!(cookie().read(&headers), None);
    }

    #[tokio::test]
    async fn test_issue_attributes() {
        let store = SessionStore::new(Duration::from_secs(60));
        let session = store.resolve(None);
        let value = cookie().issue(session.handle.id()).unwrap();
        let value = value.to_str().unwrap();

        assert!(value.starts_with(&format!("User123={};", session.handle.id())));
        assert!(value.contains("Path=/something"));
        assert!(value.contains("Max-Age=1800"));
        assert!(value.contains("HttpOnly"));
    }
}
