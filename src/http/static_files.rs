//! Static resource resolution.
//!
//! # Responsibilities
//! - Map a path below the static mount to a file under the resource root
//! - Refuse anything that would escape the root
//! - Pick a content type from the file suffix
//!
//! # Design Decisions
//! - Traversal attempts are reported as not found
//! - Unknown suffixes still answer 200 with an HTML notice
//! - A read failure is a 502 with an empty body, distinct from a 404

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Resolution failures.
#[derive(Debug, Error)]
pub enum StaticError {
    #[error("resource '{0}' not found")]
    NotFound(String),

    #[error("resource '{0}' escapes the resource root")]
    Forbidden(String),

    #[error("failed to read resource '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl StaticError {
    pub fn status(&self) -> StatusCode {
        match self {
            StaticError::NotFound(_) | StaticError::Forbidden(_) => StatusCode::NOT_FOUND,
            StaticError::Read { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for StaticError {
    fn into_response(self) -> Response {
        match &self {
            StaticError::Read { .. } => tracing::error!(error = %self, "Static resource read failed"),
            StaticError::Forbidden(_) => tracing::warn!(error = %self, "Static path rejected"),
            StaticError::NotFound(_) => tracing::debug!(error = %self, "Static resource missing"),
        }
        self.status().into_response()
    }
}

/// Content type decided by suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Css,
    Unknown,
}

impl ContentKind {
    pub fn from_path(path: &str) -> Self {
        if path.ends_with(".html") {
            ContentKind::Html
        } else if path.ends_with(".css") {
            ContentKind::Css
        } else {
            ContentKind::Unknown
        }
    }
}

/// A resolved resource.
#[derive(Debug)]
pub struct StaticAsset {
    pub path: String,
    pub kind: ContentKind,
    pub bytes: Vec<u8>,
}

impl IntoResponse for StaticAsset {
    fn into_response(self) -> Response {
        match self.kind {
            ContentKind::Html => ([(header::CONTENT_TYPE, "text/html")], self.bytes).into_response(),
            ContentKind::Css => ([(header::CONTENT_TYPE, "text/css")], self.bytes).into_response(),
            ContentKind::Unknown => (
                [(header::CONTENT_TYPE, "text/html")],
                format!("<html><body>Error filetype unknown: {}</body></html>", self.path),
            )
                .into_response(),
        }
    }
}

/// Resolves request paths against a resource root.
#[derive(Debug, Clone)]
pub struct StaticResolver {
    root: PathBuf,
}

impl StaticResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `relative` (the path after the mount prefix) and read it.
    pub async fn resolve(&self, relative: &str) -> Result<StaticAsset, StaticError> {
        let relative = relative.trim_start_matches('/');
        let candidate = self.confine(relative)?;

        let root = tokio::fs::canonicalize(&self.root)
            .await
            .map_err(|_| StaticError::NotFound(relative.to_string()))?;
        let resolved = match tokio::fs::canonicalize(&candidate).await {
            Ok(path) => path,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StaticError::NotFound(relative.to_string()))
            }
            Err(e) => {
                return Err(StaticError::Read {
                    path: relative.to_string(),
                    source: e,
                })
            }
        };
        // Symlinks may still point outside the root.
        if !resolved.starts_with(&root) {
            return Err(StaticError::Forbidden(relative.to_string()));
        }
        let metadata = tokio::fs::metadata(&resolved)
            .await
            .map_err(|e| StaticError::Read {
                path: relative.to_string(),
                source: e,
            })?;
        if metadata.is_dir() {
            return Err(StaticError::NotFound(relative.to_string()));
        }

        let bytes = tokio::fs::read(&resolved).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StaticError::NotFound(relative.to_string()),
            _ => StaticError::Read {
                path: relative.to_string(),
                source: e,
            },
        })?;

        Ok(StaticAsset {
            path: relative.to_string(),
            kind: ContentKind::from_path(relative),
            bytes,
        })
    }

    /// Join `relative` onto the root, rejecting every component but plain names.
    fn confine(&self, relative: &str) -> Result<PathBuf, StaticError> {
        if relative.is_empty() {
            return Err(StaticError::NotFound(String::new()));
        }
        let mut path = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(StaticError::Forbidden(relative.to_string()))
                }
            }
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn webroot() -> (TempDir, StaticResolver) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>hi</html>").unwrap();
        std::fs::create_dir(dir.path().join("css")).unwrap();
        std::fs::write(dir.path().join("css/site.css"), "body{}").unwrap();
        std::fs::write(dir.path().join("logo.png"), [0u8, 1, 2]).unwrap();
        let resolver = StaticResolver::new(dir.path());
        (dir, resolver)
    }

    #[tokio::test]
    async fn test_html_and_css() {
        let (_dir, resolver) = webroot();

        let html = resolver.resolve("index.html").await.unwrap();
        assert_eq!(html.kind, ContentKind::Html);
        assert_eq!(html.bytes, b"<html>hi</html>");

        let css = resolver.resolve("/css/site.css").await.unwrap();
        assert_eq!(css.kind, ContentKind::Css);
    }

    #[tokio::test]
    async fn test_unknown_suffix_notice() {
        let (_dir, resolver) = webroot();
        let response = resolver.resolve("logo.png").await.unwrap().into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
    }

    #[tokio::test]
    async fn test_missing_is_not_found() {
        let (_dir, resolver) = webroot();
        let err = resolver.resolve("nope.html").await.unwrap_err();
        assert!(matches!(err, StaticError::NotFound(_)));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_directory_is_not_found() {
        let (_dir, resolver) = webroot();
        let err = resolver.resolve("css").await.unwrap_err();
        assert!(matches!(err, StaticError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let (dir, _) = webroot();
        let inner = dir.path().join("public");
        std::fs::create_dir(&inner).unwrap();
        let resolver = StaticResolver::new(&inner);

        for path in ["../index.html", "a/../../index.html", "/etc/passwd"] {
            let err = resolver.resolve(path).await.unwrap_err();
            assert_eq!(err.status(), StatusCode::NOT_FOUND, "{path}");
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_out_of_root_rejected() {
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret.html"), "secret").unwrap();
        let (dir, resolver) = webroot();
        std::os::unix::fs::symlink(
            outside.path().join("secret.html"),
            dir.path().join("leak.html"),
        )
        .unwrap();
        std::os::unix::fs::symlink(dir.path().join("index.html"), dir.path().join("home.html"))
            .unwrap();

        let err = resolver.resolve("leak.html").await.unwrap_err();
        assert!(matches!(err, StaticError::Forbidden(_)));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let inside = resolver.resolve("home.html").await.unwrap();
        assert_eq!(inside.bytes, b"<html>hi</html>");
    }

    #[tokio::test]
    async fn test_read_failure_is_bad_gateway() {
        let (_dir, resolver) = webroot();

        // A regular file used as a directory cannot be read through.
        let err = resolver.resolve("index.html/inner.html").await.unwrap_err();
        assert!(matches!(err, StaticError::Read { .. }), "{err:?}");
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        let body = axum::body::to_bytes(err.into_response().into_body(), 64)
            .await
            .unwrap();
        assert!(body.is_empty());
    }
}
