//! Route matching logic.
//!
//! # Responsibilities
//! - Match request path exactly or by prefix (case-sensitive)
//! - Optionally constrain the method
//! - Decide whether two routes could claim the same request
//!
//! # Design Decisions
//! - No regex to guarantee O(n) matching
//! - No method constraint = any method (wildcard)

use axum::body::Body;
use axum::http::{Method, Request};

/// Path part of a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// Whole path must be equal.
    Exact(String),
    /// Path must start with the prefix.
    Prefix(String),
}

impl PathPattern {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(expected) => path == expected,
            PathPattern::Prefix(prefix) => path.starts_with(prefix.as_str()),
        }
    }

    /// True if some path matches both patterns.
    pub fn overlaps(&self, other: &PathPattern) -> bool {
        match (self, other) {
            (PathPattern::Exact(a), PathPattern::Exact(b)) => a == b,
            (PathPattern::Exact(path), PathPattern::Prefix(prefix))
            | (PathPattern::Prefix(prefix), PathPattern::Exact(path)) => path.starts_with(prefix.as_str()),
            (PathPattern::Prefix(a), PathPattern::Prefix(b)) => a.starts_with(b.as_str()) || b.starts_with(a.as_str()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PathPattern::Exact(path) | PathPattern::Prefix(path) => path,
        }
    }
}

/// Method and path conditions combined with AND semantics.
#[derive(Debug, Clone)]
pub struct RouteMatcher {
    method: Option<Method>,
    path: PathPattern,
}

impl RouteMatcher {
    pub fn new(method: Option<Method>, path: PathPattern) -> Self {
        Self { method, path }
    }

    pub fn exact(method: Method, path: impl Into<String>) -> Self {
        Self::new(Some(method), PathPattern::Exact(path.into()))
    }

    pub fn prefix(method: Option<Method>, prefix: impl Into<String>) -> Self {
        Self::new(method, PathPattern::Prefix(prefix.into()))
    }

    pub fn path(&self) -> &PathPattern {
        &self.path
    }

    pub fn matches(&self, req: &Request<Body>) -> bool {
        self.matches_parts(req.method(), req.uri().path())
    }

    pub fn matches_parts(&self, method: &Method, path: &str) -> bool {
        let method_ok = self.method.as_ref().map_or(true, |m| m == method);
        method_ok && self.path.matches(path)
    }

    /// True if some request would match both matchers.
    pub fn overlaps(&self, other: &RouteMatcher) -> bool {
        let methods_overlap = match (&self.method, &other.method) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        methods_overlap && self.path.overlaps(&other.path)
    }
}
