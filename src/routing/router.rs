//! Route table and dispatch lookup.
//!
//! # Responsibilities
//! - Store routes in registration order
//! - Reject registrations that could claim the same request
//! - Return matched route or explicit no-match

use axum::body::Body;
use axum::http::{Method, Request};
use thiserror::Error;

use crate::config::GatewayConfig;
use crate::routing::matcher::RouteMatcher;
use crate::routing::STATUS_PATH;

/// Handler family a route dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    Status,
    Static,
    Bus,
    SocketBridge,
}

/// A registered route.
#[derive(Debug, Clone)]
pub struct Route {
    /// Route identifier for logging/metrics.
    pub name: &'static str,
    pub target: RouteTarget,
    matcher: RouteMatcher,
}

impl Route {
    pub fn new(name: &'static str, target: RouteTarget, matcher: RouteMatcher) -> Self {
        Self {
            name,
            target,
            matcher,
        }
    }

    /// Mount point of the route (the exact path or the prefix).
    pub fn mount(&self) -> &str {
        self.matcher.path().as_str()
    }

    /// Part of `path` after the mount point.
    pub fn remainder<'a>(&self, path: &'a str) -> &'a str {
        path.strip_prefix(self.mount()).unwrap_or("")
    }
}

/// Route registration failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("route '{route}' ({mount}) is ambiguous with route '{existing}'")]
    Ambiguous {
        route: &'static str,
        mount: String,
        existing: &'static str,
    },
}

/// Ordered, immutable-after-startup route table.
#[derive(Debug, Default)]
pub struct GatewayRouter {
    routes: Vec<Route>,
}

impl GatewayRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the gateway's standard table from configuration.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, RoutingError> {
        let mut router = Self::new();
        router.register(Route::new(
            "status",
            RouteTarget::Status,
            RouteMatcher::exact(Method::GET, STATUS_PATH),
        ))?;
        router.register(Route::new(
            "static",
            RouteTarget::Static,
            RouteMatcher::prefix(Some(Method::GET), &config.static_files.mount_prefix),
        ))?;
        router.register(Route::new(
            "bus",
            RouteTarget::Bus,
            RouteMatcher::prefix(Some(Method::POST), &config.bus.mount_prefix),
        ))?;
        if config.socket_bridge.enabled {
            router.register(Route::new(
                "socket_bridge",
                RouteTarget::SocketBridge,
                RouteMatcher::prefix(None, &config.socket_bridge.mount_prefix),
            ))?;
        }
        Ok(router)
    }

    /// Append a route. Fails if it could match a request an earlier route matches.
    pub fn register(&mut self, route: Route) -> Result<(), RoutingError> {
        if let Some(existing) = self
            .routes
            .iter()
            .find(|r| r.matcher.overlaps(&route.matcher))
        {
            return Err(RoutingError::Ambiguous {
                route: route.name,
                mount: route.mount().to_string(),
                existing: existing.name,
            });
        }
        tracing::debug!(route = route.name, mount = %route.mount(), "Route registered");
        self.routes.push(route);
        Ok(())
    }

    /// First route matching the request, in registration order.
    pub fn match_request(&self, req: &Request<Body>) -> Option<&Route> {
        self.routes.iter().find(|r| r.matcher.matches(req))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}
