//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the catch-all gateway handler
//! - Wire up middleware (request id, tracing, body limit, timeout)
//! - Dispatch each request to exactly one handler via the gateway router
//! - Resolve sessions for bridged requests
//! - Serve with graceful shutdown and run the session sweeper

use axum::{
    body::Body,
    extract::{FromRequestParts, State, WebSocketUpgrade},
    http::{HeaderName, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::bus::{BusError, EventBus};
use crate::config::GatewayConfig;
use crate::http::bridge::BusBridge;
use crate::http::request::{RequestIdExt, X_REQUEST_ID};
use crate::http::static_files::StaticResolver;
use crate::http::status::status_response;
use crate::http::websocket::SocketBridge;
use crate::observability::metrics;
use crate::routing::{GatewayRouter, RouteTarget, RoutingError};
use crate::session::{SessionCorrelator, SessionStore};

/// Reasons the server cannot be assembled.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error("invalid bus configuration: {0}")]
    Bus(#[from] BusError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<GatewayRouter>,
    pub statics: StaticResolver,
    pub bridge: BusBridge,
    pub sockets: SocketBridge,
    pub sessions: SessionCorrelator,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    sessions: SessionCorrelator,
    stop: broadcast::Receiver<()>,
    sweeper_stop: broadcast::Receiver<()>,
}

impl HttpServer {
    /// Assemble the server around a shared event bus.
    ///
    /// `shutdown` is the broadcast the server, the session sweeper and every
    /// socket bridge listen on. The server subscribes here, so a signal sent
    /// any time after construction is seen.
    pub fn new(
        config: GatewayConfig,
        bus: EventBus,
        shutdown: broadcast::Sender<()>,
    ) -> Result<Self, ServerError> {
        let router = Arc::new(GatewayRouter::from_config(&config)?);
        let store = SessionStore::new(config.session.timeout());
        let sessions = SessionCorrelator::from_config(store, &config.session);
        let bridge = BusBridge::from_config(bus.clone(), sessions.clone(), &config)?;
        let stop = shutdown.subscribe();
        let sweeper_stop = shutdown.subscribe();
        let sockets = SocketBridge::from_config(bus, &config.socket_bridge, &config.bus, shutdown);

        let state = AppState {
            router,
            statics: StaticResolver::new(&config.static_files.resource_root),
            bridge,
            sockets,
            sessions: sessions.clone(),
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            sessions,
            stop,
            sweeper_stop,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let request_id = HeaderName::from_static(X_REQUEST_ID);
        Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::new(request_id))
                    .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.timeouts.request_secs,
                    ))),
            )
    }

    /// The fully layered router, for driving the gateway without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn sessions(&self) -> &SessionCorrelator {
        &self.sessions
    }

    /// Run the server, accepting connections on the given listener until
    /// the shutdown broadcast fires.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let sweeper = self
            .sessions
            .store()
            .spawn_sweeper(self.config.session.sweep_interval(), self.sweeper_stop);

        let mut shutdown = self.stop;
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        let _ = sweeper.await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Catch-all handler. Looks up the route and hands the request to its
/// handler family exactly once.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request.request_id().to_string();
    let path = request.uri().path().to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %request.method(),
        path = %path,
        "Dispatching request"
    );

    let Some(route) = state.router.match_request(&request).cloned() else {
        tracing::debug!(request_id = %request_id, path = %path, "No route matched");
        metrics::record_request("none", StatusCode::NOT_FOUND.as_u16(), start);
        return StatusCode::NOT_FOUND.into_response();
    };

    let response = match route.target {
        RouteTarget::Status => status_response(),
        RouteTarget::Static => match state.statics.resolve(route.remainder(&path)).await {
            Ok(asset) => asset.into_response(),
            Err(e) => e.into_response(),
        },
        RouteTarget::Bus => {
            let scope = state.sessions.resolve_session(request.headers());
            let response = state.bridge.handle(scope.handle.clone(), request).await;
            scope.finish(response)
        }
        RouteTarget::SocketBridge => {
            let scope = state.sessions.resolve_session(request.headers());
            let (mut parts, _body) = request.into_parts();
            let response = match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
                Ok(upgrade) => {
                    let sockets = state.sockets.clone();
                    let handle = scope.handle.clone();
                    upgrade.on_upgrade(move |socket| sockets.serve(socket, handle))
                }
                Err(rejection) => rejection.into_response(),
            };
            scope.finish(response)
        }
    };

    let status = response.status().as_u16();
    tracing::debug!(
        request_id = %request_id,
        route = route.name,
        status,
        "Request completed"
    );
    metrics::record_request(route.name, status, start);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Address;
    use axum::http::header;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn server(root: &TempDir) -> (HttpServer, EventBus) {
        server_with(root, |_| {})
    }

    fn server_with(
        root: &TempDir,
        configure: impl FnOnce(&mut GatewayConfig),
    ) -> (HttpServer, EventBus) {
        let mut config = GatewayConfig::default();
        config.static_files.resource_root = root.path().to_string_lossy().into_owned();
        config.bus.reply_timeout_ms = 500;
        configure(&mut config);
        let bus = EventBus::default();
        let (shutdown, _) = broadcast::channel(1);
        let server = HttpServer::new(config, bus.clone(), shutdown).unwrap();
        (server, bus)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_status_page() {
        let root = TempDir::new().unwrap();
        let (server, _) = server(&root);

        let response = server.router().oneshot(get("/status")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
        assert!(response.headers().contains_key(X_REQUEST_ID));

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], crate::http::status::STATUS_BODY.as_bytes());
    }

    #[tokio::test]
    async fn test_unrouted_is_not_found() {
        let root = TempDir::new().unwrap();
        let (server, _) = server(&root);

        let response = server.router().oneshot(get("/elsewhere")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_static_html() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("index.html"), "<p>hi</p>").unwrap();
        let (server, _) = server(&root);

        let response = server
            .router()
            .oneshot(get("/static/index.html"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");

        let missing = server.router().oneshot(get("/static/gone.html")).await.unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        let body = axum::body::to_bytes(missing.into_body(), 1024).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_bus_post_issues_session_cookie() {
        let root = TempDir::new().unwrap();
        let (server, bus) = server(&root);
        let mut consumer = bus.consumer(Address::new("greet").unwrap());
        tokio::spawn(async move {
            while let Some(message) = consumer.recv().await {
                message.reply("hello");
            }
        });

        let request = Request::builder()
            .method("POST")
            .uri("/bus/greet?name=alice")
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("gateway.session="));
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let root = TempDir::new().unwrap();
        let (server, bus) = server_with(&root, |config| config.security.max_body_size = 16);
        let mut consumer = bus.consumer(Address::new("greet").unwrap());

        let form = "name=".to_string() + &"a".repeat(64);
        let request = Request::builder()
            .method("POST")
            .uri("/bus/greet")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::CONTENT_LENGTH, form.len())
            .body(Body::from(form))
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(consumer.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_socket_path_without_upgrade_is_rejected() {
        let root = TempDir::new().unwrap();
        let (server, _) = server(&root);

        let response = server
            .router()
            .oneshot(get("/eventbus/websocket"))
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}
