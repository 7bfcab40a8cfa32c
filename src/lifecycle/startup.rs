//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Bind the listener last, once everything behind it is ready
//! - Tear down in reverse: drain HTTP, stop the relay, close the data service
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::bus::{Address, BusError, EventBus};
use crate::config::validation::validate_config;
use crate::config::{ConfigError, GatewayConfig};
use crate::datastore::{self, DataStore, DataStoreError};
use crate::http::{HttpServer, ServerError};
use crate::lifecycle::{spawn_signal_handler, Shutdown};
use crate::relay::QueryRelay;
use crate::session::SessionCorrelator;

/// Reasons the gateway failed to start or stopped abnormally.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid query address: {0}")]
    QueryAddress(#[from] BusError),

    #[error("data service client: {0}")]
    DataStore(#[from] DataStoreError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("server error: {0}")]
    Io(#[from] io::Error),
}

/// A started gateway: every subsystem initialized and the listener bound.
pub struct Gateway {
    bus: EventBus,
    store: Arc<dyn DataStore>,
    relay: JoinHandle<()>,
    server: HttpServer,
    listener: TcpListener,
    shutdown: Shutdown,
}

impl Gateway {
    /// Bring up the bus, data service, query relay and HTTP server.
    pub async fn start(config: GatewayConfig, shutdown: Shutdown) -> Result<Self, StartupError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let bus = EventBus::new(config.bus.consumer_buffer);

        let store = datastore::connect(&config.datastore).await?;
        let query_address = Address::new(config.bus.query_address.clone())?;
        let relay = QueryRelay::new(bus.clone(), store.clone(), query_address)
            .spawn(shutdown.subscribe());

        let server = HttpServer::new(config.clone(), bus.clone(), shutdown.sender())?;

        let address = config.listener.bind_address.clone();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| StartupError::Bind { address, source })?;
        tracing::info!(
            address = %listener.local_addr()?,
            reply_timeout_ms = config.bus.reply_timeout_ms,
            session_timeout_ms = config.session.timeout_ms,
            "Gateway ready"
        );

        Ok(Self {
            bus,
            store,
            relay,
            server,
            listener,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The gateway's bus, for registering in-process consumers.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn sessions(&self) -> &SessionCorrelator {
        self.server.sessions()
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Serve until shutdown, then release the data service.
    pub async fn serve(self) -> Result<(), StartupError> {
        let result = self.server.run(self.listener).await;

        // The server only returns early on error; make sure the rest stops too.
        self.shutdown.trigger();
        if let Err(e) = self.relay.await {
            tracing::warn!(error = %e, "Query relay ended abnormally");
        }
        self.store.shutdown().await;
        tracing::info!("Gateway stopped");

        result.map_err(StartupError::from)
    }
}

/// Start the gateway and serve until SIGINT or SIGTERM.
pub async fn run(config: GatewayConfig) -> Result<(), StartupError> {
    let shutdown = Shutdown::new();
    let gateway = Gateway::start(config, shutdown.clone()).await?;
    spawn_signal_handler(shutdown);
    gateway.serve().await
}
