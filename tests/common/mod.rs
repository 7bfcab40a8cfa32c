//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;

use bus_gateway::config::GatewayConfig;
use bus_gateway::lifecycle::{Gateway, Shutdown, StartupError};
use bus_gateway::session::SessionCorrelator;
use bus_gateway::EventBus;

/// A gateway serving on an ephemeral port with a temporary resource root.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub bus: EventBus,
    pub sessions: SessionCorrelator,
    pub shutdown: Shutdown,
    pub webroot: TempDir,
    task: JoinHandle<Result<(), StartupError>>,
}

impl TestGateway {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the gateway to drain.
    #[allow(dead_code)]
    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.task).await;
    }
}

/// Default test configuration: loopback, ephemeral port, short reply deadline.
pub fn test_config(webroot: &Path) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.static_files.resource_root = webroot.to_string_lossy().into_owned();
    config.bus.reply_timeout_ms = 300;
    config.socket_bridge.outbound_permitted = vec!["news".into()];
    config
}

/// Start a gateway with `configure` applied on top of [`test_config`].
pub async fn start_gateway<F>(configure: F) -> TestGateway
where
    F: FnOnce(&mut GatewayConfig),
{
    let webroot = TempDir::new().unwrap();
    std::fs::write(
        webroot.path().join("index.html"),
        "<html><body>home</body></html>",
    )
    .unwrap();
    std::fs::write(webroot.path().join("site.css"), "body { margin: 0 }").unwrap();

    let mut config = test_config(webroot.path());
    configure(&mut config);

    let shutdown = Shutdown::new();
    let gateway = Gateway::start(config, shutdown.clone()).await.unwrap();
    let addr = gateway.local_addr().unwrap();
    let bus = gateway.bus().clone();
    let sessions = gateway.sessions().clone();
    let task = tokio::spawn(gateway.serve());

    TestGateway {
        addr,
        bus,
        sessions,
        shutdown,
        webroot,
        task,
    }
}
