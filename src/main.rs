//! HTTP to message-bus gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                     GATEWAY                          │
//!                    │                                                      │
//!   Client Request   │  ┌─────────┐    ┌──────────────┐                     │
//!   ─────────────────┼─▶│  http   │───▶│   routing    │                     │
//!                    │  │ server  │    │ (first match)│                     │
//!                    │  └─────────┘    └──────┬───────┘                     │
//!                    │        ┌───────────────┼───────────────┬──────────┐  │
//!                    │        ▼               ▼               ▼          ▼  │
//!                    │   ┌────────┐     ┌──────────┐    ┌─────────┐ ┌──────┐│
//!                    │   │ status │     │  static  │    │   bus   │ │socket││
//!                    │   └────────┘     │ resolver │    │ bridge  │ │bridge││
//!                    │                  └──────────┘    └────┬────┘ └──┬───┘│
//!                    │                        session ◀──────┤         │    │
//!                    │                                       ▼         ▼    │
//!                    │                                ┌─────────────────┐   │
//!                    │                                │    event bus    │   │
//!                    │                                └────────┬────────┘   │
//!                    │                                         ▼            │
//!                    │                                  ┌────────────┐      │     Data
//!                    │                                  │query relay │──────┼──▶ Service
//!                    │                                  └────────────┘      │
//!                    └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use bus_gateway::config::{load_config, GatewayConfig};
use bus_gateway::lifecycle;
use bus_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "bus-gateway")]
#[command(about = "Bridges HTTP requests onto an in-process message bus", long_about = None)]
struct Args {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "bus-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        static_root = %config.static_files.resource_root,
        datastore_enabled = config.datastore.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    lifecycle::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
