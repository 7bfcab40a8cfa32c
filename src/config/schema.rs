//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Event bus and bridge settings.
    pub bus: BusConfig,

    /// Session cookie and store settings.
    pub session: SessionConfig,

    /// Static resource settings.
    pub static_files: StaticFilesConfig,

    /// WebSocket bus bridge settings.
    pub socket_bridge: SocketBridgeConfig,

    /// Backend data service connection.
    pub datastore: DataStoreConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Request limits.
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Ceiling for a whole HTTP request in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Event bus configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BusConfig {
    /// Deadline for every bridged request/reply round trip, in milliseconds.
    pub reply_timeout_ms: u64,

    /// Path prefix stripped from `/bus/<address>` requests.
    pub mount_prefix: String,

    /// Address notified when a bridged request fails.
    pub invalid_credentials_address: String,

    /// Address served by the query relay.
    pub query_address: String,

    /// Queue depth of each registered consumer.
    pub consumer_buffer: usize,
}

impl BusConfig {
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            reply_timeout_ms: 5_000,
            mount_prefix: "/bus/".to_string(),
            invalid_credentials_address: "loginForm".to_string(),
            query_address: "datastore.query".to_string(),
            consumer_buffer: 256,
        }
    }
}

/// Session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the session cookie.
    pub cookie_name: String,

    /// `Path` attribute of the session cookie.
    pub cookie_path: String,

    /// Inactivity window in milliseconds.
    ///
    /// The unit is milliseconds on purpose: legacy deployments carried
    /// `5000000` here believing it meant five minutes. It means 83m20s.
    pub timeout_ms: u64,

    /// Interval of the expiry sweep in seconds.
    pub sweep_interval_secs: u64,

    /// Session attribute that receives a successful bus reply.
    pub reply_attribute: String,
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "gateway.session".to_string(),
            cookie_path: "/".to_string(),
            timeout_ms: 30 * 60 * 1_000,
            sweep_interval_secs: 60,
            reply_attribute: "pendingSessionToken".to_string(),
        }
    }
}

/// Static resource configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    /// Directory that static paths resolve against.
    pub resource_root: String,

    /// Path prefix stripped from static requests.
    pub mount_prefix: String,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            resource_root: "webroot".to_string(),
            mount_prefix: "/static/".to_string(),
        }
    }
}

/// WebSocket bridge configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SocketBridgeConfig {
    /// Mount the bridge at all.
    pub enabled: bool,

    /// Path prefix of the WebSocket endpoint.
    pub mount_prefix: String,

    /// Addresses browsers may send to.
    pub inbound_permitted: Vec<String>,

    /// Addresses browsers may register on.
    pub outbound_permitted: Vec<String>,
}

impl Default for SocketBridgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mount_prefix: "/eventbus/".to_string(),
            inbound_permitted: vec!["browserInput".to_string()],
            outbound_permitted: Vec::new(),
        }
    }
}

/// Backend data service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DataStoreConfig {
    /// Connect at startup.
    pub enabled: bool,

    /// Query service endpoint URL.
    pub endpoint: String,

    pub username: String,

    pub password: String,

    /// Query deadline in seconds.
    pub timeout_secs: u64,
}

impl Default for DataStoreConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:8093/query/service".to_string(),
            username: "Administrator".to_string(),
            // WARNING: This is a placeholder! Change this in production.
            password: "password".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}
