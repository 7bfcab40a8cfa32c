//! HTTP to message-bus gateway library.

pub mod bus;
pub mod config;
pub mod datastore;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod relay;
pub mod routing;
pub mod session;

pub use bus::{Address, EventBus};
pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::{Gateway, Shutdown};
