//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, timeout, tracing)
//!     → routing::GatewayRouter (first matching mount wins, else 404)
//!     → status.rs       GET /status
//!     → static_files.rs GET /static/<path>
//!     → bridge.rs       POST /bus/<address>   (session resolved first)
//!     → websocket.rs    /eventbus/ upgrade    (session resolved first)
//!     → response.rs (status mapping, reply rendering)
//!     → Send to client
//! ```

pub mod bridge;
pub mod request;
pub mod response;
pub mod server;
pub mod static_files;
pub mod status;
pub mod websocket;

pub use bridge::BusBridge;
pub use request::{RequestIdExt, RequestParams, X_REQUEST_ID};
pub use response::BridgeError;
pub use server::{AppState, HttpServer, ServerError};
pub use static_files::{StaticError, StaticResolver};
pub use websocket::{BridgeOptions, SocketBridge};
