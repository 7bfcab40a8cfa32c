//! WebSocket bus bridge.
//!
//! # Responsibilities
//! - Upgrade requests under the socket mount
//! - Let browsers send to inbound-permitted addresses
//! - Let browsers register on outbound-permitted addresses
//! - Write replies and forwarded messages back as JSON frames
//!
//! # Data Flow
//! ```text
//! Browser ──frame──→ SocketBridge ──allow-list──→ EventBus
//! Browser ←─frame─── writer task  ←── forwarders ←── consumers
//! ```
//!
//! # Design Decisions
//! - Addresses outside the allow-lists never see bus traffic
//! - One writer task owns the sink; everything else queues frames to it
//! - Registrations die with the connection

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::bus::{Address, BusError, EventBus};
use crate::config::{BusConfig, SocketBridgeConfig};
use crate::http::bridge::reply_within;
use crate::http::response::bus_status;
use crate::session::SessionHandle;

const OUTBOUND_QUEUE: usize = 64;

/// Frames accepted from the browser.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    Send {
        address: String,
        #[serde(default)]
        body: Value,
        #[serde(default, rename = "replyAddress")]
        reply_address: Option<String>,
    },
    Register {
        address: String,
    },
    Unregister {
        address: String,
    },
    Ping,
}

/// Frames written to the browser.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    Rec {
        address: String,
        body: Value,
    },
    Err {
        #[serde(rename = "failureCode", skip_serializing_if = "Option::is_none")]
        failure_code: Option<u16>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        body: Option<String>,
    },
    Pong,
}

impl ServerFrame {
    fn rejected(reason: &str) -> Self {
        ServerFrame::Err {
            failure_code: None,
            message: None,
            body: Some(reason.to_string()),
        }
    }

    fn failed(error: &BusError) -> Self {
        ServerFrame::Err {
            failure_code: Some(bus_status(error).as_u16()),
            message: Some(error.to_string()),
            body: None,
        }
    }
}

/// Which addresses the bridge exposes.
#[derive(Debug, Clone, Default)]
pub struct BridgeOptions {
    inbound: HashSet<String>,
    outbound: HashSet<String>,
}

impl BridgeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SocketBridgeConfig) -> Self {
        Self {
            inbound: config.inbound_permitted.iter().cloned().collect(),
            outbound: config.outbound_permitted.iter().cloned().collect(),
        }
    }

    pub fn permit_inbound(mut self, address: impl Into<String>) -> Self {
        self.inbound.insert(address.into());
        self
    }

    pub fn permit_outbound(mut self, address: impl Into<String>) -> Self {
        self.outbound.insert(address.into());
        self
    }

    pub fn inbound_permitted(&self, address: &str) -> bool {
        self.inbound.contains(address)
    }

    pub fn outbound_permitted(&self, address: &str) -> bool {
        self.outbound.contains(address)
    }
}

/// Serves socket connections against the event bus.
#[derive(Clone)]
pub struct SocketBridge {
    bus: EventBus,
    options: Arc<BridgeOptions>,
    reply_timeout: Duration,
    shutdown: broadcast::Sender<()>,
}

impl SocketBridge {
    pub fn new(
        bus: EventBus,
        options: BridgeOptions,
        reply_timeout: Duration,
        shutdown: broadcast::Sender<()>,
    ) -> Self {
        Self {
            bus,
            options: Arc::new(options),
            reply_timeout,
            shutdown,
        }
    }

    pub fn from_config(
        bus: EventBus,
        bridge: &SocketBridgeConfig,
        bus_config: &BusConfig,
        shutdown: broadcast::Sender<()>,
    ) -> Self {
        Self::new(
            bus,
            BridgeOptions::from_config(bridge),
            bus_config.reply_timeout(),
            shutdown,
        )
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    /// Drive one upgraded connection until either side closes or shutdown fires.
    pub async fn serve(self, socket: WebSocket, session: SessionHandle) {
        let session_id = session.id().short().to_string();
        tracing::info!(session = %session_id, "Socket bridge connected");

        let (mut sink, mut stream) = socket.split();
        let (frames_tx, mut frames_rx) = mpsc::channel::<ServerFrame>(OUTBOUND_QUEUE);
        let mut shutdown = self.shutdown.subscribe();

        let writer = tokio::spawn(async move {
            while let Some(frame) = frames_rx.recv().await {
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to encode frame");
                        continue;
                    }
                };
                if sink.send(WsMessage::Text(text.into())).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let mut registrations: HashMap<String, JoinHandle<()>> = HashMap::new();
        loop {
            tokio::select! {
                incoming = stream.next() => match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        self.on_frame(text.as_str(), &frames_tx, &mut registrations).await;
                    }
                    Some(Ok(WsMessage::Binary(_))) => {
                        let _ = frames_tx.send(ServerFrame::rejected("invalid_frame")).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(session = %session_id, error = %e, "Socket read failed");
                        break;
                    }
                },
                _ = shutdown.recv() => {
                    tracing::debug!(session = %session_id, "Socket bridge closing on shutdown");
                    break;
                }
            }
        }

        for (_, forwarder) in registrations.drain() {
            forwarder.abort();
        }
        drop(frames_tx);
        let _ = writer.await;
        tracing::info!(session = %session_id, "Socket bridge disconnected");
    }

    async fn on_frame(
        &self,
        text: &str,
        frames: &mpsc::Sender<ServerFrame>,
        registrations: &mut HashMap<String, JoinHandle<()>>,
    ) {
        let frame = match serde_json::from_str::<ClientFrame>(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(error = %e, "Malformed socket frame");
                let _ = frames.send(ServerFrame::rejected("invalid_frame")).await;
                return;
            }
        };

        match frame {
            ClientFrame::Ping => {
                let _ = frames.send(ServerFrame::Pong).await;
            }
            ClientFrame::Send {
                address,
                body,
                reply_address,
            } => {
                if !self.options.inbound_permitted(&address) {
                    tracing::warn!(address = %address, "Inbound address not permitted");
                    let _ = frames.send(ServerFrame::rejected("access_denied")).await;
                    return;
                }
                let Ok(address) = Address::new(address) else {
                    let _ = frames.send(ServerFrame::rejected("invalid_frame")).await;
                    return;
                };
                match reply_address {
                    Some(reply_to) => self.request(address, body, reply_to, frames.clone()),
                    None => {
                        if let Err(e) = self.bus.send(&address, body) {
                            let _ = frames.send(ServerFrame::failed(&e)).await;
                        }
                    }
                }
            }
            ClientFrame::Register { address } => {
                if !self.options.outbound_permitted(&address) {
                    tracing::warn!(address = %address, "Outbound address not permitted");
                    let _ = frames.send(ServerFrame::rejected("access_denied")).await;
                    return;
                }
                if registrations.contains_key(&address) {
                    return;
                }
                let Ok(bus_address) = Address::new(address.clone()) else {
                    let _ = frames.send(ServerFrame::rejected("invalid_frame")).await;
                    return;
                };
                let forwarder = self.forward(bus_address, frames.clone());
                registrations.insert(address, forwarder);
            }
            ClientFrame::Unregister { address } => {
                if let Some(forwarder) = registrations.remove(&address) {
                    forwarder.abort();
                }
            }
        }
    }

    /// Round trip on behalf of the browser; the answer goes out as a frame.
    fn request(
        &self,
        address: Address,
        body: Value,
        reply_to: String,
        frames: mpsc::Sender<ServerFrame>,
    ) {
        let bus = self.bus.clone();
        let deadline = self.reply_timeout;
        tokio::spawn(async move {
            let frame = match reply_within(&bus, &address, body, deadline).await {
                Ok(body) => ServerFrame::Rec {
                    address: reply_to,
                    body,
                },
                Err(e) => ServerFrame::failed(&e),
            };
            let _ = frames.send(frame).await;
        });
    }

    /// Consume `address` and push everything it receives to the browser.
    fn forward(&self, address: Address, frames: mpsc::Sender<ServerFrame>) -> JoinHandle<()> {
        let mut consumer = self.bus.consumer(address.clone());
        tokio::spawn(async move {
            while let Some(mut message) = consumer.recv().await {
                let body = match message.take_body().into_json().await {
                    Ok(body) => body,
                    Err(e) => {
                        tracing::warn!(address = %address, error = %e, "Dropping unreadable message");
                        continue;
                    }
                };
                let frame = ServerFrame::Rec {
                    address: address.to_string(),
                    body,
                };
                if frames.send(frame).await.is_err() {
                    break;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::{DataStoreResult, Record, RecordStream};
    use futures_util::stream;
    use serde_json::json;

    #[test]
    fn test_client_frames_parse() {
        let send: ClientFrame = serde_json::from_str(
            r#"{"type":"send","address":"browserInput","body":{"x":1},"replyAddress":"r1"}"#,
        )
        .unwrap();
        match send {
            ClientFrame::Send {
                address,
                body,
                reply_address,
            } => {
                assert_eq!(address, "browserInput");
                assert_eq!(body, json!({"x": 1}));
                assert_eq!(reply_address.as_deref(), Some("r1"));
            }
            other => panic!("unexpected frame {other:?}"),
        }

        let ping: ClientFrame = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(ping, ClientFrame::Ping));
        assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"publish"}"#).is_err());
    }

    #[test]
    fn test_server_frames_encode() {
        let denied = serde_json::to_value(ServerFrame::rejected("access_denied")).unwrap();
        assert_eq!(denied, json!({"type": "err", "body": "access_denied"}));

        let rec = serde_json::to_value(ServerFrame::Rec {
            address: "r1".into(),
            body: json!("ok"),
        })
        .unwrap();
        assert_eq!(rec, json!({"type": "rec", "address": "r1", "body": "ok"}));

        let failed = serde_json::to_value(ServerFrame::failed(&BusError::NoHandlers(
            Address::new("browserInput").unwrap(),
        )))
        .unwrap();
        assert_eq!(failed["failureCode"], 503);
    }

    #[test]
    fn test_allow_lists() {
        let options = BridgeOptions::new()
            .permit_inbound("browserInput")
            .permit_outbound("news");
        assert!(options.inbound_permitted("browserInput"));
        assert!(!options.inbound_permitted("userLogin"));
        assert!(options.outbound_permitted("news"));
        assert!(!options.outbound_permitted("browserInput"));
    }

    #[tokio::test]
    async fn test_denied_send_produces_no_bus_traffic() {
        let bus = EventBus::default();
        let (shutdown, _) = broadcast::channel(1);
        let bridge = SocketBridge::new(
            bus.clone(),
            BridgeOptions::new().permit_inbound("browserInput"),
            Duration::from_secs(1),
            shutdown,
        );
        let mut secret = bus.consumer(Address::new("userLogin").unwrap());
        let (tx, mut rx) = mpsc::channel(4);
        let mut registrations = HashMap::new();

        bridge
            .on_frame(
                r#"{"type":"send","address":"userLogin","body":{}}"#,
                &tx,
                &mut registrations,
            )
            .await;

        assert_eq!(rx.recv().await, Some(ServerFrame::rejected("access_denied")));
        assert!(secret.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_permitted_send_and_reply() {
        let bus = EventBus::default();
        let (shutdown, _) = broadcast::channel(1);
        let bridge = SocketBridge::new(
            bus.clone(),
            BridgeOptions::new().permit_inbound("browserInput"),
            Duration::from_secs(1),
            shutdown,
        );
        let mut input = bus.consumer(Address::new("browserInput").unwrap());
        tokio::spawn(async move {
            if let Some(message) = input.recv().await {
                message.reply("seen");
            }
        });
        let (tx, mut rx) = mpsc::channel(4);
        let mut registrations = HashMap::new();

        bridge
            .on_frame(
                r#"{"type":"send","address":"browserInput","body":{"k":"v"},"replyAddress":"r1"}"#,
                &tx,
                &mut registrations,
            )
            .await;

        assert_eq!(
            rx.recv().await,
            Some(ServerFrame::Rec {
                address: "r1".into(),
                body: json!("seen")
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_record_reply_becomes_timeout_frame() {
        let bus = EventBus::default();
        let (shutdown, _) = broadcast::channel(1);
        let bridge = SocketBridge::new(
            bus.clone(),
            BridgeOptions::new().permit_inbound("rows"),
            Duration::from_millis(200),
            shutdown,
        );
        let mut rows = bus.consumer(Address::new("rows").unwrap());
        tokio::spawn(async move {
            if let Some(message) = rows.recv().await {
                message.reply(RecordStream::new(stream::pending::<DataStoreResult<Record>>()));
            }
        });
        let (tx, mut rx) = mpsc::channel(4);
        let mut registrations = HashMap::new();

        bridge
            .on_frame(
                r#"{"type":"send","address":"rows","body":{},"replyAddress":"r1"}"#,
                &tx,
                &mut registrations,
            )
            .await;

        let frame = tokio::time::timeout(Duration::from_secs(60), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match frame {
            ServerFrame::Err { failure_code, .. } => assert_eq!(failure_code, Some(504)),
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_register_forwards_messages() {
        let bus = EventBus::default();
        let (shutdown, _) = broadcast::channel(1);
        let bridge = SocketBridge::new(
            bus.clone(),
            BridgeOptions::new().permit_outbound("news"),
            Duration::from_secs(1),
            shutdown,
        );
        let (tx, mut rx) = mpsc::channel(4);
        let mut registrations = HashMap::new();

        bridge
            .on_frame(r#"{"type":"register","address":"news"}"#, &tx, &mut registrations)
            .await;
        let news = Address::new("news").unwrap();
        assert_eq!(bus.handler_count(&news), 1);

        bus.send(&news, json!({"headline": "hi"})).unwrap();
        assert_eq!(
            rx.recv().await,
            Some(ServerFrame::Rec {
                address: "news".into(),
                body: json!({"headline": "hi"})
            })
        );

        bridge
            .on_frame(r#"{"type":"unregister","address":"news"}"#, &tx, &mut registrations)
            .await;
        assert!(registrations.is_empty());
    }
}
