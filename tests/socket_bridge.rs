//! WebSocket bridge tests against a running gateway.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use bus_gateway::bus::{Address, Body};

mod common;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(gateway: &common::TestGateway) -> Socket {
    let (socket, response) = connect_async(gateway.ws_url("/eventbus/websocket"))
        .await
        .unwrap();
    assert!(response.headers().contains_key("set-cookie"));
    socket
}

async fn send(socket: &mut Socket, frame: Value) {
    socket
        .send(Message::Text(frame.to_string().into()))
        .await
        .unwrap();
}

async fn next_frame(socket: &mut Socket) -> Value {
    let message = tokio::time::timeout(Duration::from_secs(2), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    serde_json::from_str(message.to_text().unwrap()).unwrap()
}

#[tokio::test]
async fn test_ping() {
    let gateway = common::start_gateway(|_| {}).await;
    let mut socket = connect(&gateway).await;

    send(&mut socket, json!({"type": "ping"})).await;
    assert_eq!(next_frame(&mut socket).await, json!({"type": "pong"}));

    gateway.stop().await;
}

#[tokio::test]
async fn test_inbound_address_reaches_bus() {
    let gateway = common::start_gateway(|_| {}).await;
    let mut input = gateway.bus.consumer(Address::new("browserInput").unwrap());
    let mut socket = connect(&gateway).await;

    send(
        &mut socket,
        json!({"type": "send", "address": "browserInput", "body": {"click": "save"}}),
    )
    .await;

    let message = tokio::time::timeout(Duration::from_secs(2), input.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(message.body(), Body::Json(v) if v == &json!({"click": "save"})));

    gateway.stop().await;
}

#[tokio::test]
async fn test_request_with_reply_address() {
    let gateway = common::start_gateway(|_| {}).await;
    let mut input = gateway.bus.consumer(Address::new("browserInput").unwrap());
    tokio::spawn(async move {
        while let Some(message) = input.recv().await {
            message.reply(json!({"saved": true}));
        }
    });
    let mut socket = connect(&gateway).await;

    send(
        &mut socket,
        json!({"type": "send", "address": "browserInput", "body": {}, "replyAddress": "r-1"}),
    )
    .await;
    assert_eq!(
        next_frame(&mut socket).await,
        json!({"type": "rec", "address": "r-1", "body": {"saved": true}})
    );

    gateway.stop().await;
}

#[tokio::test]
async fn test_address_outside_allow_list_denied() {
    let gateway = common::start_gateway(|_| {}).await;
    let mut login = gateway.bus.consumer(Address::new("userLogin").unwrap());
    let mut socket = connect(&gateway).await;

    send(
        &mut socket,
        json!({"type": "send", "address": "userLogin", "body": {"username": "mallory"}}),
    )
    .await;
    assert_eq!(
        next_frame(&mut socket).await,
        json!({"type": "err", "body": "access_denied"})
    );

    send(&mut socket, json!({"type": "register", "address": "userLogin"})).await;
    assert_eq!(
        next_frame(&mut socket).await,
        json!({"type": "err", "body": "access_denied"})
    );
    assert!(login.try_recv().is_none());

    gateway.stop().await;
}

#[tokio::test]
async fn test_registered_address_forwards_messages() {
    let gateway = common::start_gateway(|_| {}).await;
    let news = Address::new("news").unwrap();
    let mut socket = connect(&gateway).await;

    send(&mut socket, json!({"type": "register", "address": "news"})).await;
    // A ping round trip orders the registration before the publish below.
    send(&mut socket, json!({"type": "ping"})).await;
    assert_eq!(next_frame(&mut socket).await, json!({"type": "pong"}));
    assert_eq!(gateway.bus.handler_count(&news), 1);

    gateway.bus.send(&news, json!({"headline": "hello"})).unwrap();
    assert_eq!(
        next_frame(&mut socket).await,
        json!({"type": "rec", "address": "news", "body": {"headline": "hello"}})
    );

    gateway.stop().await;
}

#[tokio::test]
async fn test_malformed_frame() {
    let gateway = common::start_gateway(|_| {}).await;
    let mut socket = connect(&gateway).await;

    socket
        .send(Message::Text("not json".into()))
        .await
        .unwrap();
    assert_eq!(
        next_frame(&mut socket).await,
        json!({"type": "err", "body": "invalid_frame"})
    );

    gateway.stop().await;
}

#[tokio::test]
async fn test_disabled_bridge_not_mounted() {
    let gateway = common::start_gateway(|config| config.socket_bridge.enabled = false).await;

    assert!(connect_async(gateway.ws_url("/eventbus/websocket")).await.is_err());

    gateway.stop().await;
}
