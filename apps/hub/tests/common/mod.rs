//! Shared helpers: an in-process hub on a real listener plus WebSocket
//! client plumbing.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use sonora_hub::config::Config;
use sonora_hub::gateway::hub::Hub;
use sonora_hub::gateway::push::{PushSink, RecordingSink};
use sonora_hub::gateway::stats::StatsBase;
use sonora_hub::AppState;

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Build an AppState with a recording push sink and a TURN-enabled config.
pub fn test_state() -> (AppState, Arc<RecordingSink>) {
    let config = Config {
        turn_urls: vec!["turn:turn.example.net:3478?transport=udp".to_string()],
        turn_secret: Some("test-secret".to_string()),
        turn_relay_min_port: Some(49152),
        turn_relay_max_port: Some(49251),
        vapid_public_key: Some("test-public-key".to_string()),
        vapid_private_key: Some("test-private-key".to_string()),
        vapid_subject: Some("mailto:ops@example.net".to_string()),
        ..Config::default()
    };
    let sink = Arc::new(RecordingSink::new());
    let push: Arc<dyn PushSink> = sink.clone();
    let state = AppState {
        hub: Arc::new(Hub::new(StatsBase::from_config(&config))),
        config: Arc::new(config),
        push,
    };
    (state, sink)
}

/// Start the hub on 127.0.0.1:0. The server runs in the background.
pub async fn start_server() -> (SocketAddr, AppState, Arc<RecordingSink>) {
    let (state, sink) = test_state();
    let app = sonora_hub::routes::router().with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    (addr, state, sink)
}

/// Connect a client and consume the hello frame.
pub async fn connect(addr: SocketAddr) -> (WsClient, Value) {
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("ws connect");
    let hello = recv_json(&mut ws).await;
    assert_eq!(hello["type"], "hello");
    (ws, hello)
}

pub async fn send_json(ws: &mut WsClient, value: &Value) {
    ws.send(tungstenite::Message::Text(value.to_string().into()))
        .await
        .expect("ws send");
}

/// Receive the next JSON frame, with a deadline.
pub async fn recv_json(ws: &mut WsClient) -> Value {
    loop {
        let msg = time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("connection closed")
            .expect("ws error");
        match msg {
            tungstenite::Message::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("valid json frame");
            }
            tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_) => continue,
            other => panic!("unexpected ws message {other:?}"),
        }
    }
}

/// Skip frames until one with the given `type` arrives. Returns it along
/// with the types skipped on the way (for confinement assertions).
pub async fn recv_until(ws: &mut WsClient, frame_type: &str) -> (Value, Vec<String>) {
    let mut skipped = Vec::new();
    loop {
        let frame = recv_json(ws).await;
        if frame["type"] == frame_type {
            return (frame, skipped);
        }
        skipped.push(frame["type"].as_str().unwrap_or_default().to_string());
    }
}

/// Skip frames until a presence snapshot listing exactly `users` named
/// sessions arrives.
pub async fn recv_presence_with(ws: &mut WsClient, users: usize) -> Value {
    loop {
        let (frame, _) = recv_until(ws, "presence").await;
        if frame["users"].as_array().map(Vec::len) == Some(users) {
            return frame;
        }
    }
}

/// Claim a name and return the nameResult frame.
pub async fn set_name(ws: &mut WsClient, name: &str) -> Value {
    send_json(ws, &serde_json::json!({"type": "setName", "name": name})).await;
    let (result, _) = recv_until(ws, "nameResult").await;
    result
}
