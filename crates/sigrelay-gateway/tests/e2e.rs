#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use sigrelay_gateway::app_state::AppState;
use sigrelay_gateway::config::GatewayConfig;
use sigrelay_gateway::presence::{ClientStatus, LocalRegistry, PresenceRegistry};
use sigrelay_gateway::router::build_router;
use sigrelay_gateway::session::IdSource;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start(cfg: GatewayConfig) -> (SocketAddr, AppState) {
    let state = AppState::new(cfg).expect("state");
    (serve(state.clone()).await, state)
}

async fn serve(state: AppState) -> SocketAddr {
    let app = build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

struct Counted(AtomicUsize);

impl IdSource for Counted {
    fn next_id(&self) -> String {
        format!("n{}", self.0.fetch_add(1, Ordering::Relaxed))
    }
}

async fn connect(addr: SocketAddr, query: &str) -> (Client, String) {
    let (mut ws, _) = connect_async(format!("ws://{addr}/v1/ws{query}")).await.expect("connect");
    let welcome = recv_json(&mut ws).await;
    assert_eq!(welcome["cmd"], "welcome");
    let id = welcome["data"]["id"].as_str().unwrap().to_owned();
    (ws, id)
}

async fn next_frame(ws: &mut Client) -> WsMessage {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out")
            .expect("stream ended")
            .expect("ws error");
        if !matches!(frame, WsMessage::Ping(_) | WsMessage::Pong(_)) {
            return frame;
        }
    }
}

async fn recv_json(ws: &mut Client) -> Value {
    match next_frame(ws).await {
        WsMessage::Text(t) => serde_json::from_str(&t).unwrap(),
        other => panic!("expected text, got {other:?}"),
    }
}

async fn send_json(ws: &mut Client, v: Value) {
    ws.send(WsMessage::Text(v.to_string())).await.unwrap();
}

async fn expect_close(ws: &mut Client, code: u16) {
    match next_frame(ws).await {
        WsMessage::Close(Some(frame)) => assert_eq!(u16::from(frame.code), code),
        other => panic!("expected close {code}, got {other:?}"),
    }
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let req = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(req.as_bytes()).await.unwrap();
    let mut out = String::new();
    stream.read_to_string(&mut out).await.unwrap();
    out
}

#[tokio::test]
async fn offer_flows_between_two_browsers() {
    let (addr, _state) = start(GatewayConfig::default()).await;
    let (mut a, a_id) = connect(addr, "").await;
    let (mut b, b_id) = connect(addr, "").await;
    assert_ne!(a_id, b_id);

    send_json(&mut a, json!({ "id": "1", "cmd": "session-start", "target": b_id })).await;
    let relayed = recv_json(&mut b).await;
    assert_eq!(relayed["cmd"], "session-start");
    assert_eq!(relayed["origin"], a_id.as_str());
    assert_eq!(recv_json(&mut a).await, json!({ "id": "1", "ok": true }));

    send_json(&mut b, json!({ "id": "2", "cmd": "session-accept", "target": a_id })).await;
    assert_eq!(recv_json(&mut a).await["cmd"], "session-accept");
    assert_eq!(recv_json(&mut b).await, json!({ "id": "2", "ok": true }));

    send_json(&mut a, json!({ "id": "3", "cmd": "offer", "target": b_id, "data": { "sdp": "v=0" } })).await;
    assert_eq!(recv_json(&mut b).await["data"], json!({ "sdp": "v=0" }));
    assert_eq!(recv_json(&mut a).await, json!({ "id": "3", "ok": true }));
}

#[tokio::test]
async fn disconnect_takes_peer_offline() {
    let (addr, _state) = start(GatewayConfig::default()).await;
    let (mut a, _) = connect(addr, "").await;
    let (b, b_id) = connect(addr, "").await;
    drop(b);

    // cleanup is asynchronous after the socket drops
    for attempt in 0..50 {
        send_json(&mut a, json!({ "id": format!("p{attempt}"), "cmd": "session-start", "target": b_id })).await;
        let reply = recv_json(&mut a).await;
        if reply["ok"] == false {
            assert_eq!(reply["data"]["message"], "Peer Not Found");
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("peer never went away");
}

#[tokio::test]
async fn invalid_json_closes_with_1007() {
    let (addr, _state) = start(GatewayConfig::default()).await;
    let (mut a, _) = connect(addr, "").await;
    a.send(WsMessage::Text("{not json".into())).await.unwrap();
    expect_close(&mut a, 1007).await;
}

#[tokio::test]
async fn binary_frames_close_with_1003() {
    let (addr, _state) = start(GatewayConfig::default()).await;
    let (mut a, _) = connect(addr, "").await;
    a.send(WsMessage::Binary(vec![1, 2, 3])).await.unwrap();
    expect_close(&mut a, 1003).await;
}

#[tokio::test]
async fn missing_target_closes_with_its_code() {
    let (addr, _state) = start(GatewayConfig::default()).await;
    let (mut a, _) = connect(addr, "").await;
    send_json(&mut a, json!({ "id": "1", "cmd": "offer", "data": { "sdp": "v=0" } })).await;
    expect_close(&mut a, 4401).await;
}

#[tokio::test]
async fn requested_identity_is_honoured_when_enabled() {
    let mut cfg = GatewayConfig::default();
    cfg.identity.allow_requested_id = true;
    let (addr, _state) = start(cfg).await;

    let (_alice, id) = connect(addr, "?id=alice").await;
    assert_eq!(id, "alice");
}

#[tokio::test]
async fn requested_identity_is_ignored_by_default() {
    let (addr, _state) = start(GatewayConfig::default()).await;
    let (_ws, id) = connect(addr, "?id=alice").await;
    assert_ne!(id, "alice");
}

#[tokio::test]
async fn drain_closes_sessions_and_flips_readiness() {
    let (addr, state) = start(GatewayConfig::default()).await;
    assert!(http_get(addr, "/readyz").await.starts_with("HTTP/1.1 200"));
    assert!(http_get(addr, "/healthz").await.contains("ok"));

    let (mut a, a_id) = connect(addr, "").await;
    assert_eq!(state.live_sessions(), 1);
    state.begin_drain();
    expect_close(&mut a, 1001).await;

    // the task is done only after its close handler ran
    assert!(state.wait_drained(Duration::from_secs(3)).await);
    assert_eq!(state.live_sessions(), 0);
    assert_eq!(state.registry().info(&a_id).await.unwrap(), None);

    assert!(http_get(addr, "/readyz").await.starts_with("HTTP/1.1 503"));
    assert!(connect_async(format!("ws://{addr}/v1/ws")).await.is_err());

    let metrics = http_get(addr, "/metrics").await;
    assert!(metrics.contains("sigrelay_draining 1"));
    assert!(metrics.contains("sigrelay_handshake_rejections_total{reason=\"draining\"} 1"));
}

#[tokio::test]
async fn wait_drained_times_out_while_a_session_is_live() {
    let (addr, state) = start(GatewayConfig::default()).await;
    let (_a, _) = connect(addr, "").await;
    assert!(!state.wait_drained(Duration::from_millis(100)).await);
    assert_eq!(state.live_sessions(), 1);
}

#[tokio::test]
async fn duplicate_identity_is_welcomed_then_closed_with_4409() {
    let mut cfg = GatewayConfig::default();
    cfg.identity.allow_requested_id = true;
    let (addr, _state) = start(cfg).await;

    let (mut first, _) = connect(addr, "?id=dup").await;
    let (mut second, id) = connect(addr, "?id=dup").await;
    assert_eq!(id, "dup");
    expect_close(&mut second, 4409).await;

    // the original holder is untouched
    let (mut other, other_id) = connect(addr, "").await;
    send_json(&mut other, json!({ "id": "1", "cmd": "session-start", "target": "dup" })).await;
    assert_eq!(recv_json(&mut first).await["origin"], other_id.as_str());
    assert_eq!(recv_json(&mut other).await, json!({ "id": "1", "ok": true }));
}

#[tokio::test]
async fn external_registry_and_id_source() {
    let registry = Arc::new(LocalRegistry::new());
    let state = AppState::with_registry(
        GatewayConfig::default(),
        registry.clone(),
        Arc::new(Counted(AtomicUsize::new(0))),
    )
    .expect("state");
    let addr = serve(state.clone()).await;

    let (_a, a_id) = connect(addr, "").await;
    assert!(a_id.starts_with('n'));
    let info = state.registry().info(&a_id).await.unwrap().expect("entry");
    assert_eq!(info.status, ClientStatus::Online);
    assert_eq!(registry.online_count(), 1);

    // registry gauges are only rendered for the built-in registry
    let metrics = http_get(addr, "/metrics").await;
    assert!(!metrics.contains("sigrelay_registry_online"));
}
