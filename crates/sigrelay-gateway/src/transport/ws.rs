//! WebSocket handler.
//!
//! Responsibilities:
//! - Upgrade HTTP -> WS (optional `?id=` requested identity)
//! - Run the connection lifecycle (identity, presence, welcome)
//! - Reader: decode-once, then run the message pipeline inline, one message at
//!   a time
//! - Writer: a separate task draining the outbound queue to the socket
//! - Lifecycle: ping + idle timeout + drain on shutdown
//! - Cleanup: the armed close handler always runs before the task ends

use axum::{
    extract::{ws::WebSocket, ws::WebSocketUpgrade, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tracing::Instrument;

use sigrelay_core::error::{close, Result};

use crate::app_state::AppState;
use crate::context::{CloseReason, ConnCtx, Outbound, Peer};
use crate::presence::ConnectionHandle;
use crate::session::{is_valid_identity, ConnState};
use crate::transport::codec::{decode, encode, Inbound};

/// How long the writer gets to flush a final close frame.
const WRITER_FLUSH: Duration = Duration::from_secs(2);

// --------------------
// Query parsing
// --------------------
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    pub id: Option<String>,
}

// --------------------
// Entry
// --------------------
pub async fn ws_upgrade(
    State(app): State<AppState>,
    ws: WebSocketUpgrade,
    Query(q): Query<WsQuery>,
) -> Response {
    if app.is_draining() {
        app.metrics().handshake_rejections.inc(&[("reason", "draining")]);
        return (StatusCode::SERVICE_UNAVAILABLE, "draining").into_response();
    }

    let requested = match q.id {
        Some(id) if !app.cfg().identity.allow_requested_id => {
            tracing::debug!(%id, "requested id ignored (disabled)");
            None
        }
        Some(id) if !is_valid_identity(&id) => {
            app.metrics().handshake_rejections.inc(&[("reason", "invalid_id")]);
            return (StatusCode::BAD_REQUEST, "invalid id").into_response();
        }
        other => other,
    };

    app.metrics().ws_upgrades.inc(&[]);
    let session = app.track_session();
    ws.on_upgrade(move |socket| async move {
        let _session = session;
        if let Err(e) = run_session(app, requested, socket).await {
            tracing::warn!(error = %e, "session setup failed");
        }
    })
}

// --------------------
// Session
// --------------------
async fn run_session(app: AppState, requested: Option<String>, socket: WebSocket) -> Result<()> {
    let (out_tx, out_rx) = mpsc::channel::<Outbound>(app.cfg().gateway.outbound_queue);
    let (ws_tx, mut ws_rx) = socket.split();
    let writer = tokio::spawn(write_loop(ws_tx, out_rx));

    let state = ConnState {
        id: requested,
        delete_on_close: None,
    };
    let handle = ConnectionHandle::new(out_tx.clone());

    let (peer, close_handler) = match app.lifecycle().establish(state, handle).await {
        Ok(v) => v,
        Err(e) => {
            let reason = CloseReason::from_error(&e);
            finish(&app, out_tx, writer, Some(reason)).await;
            return Err(e);
        }
    };

    app.metrics().ws_active_sessions.inc(&[]);
    let span = tracing::info_span!("conn", peer = %peer.id());
    let close_reason = read_loop(&app, &peer, &out_tx, &mut ws_rx).instrument(span).await;

    // presence first, so nobody can target a ghost
    close_handler.run().await;
    app.metrics().ws_active_sessions.dec(&[]);

    finish(&app, out_tx, writer, close_reason).await;
    Ok(())
}

async fn finish(
    app: &AppState,
    out_tx: mpsc::Sender<Outbound>,
    writer: tokio::task::JoinHandle<()>,
    close_reason: Option<CloseReason>,
) {
    match close_reason {
        Some(reason) => {
            let code = reason.code.to_string();
            app.metrics().closes.inc(&[("code", code.as_str())]);
            let _ = out_tx.send(Outbound::Close(reason)).await;
            drop(out_tx);
            let abort = writer.abort_handle();
            if tokio::time::timeout(WRITER_FLUSH, writer).await.is_err() {
                abort.abort();
            }
        }
        None => {
            // client went away; nothing left worth flushing
            app.metrics().closes.inc(&[("code", "client")]);
            writer.abort();
        }
    }
}

/// Returns the close frame to send, or `None` when the client closed.
async fn read_loop(
    app: &AppState,
    peer: &Peer,
    out_tx: &mpsc::Sender<Outbound>,
    ws_rx: &mut SplitStream<WebSocket>,
) -> Option<CloseReason> {
    let gw = &app.cfg().gateway;
    let ping_every = Duration::from_millis(gw.ping_interval_ms);
    let idle_timeout = Duration::from_millis(gw.idle_timeout_ms);

    let mut ping_tick = tokio::time::interval_at(Instant::now() + ping_every, ping_every);
    ping_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut shutdown = app.shutdown_signal();
    if *shutdown.borrow_and_update() {
        return Some(CloseReason::new(close::GOING_AWAY, "Server Shutdown"));
    }
    let ctx = ConnCtx::new(peer.clone(), out_tx.clone());
    let pipeline = app.pipeline();
    let mut last_activity = Instant::now();

    loop {
        tokio::select! {
            incoming = ws_rx.next() => {
                let Some(Ok(frame)) = incoming else { return None; };
                last_activity = Instant::now();

                let msg = match decode(frame, gw.max_frame_bytes) {
                    Ok(Inbound::Text(msg)) => msg,
                    Ok(Inbound::Ping | Inbound::Pong) => continue,
                    Ok(Inbound::Close) => return None,
                    Err(rejected) => {
                        app.metrics().decode_errors.inc(&[]);
                        tracing::debug!(?rejected, "frame rejected");
                        return Some(rejected.close_reason());
                    }
                };

                // full pipeline (including the ack) resolves before the next read
                let cmd = msg.cmd().unwrap_or("-").to_owned();
                let started = std::time::Instant::now();
                let res = pipeline.run(&msg, &ctx).await;
                app.metrics().dispatch_duration.observe(&[("cmd", cmd.as_str())], started.elapsed());

                match res {
                    Ok(()) => {
                        app.metrics().commands.inc(&[("cmd", cmd.as_str()), ("outcome", "handled")]);
                    }
                    Err(e) => {
                        app.metrics().commands.inc(&[("cmd", cmd.as_str()), ("outcome", "fatal")]);
                        let reason = CloseReason::from_error(&e);
                        tracing::warn!(code = reason.code, error = %e, "closing connection");
                        return Some(reason);
                    }
                }
            }

            _ = ping_tick.tick() => {
                if out_tx.send(Outbound::Ping).await.is_err() {
                    return None;
                }
            }

            _ = tokio::time::sleep(Duration::from_millis(250)) => {
                if last_activity.elapsed() >= idle_timeout {
                    return Some(CloseReason::new(close::IDLE_TIMEOUT, "Idle Timeout"));
                }
            }

            _ = shutdown.changed() => {
                return Some(CloseReason::new(close::GOING_AWAY, "Server Shutdown"));
            }
        }
    }
}

async fn write_loop(mut ws_tx: SplitSink<WebSocket, axum::extract::ws::Message>, mut rx: mpsc::Receiver<Outbound>) {
    while let Some(out) = rx.recv().await {
        let is_close = matches!(out, Outbound::Close(_));
        let frame = match encode(out) {
            Ok(f) => f,
            Err(e) => {
                tracing::error!(error = %e, "encode failed, frame dropped");
                continue;
            }
        };
        if ws_tx.send(frame).await.is_err() || is_close {
            break;
        }
    }
}
