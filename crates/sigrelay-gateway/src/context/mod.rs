//! Per-connection context shared across layers.
//!
//! `Peer` is the resolved identity of a connection; `ConnCtx` is what pipeline
//! hooks get to talk back to their own socket. Both are transport-neutral: the
//! outbound queue carries `Outbound` items which the transport encodes.

use std::sync::Arc;

use tokio::sync::mpsc;

use sigrelay_core::error::{Result, SigRelayError};
use sigrelay_core::protocol::Message;

/// Close frame requested by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

impl CloseReason {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    pub fn from_error(e: &SigRelayError) -> Self {
        Self::new(e.close_code(), e.close_reason())
    }
}

/// Items queued for a connection's writer.
#[derive(Debug, Clone)]
pub enum Outbound {
    Message(Message),
    Ping,
    Close(CloseReason),
}

/// Resolved identity of one connection. Never reassigned.
#[derive(Debug, Clone)]
pub struct Peer {
    id: Arc<str>,
    delete_on_close: bool,
}

impl Peer {
    pub fn new(id: impl Into<Arc<str>>, delete_on_close: bool) -> Self {
        Self {
            id: id.into(),
            delete_on_close,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn delete_on_close(&self) -> bool {
        self.delete_on_close
    }
}

/// Per-message context passed to hooks (borrowed, never owned by them).
#[derive(Clone)]
pub struct ConnCtx {
    peer: Peer,
    out: mpsc::Sender<Outbound>,
}

impl ConnCtx {
    pub fn new(peer: Peer, out: mpsc::Sender<Outbound>) -> Self {
        Self { peer, out }
    }

    pub fn peer_id(&self) -> &str {
        self.peer.id()
    }

    /// Queue a message on this connection's own socket.
    pub async fn send(&self, msg: Message) -> Result<()> {
        self.out
            .send(Outbound::Message(msg))
            .await
            .map_err(|_| SigRelayError::Internal("outbound channel closed".into()))
    }
}
