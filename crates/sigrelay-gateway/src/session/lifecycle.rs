//! Runs once per upgraded connection, before any command is processed.
//!
//! Order matters: the close handler is armed before the handle is registered,
//! so an identity can never go online without a cleanup path.

use std::sync::Arc;

use sigrelay_core::error::Result;
use sigrelay_core::protocol::{Message, RtcConfiguration};

use super::IdSource;
use crate::context::Peer;
use crate::presence::{ConnId, ConnectionHandle, PresenceRegistry};

/// Connection state before the lifecycle resolves it. Fields may be pre-set
/// by the transport (e.g. a requested identity).
#[derive(Debug, Clone, Default)]
pub struct ConnState {
    pub id: Option<String>,
    pub delete_on_close: Option<bool>,
}

pub struct Lifecycle {
    registry: Arc<dyn PresenceRegistry>,
    ids: Arc<dyn IdSource>,
    rtc: Option<Arc<RtcConfiguration>>,
}

impl Lifecycle {
    pub fn new(
        registry: Arc<dyn PresenceRegistry>,
        ids: Arc<dyn IdSource>,
        rtc: Option<RtcConfiguration>,
    ) -> Self {
        Self {
            registry,
            ids,
            rtc: rtc.map(Arc::new),
        }
    }

    /// Resolve identity, ensure the registry entry, arm cleanup, queue
    /// `welcome` and go online.
    ///
    /// If the welcome or going online fails, the armed cleanup runs before the
    /// error is returned.
    pub async fn establish(&self, state: ConnState, handle: ConnectionHandle) -> Result<(Peer, CloseHandler)> {
        let id = match state.id.filter(|s| !s.is_empty()) {
            Some(id) => id,
            None => self.ids.next_id(),
        };

        let created = self.registry.ensure(&id).await?;
        let peer = Peer::new(id, state.delete_on_close.unwrap_or(created));

        let close = CloseHandler::arm(Arc::clone(&self.registry), peer.clone(), handle.conn_id());

        if let Err(e) = self.go_online(&peer, handle).await {
            close.run().await;
            return Err(e);
        }

        tracing::info!(peer = %peer.id(), created, delete_on_close = peer.delete_on_close(), "peer online");
        Ok((peer, close))
    }

    /// The welcome is queued while the handle is still private to this
    /// connection, so it is always the first frame even for identities other
    /// peers already know (provisioned or requested ids).
    async fn go_online(&self, peer: &Peer, handle: ConnectionHandle) -> Result<()> {
        let welcome = Message::welcome(self.ids.next_id(), peer.id(), self.rtc.as_deref())?;
        handle.send(peer.id(), welcome).await?;
        self.registry.register(peer.id(), handle).await?;
        Ok(())
    }
}

/// One-shot cleanup armed per connection.
///
/// `run` unregisters this connection's handle and, for `delete_on_close`
/// peers, deletes the entry. Dropping an un-run handler spawns the same
/// cleanup on the current runtime.
pub struct CloseHandler {
    armed: Option<Cleanup>,
}

struct Cleanup {
    registry: Arc<dyn PresenceRegistry>,
    peer: Peer,
    conn: ConnId,
}

impl CloseHandler {
    fn arm(registry: Arc<dyn PresenceRegistry>, peer: Peer, conn: ConnId) -> Self {
        Self {
            armed: Some(Cleanup { registry, peer, conn }),
        }
    }

    pub async fn run(mut self) {
        if let Some(cleanup) = self.armed.take() {
            cleanup.run().await;
        }
    }
}

impl Drop for CloseHandler {
    fn drop(&mut self) {
        let Some(cleanup) = self.armed.take() else { return };
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                rt.spawn(cleanup.run());
            }
            Err(_) => {
                tracing::warn!(peer = %cleanup.peer.id(), "close handler dropped outside runtime; registry entry leaked");
            }
        }
    }
}

impl Cleanup {
    async fn run(self) {
        let id = self.peer.id();

        if let Err(e) = self.registry.unregister(id, self.conn).await {
            tracing::warn!(peer = %id, conn = %self.conn, error = ?e, "unregister failed");
        }

        if self.peer.delete_on_close() {
            if let Err(e) = self.registry.delete(id).await {
                tracing::warn!(peer = %id, error = ?e, "delete on close failed");
            }
        }

        tracing::info!(peer = %id, deleted = self.peer.delete_on_close(), "peer offline");
    }
}
