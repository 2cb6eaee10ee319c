use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use sigrelay_core::error::RegistryError;
use sigrelay_core::protocol::Message;

use crate::context::Outbound;

static NEXT_CONN: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One connection's outbound queue sender.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    conn_id: ConnId,
    tx: mpsc::Sender<Outbound>,
}

impl ConnectionHandle {
    pub fn new(tx: mpsc::Sender<Outbound>) -> Self {
        Self {
            conn_id: ConnId(NEXT_CONN.fetch_add(1, Ordering::Relaxed)),
            tx,
        }
    }

    pub fn conn_id(&self) -> ConnId {
        self.conn_id
    }

    /// Receiver side is gone (socket writer finished).
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Non-blocking enqueue used for relayed messages. `client` names the
    /// identity in errors.
    pub fn try_deliver(&self, client: &str, msg: Message) -> Result<(), RegistryError> {
        self.tx.try_send(Outbound::Message(msg)).map_err(|e| match e {
            TrySendError::Full(_) => RegistryError::Backpressure(client.to_owned()),
            TrySendError::Closed(_) => RegistryError::Closed(client.to_owned()),
        })
    }

    /// Awaiting enqueue, used for the connection's own server messages.
    pub async fn send(&self, client: &str, msg: Message) -> Result<(), RegistryError> {
        self.tx
            .send(Outbound::Message(msg))
            .await
            .map_err(|_| RegistryError::Closed(client.to_owned()))
    }
}
