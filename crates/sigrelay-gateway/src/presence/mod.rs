//! Presence registry: which identities exist, which are online, and how to
//! reach them.
//!
//! The engine only talks to [`PresenceRegistry`]; [`LocalRegistry`] is the
//! in-process implementation used by the gateway binary.

mod handle;
mod local;

use async_trait::async_trait;
use serde::Serialize;

use sigrelay_core::error::RegistryError;
use sigrelay_core::protocol::Message;

pub use handle::{ConnId, ConnectionHandle};
pub use local::LocalRegistry;

/// Liveness of a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    Online,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    pub status: ClientStatus,
}

/// Registry contract.
///
/// Implementations must serialize mutations per identity: `ensure` is an
/// atomic exists-or-create, `unregister` only detaches the handle identified
/// by `conn`, and `send` either enqueues the whole message or fails.
#[async_trait]
pub trait PresenceRegistry: Send + Sync {
    async fn exists(&self, id: &str) -> Result<bool, RegistryError>;

    /// Fails with `AlreadyExists` if the identity is known.
    async fn create(&self, id: &str) -> Result<(), RegistryError>;

    /// Create the entry if absent. Returns `true` when this call created it.
    ///
    /// The default is built on `exists` + `create` and tolerates losing the
    /// race to a concurrent creator.
    async fn ensure(&self, id: &str) -> Result<bool, RegistryError> {
        if self.exists(id).await? {
            return Ok(false);
        }
        match self.create(id).await {
            Ok(()) => Ok(true),
            Err(RegistryError::AlreadyExists(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Attach a live connection; the entry goes online.
    async fn register(&self, id: &str, handle: ConnectionHandle) -> Result<(), RegistryError>;

    /// Detach `conn` if it is the attached handle; the entry goes offline.
    async fn unregister(&self, id: &str, conn: ConnId) -> Result<(), RegistryError>;

    /// Remove the entry. Refused with `StillOnline` while a handle is attached.
    async fn delete(&self, id: &str) -> Result<(), RegistryError>;

    async fn info(&self, id: &str) -> Result<Option<ClientInfo>, RegistryError>;

    /// Deliver to the identity's live connection.
    async fn send(&self, id: &str, message: Message) -> Result<(), RegistryError>;
}
