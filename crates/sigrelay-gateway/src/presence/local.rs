use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use sigrelay_core::error::RegistryError;
use sigrelay_core::protocol::Message;

use super::{ClientInfo, ClientStatus, ConnId, ConnectionHandle, PresenceRegistry};

#[derive(Debug, Default)]
struct ClientEntry {
    handle: Option<ConnectionHandle>,
}

impl ClientEntry {
    fn status(&self) -> ClientStatus {
        if self.handle.is_some() {
            ClientStatus::Online
        } else {
            ClientStatus::Offline
        }
    }
}

/// In-process registry: `client_id -> entry`.
///
/// Every mutation goes through DashMap's entry/shard locks, so operations on
/// one identity never interleave.
#[derive(Debug, Default)]
pub struct LocalRegistry {
    clients: DashMap<String, ClientEntry>,
}

impl LocalRegistry {
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
        }
    }

    /// Pre-create an offline entry (startup provisioning). Idempotent.
    pub fn provision(&self, id: &str) {
        self.clients
            .entry(id.to_owned())
            .or_insert_with(ClientEntry::default);
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn online_count(&self) -> usize {
        self.clients.iter().filter(|e| e.value().handle.is_some()).count()
    }
}

#[async_trait]
impl PresenceRegistry for LocalRegistry {
    async fn exists(&self, id: &str) -> Result<bool, RegistryError> {
        Ok(self.clients.contains_key(id))
    }

    async fn create(&self, id: &str) -> Result<(), RegistryError> {
        match self.clients.entry(id.to_owned()) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyExists(id.to_owned())),
            Entry::Vacant(v) => {
                v.insert(ClientEntry::default());
                Ok(())
            }
        }
    }

    async fn ensure(&self, id: &str) -> Result<bool, RegistryError> {
        match self.clients.entry(id.to_owned()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(v) => {
                v.insert(ClientEntry::default());
                Ok(true)
            }
        }
    }

    async fn register(&self, id: &str, handle: ConnectionHandle) -> Result<(), RegistryError> {
        let mut entry = self
            .clients
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_owned()))?;

        // a handle whose socket is already gone may be replaced
        if let Some(current) = &entry.handle {
            if current.conn_id() != handle.conn_id() && !current.is_closed() {
                return Err(RegistryError::AlreadyOnline(id.to_owned()));
            }
        }
        entry.handle = Some(handle);
        Ok(())
    }

    async fn unregister(&self, id: &str, conn: ConnId) -> Result<(), RegistryError> {
        let mut entry = self
            .clients
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_owned()))?;

        if entry.handle.as_ref().map(|h| h.conn_id()) == Some(conn) {
            entry.handle = None;
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), RegistryError> {
        if self
            .clients
            .remove_if(id, |_, e| e.handle.is_none())
            .is_some()
        {
            return Ok(());
        }
        if self.clients.contains_key(id) {
            Err(RegistryError::StillOnline(id.to_owned()))
        } else {
            Err(RegistryError::NotFound(id.to_owned()))
        }
    }

    async fn info(&self, id: &str) -> Result<Option<ClientInfo>, RegistryError> {
        Ok(self.clients.get(id).map(|e| ClientInfo {
            status: e.value().status(),
        }))
    }

    async fn send(&self, id: &str, message: Message) -> Result<(), RegistryError> {
        // clone the handle out so the shard lock is released before enqueueing
        let handle = match self.clients.get(id) {
            Some(entry) => entry.value().handle.clone(),
            None => return Err(RegistryError::NotFound(id.to_owned())),
        };
        let handle = handle.ok_or_else(|| RegistryError::Offline(id.to_owned()))?;
        handle.try_deliver(id, message)
    }
}
