#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use sigrelay_core::error::{RegistryError, Result};
use sigrelay_core::protocol::Message;
use sigrelay_gateway::context::{ConnCtx, Outbound, Peer};
use sigrelay_gateway::pipeline::{self, Chain, ExposurePolicy};
use sigrelay_gateway::presence::{ClientInfo, ConnId, ConnectionHandle, LocalRegistry, PresenceRegistry};
use sigrelay_gateway::session::{CloseHandler, ConnState, IdSource, Lifecycle};

/// Deterministic ids: `<prefix>1`, `<prefix>2`, ...
pub struct SeqIds {
    prefix: &'static str,
    n: AtomicU64,
}

impl SeqIds {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            n: AtomicU64::new(0),
        }
    }
}

impl IdSource for SeqIds {
    fn next_id(&self) -> String {
        format!("{}{}", self.prefix, self.n.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Engine wiring without a socket: a shared registry, the lifecycle and the
/// app pipeline.
pub struct Harness {
    pub registry: Arc<LocalRegistry>,
    pub lifecycle: Lifecycle,
    pub pipeline: Chain,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policy(ExposurePolicy::default())
    }

    pub fn with_policy(policy: ExposurePolicy) -> Self {
        let registry = Arc::new(LocalRegistry::new());
        Self::build(registry.clone(), registry, policy)
    }

    /// The engine talks to `engine` (usually a [`Scripted`] wrapper) while
    /// tests inspect `local`.
    pub fn over(local: Arc<LocalRegistry>, engine: Arc<dyn PresenceRegistry>) -> Self {
        Self::build(local, engine, ExposurePolicy::default())
    }

    fn build(local: Arc<LocalRegistry>, engine: Arc<dyn PresenceRegistry>, policy: ExposurePolicy) -> Self {
        let ids: Arc<dyn IdSource> = Arc::new(SeqIds::new("srv-"));
        Self {
            lifecycle: Lifecycle::new(Arc::clone(&engine), Arc::clone(&ids), None),
            pipeline: pipeline::app_chain(engine, ids, policy),
            registry: local,
        }
    }

    /// Connect with an optional requested identity; the welcome is consumed.
    pub async fn connect(&self, id: Option<&str>) -> TestPeer {
        self.connect_with(id, 16).await
    }

    pub async fn connect_with(&self, id: Option<&str>, queue: usize) -> TestPeer {
        let (tx, rx) = mpsc::channel(queue);
        let handle = ConnectionHandle::new(tx.clone());
        let state = ConnState {
            id: id.map(str::to_owned),
            delete_on_close: None,
        };
        let (peer, close) = self.lifecycle.establish(state, handle).await.expect("establish");
        let mut p = TestPeer {
            ctx: ConnCtx::new(peer.clone(), tx),
            peer,
            rx,
            close: Some(close),
            welcome: Message::default(),
        };
        p.welcome = p.recv().await;
        p
    }

    pub async fn send(&self, from: &TestPeer, frame: Value) -> Result<()> {
        let msg = Message::from_text(&frame.to_string())?;
        self.pipeline.run(&msg, &from.ctx).await
    }

    pub async fn send_raw(&self, from: &TestPeer, text: &str) -> Result<()> {
        let msg = Message::from_text(text)?;
        self.pipeline.run(&msg, &from.ctx).await
    }
}

pub struct TestPeer {
    pub peer: Peer,
    pub ctx: ConnCtx,
    pub welcome: Message,
    rx: mpsc::Receiver<Outbound>,
    close: Option<CloseHandler>,
}

impl TestPeer {
    pub fn id(&self) -> &str {
        self.peer.id()
    }

    /// Next queued message, failing the test after one second.
    pub async fn recv(&mut self) -> Message {
        let out = tokio::time::timeout(Duration::from_secs(1), self.rx.recv())
            .await
            .expect("timed out waiting for message")
            .expect("outbound channel closed");
        match out {
            Outbound::Message(m) => m,
            other => panic!("expected message, got {other:?}"),
        }
    }

    pub async fn recv_json(&mut self) -> Value {
        serde_json::from_str(&self.recv().await.to_text().unwrap()).unwrap()
    }

    /// Nothing is queued right now.
    pub fn assert_idle(&mut self) {
        if let Ok(out) = self.rx.try_recv() {
            panic!("unexpected outbound item: {out:?}");
        }
    }

    /// Run this connection's close handler.
    pub async fn disconnect(mut self) {
        if let Some(close) = self.close.take() {
            close.run().await;
        }
    }
}

/// `LocalRegistry` with scripted misbehaviour, for races a single in-process
/// registry cannot produce on its own.
pub struct Scripted {
    inner: Arc<LocalRegistry>,
    /// Every `send` fails with this, while `info` still reports the truth.
    pub fail_send: Option<fn(String) -> RegistryError>,
    /// Delivered to an identity the moment it is registered, as if a peer had
    /// been waiting for it to come online.
    pub on_register: Option<Message>,
}

impl Scripted {
    pub fn new(inner: Arc<LocalRegistry>) -> Self {
        Self {
            inner,
            fail_send: None,
            on_register: None,
        }
    }
}

#[async_trait]
impl PresenceRegistry for Scripted {
    async fn exists(&self, id: &str) -> std::result::Result<bool, RegistryError> {
        self.inner.exists(id).await
    }

    async fn create(&self, id: &str) -> std::result::Result<(), RegistryError> {
        self.inner.create(id).await
    }

    async fn register(&self, id: &str, handle: ConnectionHandle) -> std::result::Result<(), RegistryError> {
        self.inner.register(id, handle).await?;
        if let Some(msg) = &self.on_register {
            self.inner.send(id, msg.clone()).await?;
        }
        Ok(())
    }

    async fn unregister(&self, id: &str, conn: ConnId) -> std::result::Result<(), RegistryError> {
        self.inner.unregister(id, conn).await
    }

    async fn delete(&self, id: &str) -> std::result::Result<(), RegistryError> {
        self.inner.delete(id).await
    }

    async fn info(&self, id: &str) -> std::result::Result<Option<ClientInfo>, RegistryError> {
        self.inner.info(id).await
    }

    async fn send(&self, id: &str, message: Message) -> std::result::Result<(), RegistryError> {
        match self.fail_send {
            Some(fail) => Err(fail(id.to_owned())),
            None => self.inner.send(id, message).await,
        }
    }
}
