//! Shared application state for the sigRelay gateway.
//!
//! Wires the presence registry, connection lifecycle and message pipeline
//! once at startup; every connection task shares them through `AppState`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use sigrelay_core::error::Result;

use crate::config::GatewayConfig;
use crate::obs::metrics::GatewayMetrics;
use crate::pipeline::{self, Chain};
use crate::presence::{LocalRegistry, PresenceRegistry};
use crate::session::{IdSource, Lifecycle, UuidIds};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: GatewayConfig,
    registry: Arc<dyn PresenceRegistry>,
    local: Option<Arc<LocalRegistry>>,
    lifecycle: Lifecycle,
    pipeline: Chain,
    metrics: GatewayMetrics,
    draining: AtomicBool,
    shutdown: watch::Sender<bool>,
    live: watch::Sender<usize>,
}

/// Held by every upgraded connection task; the live count drops with it.
pub struct SessionGuard {
    app: AppState,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.app.inner.live.send_modify(|n| *n = n.saturating_sub(1));
    }
}

impl AppState {
    /// Build state backed by an in-process `LocalRegistry`, with the
    /// configured identities provisioned.
    pub fn new(cfg: GatewayConfig) -> Result<Self> {
        let local = Arc::new(LocalRegistry::new());
        for id in &cfg.identity.provisioned {
            local.provision(id);
        }
        tracing::info!(provisioned = cfg.identity.provisioned.len(), "local registry ready");

        let registry: Arc<dyn PresenceRegistry> = local.clone();
        Self::build(cfg, registry, Some(local), Arc::new(UuidIds))
    }

    /// Build state around an externally owned registry and id source.
    /// Provisioning is the caller's job here.
    pub fn with_registry(
        cfg: GatewayConfig,
        registry: Arc<dyn PresenceRegistry>,
        ids: Arc<dyn IdSource>,
    ) -> Result<Self> {
        Self::build(cfg, registry, None, ids)
    }

    fn build(
        cfg: GatewayConfig,
        registry: Arc<dyn PresenceRegistry>,
        local: Option<Arc<LocalRegistry>>,
        ids: Arc<dyn IdSource>,
    ) -> Result<Self> {
        cfg.validate()?;

        let lifecycle = Lifecycle::new(Arc::clone(&registry), Arc::clone(&ids), cfg.rtc.clone());
        let pipeline = pipeline::app_chain(Arc::clone(&registry), ids, cfg.errors.policy());
        tracing::debug!(hooks = ?pipeline.names(), "message pipeline");

        let (shutdown, _) = watch::channel(false);
        let (live, _) = watch::channel(0usize);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                registry,
                local,
                lifecycle,
                pipeline,
                metrics: GatewayMetrics::default(),
                draining: AtomicBool::new(false),
                shutdown,
                live,
            }),
        })
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn registry(&self) -> Arc<dyn PresenceRegistry> {
        Arc::clone(&self.inner.registry)
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.inner.lifecycle
    }

    pub fn pipeline(&self) -> &Chain {
        &self.inner.pipeline
    }

    pub fn metrics(&self) -> &GatewayMetrics {
        &self.inner.metrics
    }

    /// Registry gauges for `/metrics` (only known for the local registry).
    pub fn metrics_extra(&self) -> Vec<(&'static str, u64)> {
        match &self.inner.local {
            Some(local) => vec![
                ("sigrelay_registry_entries", local.len() as u64),
                ("sigrelay_registry_online", local.online_count() as u64),
            ],
            None => Vec::new(),
        }
    }

    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::Relaxed)
    }

    /// Stop accepting upgrades and ask every live connection to close (1001).
    pub fn begin_drain(&self) {
        self.inner.draining.store(true, Ordering::Relaxed);
        self.inner.shutdown.send_replace(true);
    }

    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.subscribe()
    }

    /// Count a connection task as live until the guard is dropped.
    pub fn track_session(&self) -> SessionGuard {
        self.inner.live.send_modify(|n| *n += 1);
        SessionGuard { app: self.clone() }
    }

    pub fn live_sessions(&self) -> usize {
        *self.inner.live.borrow()
    }

    /// Wait until every tracked connection task has finished, including its
    /// close handler. Returns `false` if `limit` elapsed first.
    pub async fn wait_drained(&self, limit: Duration) -> bool {
        let mut live = self.inner.live.subscribe();
        let drained = tokio::time::timeout(limit, live.wait_for(|n| *n == 0)).await;
        matches!(drained, Ok(Ok(_)))
    }
}
