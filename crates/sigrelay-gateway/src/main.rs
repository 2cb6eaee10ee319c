//! sigRelay gateway binary.
//!
//! - WebSocket endpoint: /v1/ws (optional ?id=...)
//! - Ops: /healthz, /readyz, /metrics
//! - Ctrl-C drains: readiness flips, live connections close with 1001

use std::error::Error;
use std::net::SocketAddr;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

use sigrelay_gateway::{app_state::AppState, config, router};

const CONFIG_ENV: &str = "SIGRELAY_CONFIG";
const DEFAULT_CONFIG: &str = "sigrelay.yaml";

/// Upper bound on waiting for upgraded sessions after the listener stops.
const DRAIN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG.to_owned());
    let cfg = config::load_or_default(&path)?;
    let listen: SocketAddr = cfg.gateway.listen.parse()?;

    let state = AppState::new(cfg)?;
    let app = router::build_router(state.clone());

    tracing::info!(%listen, config = %path, "sigrelay-gateway starting");
    let listener = tokio::net::TcpListener::bind(listen).await?;

    let drain = state.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "ctrl_c listener failed");
            }
            tracing::info!("shutdown requested, draining");
            drain.begin_drain();
        })
        .await?;

    // upgraded sockets are detached from the server; wait for their close handlers
    if state.wait_drained(DRAIN_GRACE).await {
        tracing::info!("all sessions closed");
    } else {
        tracing::warn!(live = state.live_sessions(), "sessions still open after drain grace");
    }

    Ok(())
}
