//! rosterlink - presence hub client.
//!
//! Connects to the configured hub, logs peers as they come and go, and
//! reconnects until interrupted.

use rosterlink::config::validate;
use rosterlink::{Config, Peer, SessionManager, SessionObserver, StaticCookies};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Observer that writes every notification to the log.
struct LogObserver;

impl SessionObserver for LogObserver {
    fn on_connected(&self) {
        info!("Connected to hub");
    }

    fn on_disconnected(&self) {
        info!("Disconnected from hub");
    }

    fn on_peer_connected(&self, peer: &Peer) {
        info!(display_name = %peer.display_name, connection_id = %peer.connection_id, "Peer joined");
    }

    fn on_peer_disconnected(&self, peer: &Peer) {
        info!(display_name = %peer.display_name, connection_id = %peer.connection_id, "Peer left");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "rosterlink.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s) in {}", errors.len(), config_path);
    }

    info!(
        endpoint = %config.endpoint(),
        identity = %config.session.identity,
        retry_delay_ms = config.session.retry_delay_ms,
        "Starting rosterlink"
    );

    let cookies = Arc::new(StaticCookies(config.session.cookie.clone()));
    let session = SessionManager::from_config(&config, cookies);
    session.add_observer(Arc::new(LogObserver));

    let state = session.connect(config.session.identity.clone()).await;
    info!(%state, "Initial connect finished");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    session.dispose().await;

    Ok(())
}
