//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::defaults::{
    default_handshake_timeout_secs, default_invoke_timeout_secs, default_keepalive_interval_secs,
    default_peer_joined, default_peer_left, default_relay_method, default_retry_delay_ms,
};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Hub address.
    pub server: ServerConfig,
    /// Local session settings.
    pub session: SessionConfig,
    /// Hub event and method names.
    #[serde(default)]
    pub events: EventsConfig,
    /// Websocket transport tuning.
    #[serde(default)]
    pub transport: TransportConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Websocket URL of the hub: `base_url + socket_path` with `http(s)`
    /// mapped to `ws(s)`.
    pub fn endpoint(&self) -> String {
        let base = self.server.base_url.trim_end_matches('/');
        let url = format!("{}{}", base, self.server.socket_path);
        if let Some(rest) = url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            url
        }
    }

    /// Fixed delay between reconnect attempts.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.session.retry_delay_ms)
    }
}

/// Hub address configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Base address (e.g., "https://presence.example.net").
    pub base_url: String,
    /// Hub path appended to the base address (e.g., "/hubs/presence").
    pub socket_path: String,
}

/// Local session configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Display name this client announces.
    pub identity: String,
    /// Fixed reconnect delay in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Static `Cookie` header sent with the websocket upgrade.
    #[serde(default)]
    pub cookie: Option<String>,
}

/// Hub event and method names.
#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    /// Event pushed when a peer joins: `(display_name, connection_id)`.
    #[serde(default = "default_peer_joined")]
    pub peer_joined: String,
    /// Event pushed when a peer leaves: `(display_name, connection_id)`.
    #[serde(default = "default_peer_left")]
    pub peer_left: String,
    /// Hub method that relays a payload to every peer.
    #[serde(default = "default_relay_method")]
    pub relay_method: String,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            peer_joined: default_peer_joined(),
            peer_left: default_peer_left(),
            relay_method: default_relay_method(),
        }
    }
}

/// Websocket transport tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,
    #[serde(default = "default_invoke_timeout_secs")]
    pub invoke_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_secs: default_handshake_timeout_secs(),
            keepalive_interval_secs: default_keepalive_interval_secs(),
            invoke_timeout_secs: default_invoke_timeout_secs(),
        }
    }
}
