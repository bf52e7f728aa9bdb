//! Default value functions for configuration.

// =============================================================================
// Session Defaults
// =============================================================================

pub fn default_retry_delay_ms() -> u64 {
    5000
}

// =============================================================================
// Event Name Defaults
// =============================================================================

pub fn default_peer_joined() -> String {
    "OnConnected".to_string()
}

pub fn default_peer_left() -> String {
    "OnDisconnected".to_string()
}

pub fn default_relay_method() -> String {
    "SendToAll".to_string()
}

// =============================================================================
// Transport Defaults
// =============================================================================

pub fn default_handshake_timeout_secs() -> u64 {
    15
}

pub fn default_keepalive_interval_secs() -> u64 {
    15
}

pub fn default_invoke_timeout_secs() -> u64 {
    30
}
