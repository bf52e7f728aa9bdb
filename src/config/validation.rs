//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.base_url is required")]
    MissingBaseUrl,
    #[error("server.base_url must use http, https, ws or wss, got '{0}'")]
    UnsupportedScheme(String),
    #[error("server.socket_path must start with '/', got '{0}'")]
    InvalidSocketPath(String),
    #[error("hub endpoint '{0}' is not a valid URI")]
    InvalidEndpoint(String),
    #[error("session.identity is required")]
    MissingIdentity,
    #[error("events.{0} must not be empty")]
    EmptyEventName(&'static str),
    #[error("transport.{0} must be greater than zero")]
    ZeroTimeout(&'static str),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // Hub address
    let base = config.server.base_url.trim();
    if base.is_empty() {
        errors.push(ValidationError::MissingBaseUrl);
    } else if !["http://", "https://", "ws://", "wss://"]
        .iter()
        .any(|scheme| base.starts_with(scheme))
    {
        errors.push(ValidationError::UnsupportedScheme(base.to_string()));
    }

    if !config.server.socket_path.starts_with('/') {
        errors.push(ValidationError::InvalidSocketPath(config.server.socket_path.clone()));
    }

    if !base.is_empty() {
        let endpoint = config.endpoint();
        if endpoint.parse::<http::Uri>().is_err() {
            errors.push(ValidationError::InvalidEndpoint(endpoint));
        }
    }

    if config.session.identity.trim().is_empty() {
        errors.push(ValidationError::MissingIdentity);
    }

    // Event names
    for (field, value) in [
        ("peer_joined", &config.events.peer_joined),
        ("peer_left", &config.events.peer_left),
        ("relay_method", &config.events.relay_method),
    ] {
        if value.is_empty() {
            errors.push(ValidationError::EmptyEventName(field));
        }
    }

    // Transport timings
    for (field, value) in [
        ("handshake_timeout_secs", config.transport.handshake_timeout_secs),
        ("keepalive_interval_secs", config.transport.keepalive_interval_secs),
        ("invoke_timeout_secs", config.transport.invoke_timeout_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout(field));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
