//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Config struct definitions (Config, ServerConfig, SessionConfig, ...)
//! - [`defaults`]: serde default functions
//! - [`validation`]: startup validation returning every problem found

mod defaults;
mod types;
pub mod validation;

pub use types::{Config, ConfigError, EventsConfig, ServerConfig, SessionConfig, TransportConfig};
pub use validation::{ValidationError, validate};
