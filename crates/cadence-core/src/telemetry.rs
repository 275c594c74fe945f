//! Tracing subscriber setup for host applications embedding the engine.
//!
//! The library crates only emit `tracing` events; installing a subscriber is
//! the host's call. Hosts that have no logging of their own call
//! [`init_tracing`] once at startup.

use tracing_subscriber::EnvFilter;

use crate::{
    config::LoggingConfig,
    error::{CoreError, Result},
};

/// Install a global `fmt` subscriber. `RUST_LOG` wins over `config.filter`.
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| CoreError::Telemetry(e.to_string()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target)
        .try_init()
        .map_err(|e| CoreError::Telemetry(e.to_string()))
}
