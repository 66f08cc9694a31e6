//! Tracing subscriber setup for binaries and examples embedding the crate.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{CaptureError, Result};

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to `default_directive`.
///
/// Fails if the directive does not parse or a global subscriber is already set.
pub fn init_tracing(default_directive: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive)
            .map_err(|e| CaptureError::invalid_config("log_filter", e.to_string()))?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| CaptureError::invalid_config("log_filter", e.to_string()))
}
