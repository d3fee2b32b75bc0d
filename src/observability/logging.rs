//! # Logging
//!
//! Installs the `tracing` subscriber for the CLI.
//!
//! Library code only emits events; nothing in the binding engine reads global logging
//! state, so tests can run in parallel without a subscriber.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Build the env filter: `RUST_LOG` wins, otherwise the configured level applies to
/// this crate and `warn` to everything else.
#[must_use]
pub fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,binding_secret_controller={}",
            log_level.to_ascii_lowercase()
        ))
    })
}

/// Install the global fmt subscriber, writing to stderr so stdout stays parseable
#[allow(
    clippy::missing_errors_doc,
    reason = "Fails only if a global subscriber is already installed"
)]
pub fn init_tracing(log_level: &str, enable_color: bool) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(log_level))
        .with_ansi(enable_color)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))
}
