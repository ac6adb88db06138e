//! Logging infrastructure for Resus.
//!
//! Provides centralized tracing setup for all binaries. Output goes to
//! stderr so stdout stays free for command output.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging from the `[logging]` config section
///
/// RUST_LOG overrides the configured level.
pub fn init_with(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (compact, pretty) = match config.format {
        LogFormat::Compact => (Some(fmt::layer().compact().with_writer(std::io::stderr)), None),
        LogFormat::Pretty => (None, Some(fmt::layer().pretty().with_writer(std::io::stderr))),
    };

    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(compact)
        .with(pretty)
        .try_init()
    {
        tracing::debug!("Logging already initialized: {}", e);
    }
}

/// Initialize logging for testing (captures logs for test output)
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
