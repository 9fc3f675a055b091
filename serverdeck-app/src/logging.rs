//! Tracing subscriber setup.

use serverdeck_core::{CoreError, CoreResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a stderr subscriber filtered by `RUST_LOG` (default `info`).
///
/// `log` records from the core are bridged into the same subscriber. Fails if a global
/// subscriber is already installed.
pub fn init_logging() -> CoreResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_ansi(false),
        )
        .with(filter)
        .try_init()
        .map_err(|e| CoreError::ConfigError(format!("Failed to initialize logging: {e}")))?;

    tracing::info!("Logging initialized");
    Ok(())
}
