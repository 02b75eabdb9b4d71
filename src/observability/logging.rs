//! Tracing subscriber initialization.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::{Error, Result};

/// Initialize the global tracing subscriber.
///
/// The filter is taken from `RUST_LOG` when set, defaulting to `info` for
/// this crate and `warn` elsewhere.
pub fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,gatehouse=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .map_err(|err| Error::config(format!("Failed to initialize tracing: {}", err)))?;

    Ok(())
}
