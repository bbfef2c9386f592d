//! Logging setup for the binary.

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a stderr fmt subscriber filtered by `directives`
/// (e.g. `info` or `tunedeck=debug,abc=warn`).
///
/// The configured level already reflects `RUST_LOG` when it is set.
pub fn init(directives: &str) -> Result<()> {
    let env_filter = EnvFilter::try_new(directives)
        .with_context(|| format!("Invalid log filter '{}'", directives))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}
