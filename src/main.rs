//! twin — live telemetry monitor for the spindle / feed-drive digital twin.
//!
//! Run with:  `RUST_LOG=info twin [view]`   (e.g. `twin spindle`)

use anyhow::Result;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Structured logging — RUST_LOG controls verbosity (default: info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let view = std::env::args().nth(1);
    tracing::info!("twin v{} starting", env!("CARGO_PKG_VERSION"));

    twin_monitor::run(view).map_err(Into::into)
}
