//! Process startup: tracing initialization and the startup banner.

/// Initializes the global tracing subscriber from `RUST_LOG` (defaulting
/// to `info`), matching the filter-from-env convention the rest of this
/// codebase's ancestry uses.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .try_init();
}

/// Logs the startup banner: service name and build version, plus the
/// fully-resolved configuration. Mirrors the version/startup log the
/// original service printed before entering its main loop.
pub fn log_startup_banner(config: &marc_ingest_config::RuntimeConfig) {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        workers = config.workers,
        "marc-ingest starting"
    );
}
