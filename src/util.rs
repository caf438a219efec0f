//! Process setup shared by the binaries

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerMode;

/// Install the stderr subscriber for the library and the calling binary
///
/// Debug mode traces everything the crate does, release mode keeps to `info`.
pub fn init_tracing(binary: &'static str, mode: ServerMode) {
    let level = match mode {
        ServerMode::Debug => LevelFilter::TRACE,
        ServerMode::Release => LevelFilter::INFO,
    };

    let filter = filter::Targets::new().with_targets(vec![
        ("optical_nms", level),
        (binary, level),
        ("tower_http", LevelFilter::DEBUG),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

/// Resolves on Ctrl-C; a failing signal handler resolves immediately
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
    }
}
