//! Structured logging configuration.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging.
///
/// Log levels are configurable via `RUST_LOG`; the default keeps the server
/// chatty and the noisier dependencies quiet.
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,hyper=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("structured logging initialized");
}

/// Log a per-connection lifecycle event with structured fields.
pub fn log_connection_event(event_type: &str, channel_id: &str, room_id: Option<&str>) {
    tracing::info!(
        event_type = event_type,
        channel_id = channel_id,
        room_id = room_id,
        "connection event"
    );
}
