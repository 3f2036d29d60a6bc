//! Multi-room Castellan server using the async actor model.
//!
//! Each room runs as its own actor task spawned through the room manager;
//! this binary supplies the WebSocket transport, configuration and logging
//! around the `castellan` library.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Error;
use castellan::room::{ConnectionRegistry, RoomManager};
use ct_server::{api, config::ServerConfig, logging};
use log::info;
use pico_args::Arguments;

const HELP: &str = "\
Run a multi-room Castellan (Liap Tui) server

USAGE:
  ct_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8765]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND                        Server bind address (e.g., 0.0.0.0:8765)
  ROOM_WIN_THRESHOLD                 Score needed to win a game     [default: 50]
  ROOM_WEAK_HAND_THRESHOLD           Weak-hand point threshold      [default: 9]
  ROOM_REDEAL_MODE                   sequential | simultaneous      [default: sequential]
  ROOM_MAX_REDEAL_MULTIPLIER         Cap on redeal doubling         [default: uncapped]
  ROOM_BOT_DECISION_DELAY_MS         Bot think time                 [default: 800]
  ROOM_DISCONNECT_GRACE_SECS         Grace before bot takeover      [default: 30]
  ROOM_IDLE_EVICTION_SECS            Idle room eviction window      [default: 300]
  ROOM_TURN_RESULTS_AUTO_ADVANCE_MS  Pile result display time       [default: 3000]
  RUST_LOG                           Log filter (e.g., debug)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists.
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let bind_override: Option<SocketAddr> = pargs.opt_value_from_str("--bind")?;

    // The tracing subscriber also bridges `log` records from the library.
    logging::init();

    let server_config = ServerConfig::from_env(bind_override)?;
    server_config.validate()?;

    info!("starting multi-room server at {}", server_config.bind);

    let rooms = Arc::new(RoomManager::new(server_config.room.clone()));
    let connections = Arc::new(ConnectionRegistry::new());

    let state = api::AppState::new(rooms, connections);
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(server_config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind to {}: {}", server_config.bind, e))?;

    info!(
        "server is running at ws://{}/ws. Press Ctrl+C to stop.",
        server_config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("server error: {}", e))?;

    info!("shutting down server...");

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
}
