//! WebSocket API for the Castellan room server.
//!
//! The surface is deliberately small: a health check for load balancers and
//! one WebSocket route. Everything else (the lobby directory, joining,
//! every in-game verb) travels as JSON frames over the socket and is
//! routed by the library's dispatcher.

pub mod websocket;

use axum::{
    Router,
    extract::State,
    response::{IntoResponse, Json},
    routing::get,
};
use castellan::net::Dispatcher;
use castellan::room::{ConnectionRegistry, RoomManager};
use serde_json::json;
use std::sync::Arc;

/// Application state shared across handlers. Cloned per request; cheap due
/// to the Arc wrappers.
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RoomManager>,
    pub connections: Arc<ConnectionRegistry>,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    #[must_use]
    pub fn new(rooms: Arc<RoomManager>, connections: Arc<ConnectionRegistry>) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(rooms.clone(), connections.clone()));
        Self {
            rooms,
            connections,
            dispatcher,
        }
    }
}

/// Create the router: health check plus the WebSocket upgrade route.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(websocket::websocket_handler))
        .with_state(state)
}

/// Health check endpoint for monitoring and load balancers.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let response = json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "rooms": state.rooms.active_room_count().await,
        "connections": state.connections.active_channels().await,
    });
    Json(response)
}
