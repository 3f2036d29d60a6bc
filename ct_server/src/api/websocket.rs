//! WebSocket handler: one channel per socket.
//!
//! The socket splits into a writer task draining the channel's outbound
//! queue and a read loop feeding raw frames to the dispatcher. The room
//! actor fills the outbound queue in journal order; a client that stops
//! reading is disconnected by the room rather than reordered around.
//!
//! # Connection Flow
//!
//! 1. Client connects via `GET /ws` and is assigned a channel id
//! 2. Client sends lobby frames (`create_room`, `join_room`, `client_ready`)
//! 3. Once seated, every broadcast for that seat flows down this socket
//! 4. On disconnect the room marks the seat and the grace timer starts

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::AppState;

/// How many outbound frames may queue per socket before the room treats
/// the client as stuck.
const OUTBOUND_QUEUE_DEPTH: usize = 256;

/// Upgrade an HTTP connection to the frame-oriented game channel.
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one established WebSocket until either side closes.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let channel_id = Uuid::new_v4();

    info!("websocket connected: channel={channel_id}");
    crate::logging::log_connection_event("connected", &channel_id.to_string(), None);

    // Outbound: the room actor and the dispatcher both write here; a
    // single writer task preserves frame order on the socket.
    let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE_DEPTH);
    let send_task = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    // Inbound: every text frame goes through the dispatcher.
    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!("channel {channel_id}: frame {text}");
                state
                    .dispatcher
                    .handle_frame(channel_id, &text, &out_tx)
                    .await;
            }
            Ok(Message::Close(_)) => {
                info!("websocket closed: channel={channel_id}");
                break;
            }
            Ok(_) => {}
            Err(err) => {
                warn!("websocket error on channel {channel_id}: {err}");
                break;
            }
        }
    }

    // Tell the seat's room (if any) and drop the route.
    state.dispatcher.handle_close(channel_id).await;
    send_task.abort();

    crate::logging::log_connection_event("disconnected", &channel_id.to_string(), None);
    info!("websocket disconnected: channel={channel_id}");
}
