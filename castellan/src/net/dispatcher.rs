//! Inbound frame routing.
//!
//! The dispatcher is a thin translator: it parses frames, answers
//! connection-level events itself, forwards directory events to the room
//! registry, and turns everything else into a queued room action. It never
//! calls phase logic; validation failures and unknown events produce an
//! `error` frame on the offending channel only.

use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::game::room::SeatIndex;
use crate::game::{GameAction, PlayerAction};
use crate::room::{
    ChannelBinding, ConnectionRegistry, RoomManager, RoomMessage, SeatSession,
};

use super::errors::{ErrorKind, WireError};
use super::frames::{self, InboundFrame};

pub struct Dispatcher {
    rooms: Arc<RoomManager>,
    connections: Arc<ConnectionRegistry>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(rooms: Arc<RoomManager>, connections: Arc<ConnectionRegistry>) -> Self {
        Self { rooms, connections }
    }

    #[must_use]
    pub fn rooms(&self) -> &Arc<RoomManager> {
        &self.rooms
    }

    /// Handle one raw inbound frame from `channel_id`. Replies and errors
    /// go to `out`, the channel's outbound sink.
    pub async fn handle_frame(&self, channel_id: Uuid, raw: &str, out: &mpsc::Sender<String>) {
        let frame = match InboundFrame::parse(raw) {
            Ok(frame) => frame,
            Err(err) => {
                self.reply_error(
                    out,
                    WireError::new(ErrorKind::Validation, format!("malformed frame: {err}")),
                )
                .await;
                return;
            }
        };

        match frame.event.as_str() {
            // Connection events: answered without touching any room queue.
            "ping" => {
                self.reply(out, frames::pong()).await;
            }
            "ack" => self.handle_ack(channel_id, &frame).await,
            "client_ready" => self.handle_client_ready(channel_id, &frame, out).await,
            "sync_request" => self.handle_sync_request(channel_id, &frame, out).await,

            // Directory events: room registry only.
            "get_rooms" | "request_room_list" => {
                let rooms = self.rooms.list_rooms().await;
                self.reply(
                    out,
                    frames::lobby_event("room_list_update", json!({ "rooms": rooms })),
                )
                .await;
            }
            "create_room" => self.handle_create_room(channel_id, &frame, out).await,
            "join_room" => self.handle_join_room(channel_id, &frame, out).await,
            "leave_room" => self.handle_leave_room(channel_id, out).await,
            "get_room_state" => self.handle_get_room_state(channel_id, &frame, out).await,

            // Everything else is an in-room action.
            event if frames::INBOUND_EVENTS.contains(&event) => {
                self.handle_room_action(channel_id, frame, out).await;
            }
            unknown => {
                self.reply_error(
                    out,
                    WireError::new(ErrorKind::Validation, format!("unknown event {unknown}")),
                )
                .await;
            }
        }
    }

    /// The channel closed: tell its room, drop the route.
    pub async fn handle_close(&self, channel_id: Uuid) {
        if let Some(route) = self.connections.unregister(channel_id).await
            && let Some(handle) = self.rooms.get_room(&route.room_id).await
        {
            let _ = handle.send(RoomMessage::Disconnect { channel_id }).await;
        }
    }

    async fn handle_ack(&self, channel_id: Uuid, frame: &InboundFrame) {
        let Some(version) = frame.data.get("version").and_then(Value::as_u64) else {
            return;
        };
        if let Some(route) = self.connections.lookup(channel_id).await
            && let Some(handle) = self.rooms.get_room(&route.room_id).await
        {
            let _ = handle
                .send(RoomMessage::Ack {
                    seat: route.seat,
                    version,
                })
                .await;
        }
    }

    /// Reconnect handshake: bind this channel to an existing seat and
    /// replay whatever the seat missed since `last_ack_version`.
    async fn handle_client_ready(
        &self,
        channel_id: Uuid,
        frame: &InboundFrame,
        out: &mpsc::Sender<String>,
    ) {
        let Some(room_id) = frame.data.get("room_id").and_then(Value::as_str) else {
            // A lobby-only client with no room yet: just acknowledge.
            self.reply(out, frames::lobby_event("client_ready_ack", json!({})))
                .await;
            return;
        };
        let Some(player_name) = frame.data.get("player_name").and_then(Value::as_str) else {
            self.reply_error(
                out,
                WireError::new(ErrorKind::Validation, "client_ready requires player_name"),
            )
            .await;
            return;
        };
        let Some(handle) = self.rooms.get_room(room_id).await else {
            self.room_not_found(out, room_id).await;
            return;
        };

        let (tx, rx) = oneshot::channel();
        let message = RoomMessage::Connect {
            display_name: player_name.to_string(),
            channel: ChannelBinding {
                channel_id,
                sender: out.clone(),
            },
            last_ack_version: frame.data.get("last_ack_version").and_then(Value::as_u64),
            response: tx,
        };
        match self.session_round_trip(&handle, message, rx).await {
            Ok(session) => {
                self.connections
                    .register(channel_id, session.room_id.clone(), session.seat)
                    .await;
                self.reply(
                    out,
                    frames::lobby_event(
                        "client_ready_ack",
                        json!({
                            "room_id": session.room_id,
                            "seat_position": session.seat,
                            "version": session.version,
                        }),
                    ),
                )
                .await;
            }
            Err(err) => self.reply_error(out, err).await,
        }
    }

    async fn handle_sync_request(
        &self,
        channel_id: Uuid,
        frame: &InboundFrame,
        out: &mpsc::Sender<String>,
    ) {
        let Some(route) = self.connections.lookup(channel_id).await else {
            self.reply_error(
                out,
                WireError::new(ErrorKind::NotFound, "channel is not in a room"),
            )
            .await;
            return;
        };
        let last_version = frame
            .data
            .get("last_version")
            .or_else(|| frame.data.get("last_ack_version"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        if let Some(handle) = self.rooms.get_room(&route.room_id).await {
            let _ = handle
                .send(RoomMessage::SyncRequest {
                    seat: route.seat,
                    last_version,
                })
                .await;
        }
    }

    async fn handle_create_room(
        &self,
        channel_id: Uuid,
        frame: &InboundFrame,
        out: &mpsc::Sender<String>,
    ) {
        let Some(player_name) = frame.data.get("player_name").and_then(Value::as_str) else {
            self.reply_error(
                out,
                WireError::new(ErrorKind::Validation, "create_room requires player_name"),
            )
            .await;
            return;
        };

        let handle = match self.rooms.create_room().await {
            Ok(handle) => handle,
            Err(err) => {
                self.reply_error(out, WireError::new(ErrorKind::Internal, err))
                    .await;
                return;
            }
        };

        let (tx, rx) = oneshot::channel();
        let message = RoomMessage::Join {
            display_name: player_name.to_string(),
            preferred_seat: frames::seat_from_data(&frame.data),
            avatar_color: frame
                .data
                .get("avatar_color")
                .and_then(Value::as_str)
                .map(String::from),
            channel: ChannelBinding {
                channel_id,
                sender: out.clone(),
            },
            response: tx,
        };
        match self.session_round_trip(&handle, message, rx).await {
            Ok(session) => {
                self.connections
                    .register(channel_id, session.room_id.clone(), session.seat)
                    .await;
                self.reply(
                    out,
                    frames::lobby_event(
                        "room_created",
                        json!({
                            "room_id": session.room_id,
                            "seat_position": session.seat,
                            "room": session.room_info,
                        }),
                    ),
                )
                .await;
            }
            Err(err) => self.reply_error(out, err).await,
        }
    }

    async fn handle_join_room(
        &self,
        channel_id: Uuid,
        frame: &InboundFrame,
        out: &mpsc::Sender<String>,
    ) {
        let (Some(room_id), Some(player_name)) = (
            frame.data.get("room_id").and_then(Value::as_str),
            frame.data.get("player_name").and_then(Value::as_str),
        ) else {
            self.reply_error(
                out,
                WireError::new(
                    ErrorKind::Validation,
                    "join_room requires room_id and player_name",
                ),
            )
            .await;
            return;
        };

        let Some(handle) = self.rooms.get_room(room_id).await else {
            self.room_not_found(out, room_id).await;
            return;
        };

        let (tx, rx) = oneshot::channel();
        let message = RoomMessage::Join {
            display_name: player_name.to_string(),
            preferred_seat: frames::seat_from_data(&frame.data),
            avatar_color: frame
                .data
                .get("avatar_color")
                .and_then(Value::as_str)
                .map(String::from),
            channel: ChannelBinding {
                channel_id,
                sender: out.clone(),
            },
            response: tx,
        };
        match self.session_round_trip(&handle, message, rx).await {
            Ok(session) => {
                self.connections
                    .register(channel_id, session.room_id.clone(), session.seat)
                    .await;
                self.reply(
                    out,
                    frames::lobby_event(
                        "room_joined",
                        json!({
                            "room_id": session.room_id,
                            "seat_position": session.seat,
                            "room": session.room_info,
                        }),
                    ),
                )
                .await;
            }
            Err(err) => self.reply_error(out, err).await,
        }
    }

    /// Lobby-level departure, distinct from the in-room `leave_game`
    /// action: the seat is vacated through the room registry and the
    /// channel's route is released. No game action is enqueued.
    async fn handle_leave_room(&self, channel_id: Uuid, out: &mpsc::Sender<String>) {
        let Some(route) = self.connections.unregister(channel_id).await else {
            self.reply_error(
                out,
                WireError::new(ErrorKind::NotFound, "channel is not in a room"),
            )
            .await;
            return;
        };

        match self.rooms.leave_room(&route.room_id, route.seat).await {
            Ok(()) => {
                self.reply(
                    out,
                    frames::lobby_event(
                        "room_update",
                        json!({
                            "room_id": route.room_id,
                            "seat_position": route.seat,
                            "left": true,
                        }),
                    ),
                )
                .await;
            }
            Err(err) => self.reply_error(out, err).await,
        }
    }

    async fn handle_get_room_state(
        &self,
        channel_id: Uuid,
        frame: &InboundFrame,
        out: &mpsc::Sender<String>,
    ) {
        let route = self.connections.lookup(channel_id).await;
        let room_id = frame
            .data
            .get("room_id")
            .and_then(Value::as_str)
            .map(String::from)
            .or_else(|| route.as_ref().map(|r| r.room_id.clone()));

        let Some(room_id) = room_id else {
            self.reply_error(
                out,
                WireError::new(ErrorKind::Validation, "get_room_state requires room_id"),
            )
            .await;
            return;
        };
        let Some(handle) = self.rooms.get_room(&room_id).await else {
            self.room_not_found(out, &room_id).await;
            return;
        };

        // Private hand only when the channel actually sits in that room.
        let seat = route
            .filter(|r| r.room_id == room_id)
            .map(|r| r.seat);

        let (tx, rx) = oneshot::channel();
        if handle
            .send(RoomMessage::GetState { seat, response: tx })
            .await
            .is_ok()
            && let Ok(state) = rx.await
        {
            self.reply(out, state).await;
        } else {
            self.room_not_found(out, &room_id).await;
        }
    }

    /// Translate an in-room verb into a queued action and forward the
    /// room's reply frame verbatim.
    async fn handle_room_action(
        &self,
        channel_id: Uuid,
        frame: InboundFrame,
        out: &mpsc::Sender<String>,
    ) {
        let Some(route) = self.connections.lookup(channel_id).await else {
            self.reply_error(
                out,
                WireError::new(ErrorKind::NotFound, "channel is not in a room"),
            )
            .await;
            return;
        };
        let Some(handle) = self.rooms.get_room(&route.room_id).await else {
            self.room_not_found(out, &route.room_id).await;
            return;
        };

        let player_action = match translate_action(&frame.event, &frame.data) {
            Ok(action) => action,
            Err(err) => {
                self.reply_error(out, err).await;
                return;
            }
        };

        let mut action = GameAction::new(route.seat, player_action);
        action.request_id = frame.request_id;

        let (tx, rx) = oneshot::channel();
        match handle.try_send(RoomMessage::Action {
            action,
            response: Some(tx),
        }) {
            Ok(()) => {
                if let Ok(reply) = rx.await {
                    self.reply(out, reply).await;
                }
            }
            Err(TrySendError::Full(_)) => {
                self.reply_error(
                    out,
                    WireError::new(ErrorKind::Overload, "room queue full, retry shortly"),
                )
                .await;
            }
            Err(TrySendError::Closed(_)) => {
                self.room_not_found(out, &route.room_id).await;
            }
        }
    }

    async fn session_round_trip(
        &self,
        handle: &crate::room::RoomHandle,
        message: RoomMessage,
        rx: oneshot::Receiver<Result<SeatSession, WireError>>,
    ) -> Result<SeatSession, WireError> {
        handle
            .send(message)
            .await
            .map_err(|_| WireError::new(ErrorKind::NotFound, "room is closed"))?;
        rx.await
            .map_err(|_| WireError::new(ErrorKind::Internal, "room did not answer"))?
    }

    async fn reply(&self, out: &mpsc::Sender<String>, frame: Value) {
        let _ = out.send(frame.to_string()).await;
    }

    async fn reply_error(&self, out: &mpsc::Sender<String>, err: WireError) {
        self.reply(out, frames::error(&err)).await;
    }

    async fn room_not_found(&self, out: &mpsc::Sender<String>, room_id: &str) {
        self.reply(
            out,
            frames::lobby_event("room_not_found", json!({ "room_id": room_id })),
        )
        .await;
    }
}

/// Map a wire verb and payload onto the engine's action type. Wire
/// synonyms (`play_pieces`, `request_redeal`, `redeal_decision`) normalize
/// here so the engine sees one canonical verb each.
fn translate_action(event: &str, data: &Value) -> Result<PlayerAction, WireError> {
    let validation = |message: &str| WireError::new(ErrorKind::Validation, message);

    match event {
        "start_game" => Ok(PlayerAction::StartGame),
        "add_bot" => Ok(PlayerAction::AddBot {
            seat: frames::seat_from_data(data),
        }),
        "remove_player" => Ok(PlayerAction::RemovePlayer {
            seat: frames::seat_from_data(data)
                .ok_or_else(|| validation("remove_player requires a seat"))?,
        }),
        "declare" => {
            let value = data
                .get("value")
                .and_then(Value::as_u64)
                .ok_or_else(|| validation("declare requires a value"))?;
            let value =
                u8::try_from(value).map_err(|_| validation("declaration out of range"))?;
            Ok(PlayerAction::Declare { value })
        }
        "play" | "play_pieces" => {
            let indices = data
                .get("indices")
                .and_then(Value::as_array)
                .ok_or_else(|| validation("play requires piece indices"))?
                .iter()
                .map(|v| v.as_u64().map(|v| v as SeatIndex))
                .collect::<Option<Vec<usize>>>()
                .ok_or_else(|| validation("piece indices must be integers"))?;
            Ok(PlayerAction::Play { indices })
        }
        "accept_redeal" | "request_redeal" => Ok(PlayerAction::AcceptRedeal),
        "decline_redeal" => Ok(PlayerAction::DeclineRedeal),
        "redeal_decision" => {
            let accept = data
                .get("accept")
                .and_then(Value::as_bool)
                .ok_or_else(|| validation("redeal_decision requires accept"))?;
            Ok(if accept {
                PlayerAction::AcceptRedeal
            } else {
                PlayerAction::DeclineRedeal
            })
        }
        "player_ready" => Ok(PlayerAction::PlayerReady),
        "leave_game" => Ok(PlayerAction::LeaveGame),
        other => Err(validation(&format!("unhandled event {other}"))),
    }
}
