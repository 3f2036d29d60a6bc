//! Wire frame shapes.
//!
//! Every frame on the channel is a JSON object. Inbound frames carry an
//! event name, a payload and an optional idempotency key; outbound frames
//! add the room's journal version, the body checksum and a timestamp.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::errors::WireError;
use crate::game::CommittedBatch;
use crate::game::journal::{ChangeRecord, checksum};
use crate::game::room::SeatIndex;

/// Inbound event names the dispatcher recognizes.
pub const INBOUND_EVENTS: [&str; 22] = [
    "ping",
    "client_ready",
    "ack",
    "sync_request",
    "request_room_list",
    "get_rooms",
    "create_room",
    "join_room",
    "leave_room",
    "get_room_state",
    "add_bot",
    "remove_player",
    "start_game",
    "declare",
    "play",
    "play_pieces",
    "request_redeal",
    "accept_redeal",
    "decline_redeal",
    "redeal_decision",
    "player_ready",
    "leave_game",
];

/// One parsed inbound frame.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InboundFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
}

impl InboundFrame {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

fn now_secs() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// A `phase_change` snapshot frame for one seat.
#[must_use]
pub fn phase_change(batch: &CommittedBatch, seat: SeatIndex) -> Value {
    json!({
        "event": "phase_change",
        "data": batch.seat_bodies[seat],
        "version": batch.version,
        "checksum": batch.checksum,
        "timestamp": batch.timestamp,
    })
}

/// The public flavor of a snapshot frame (no private hand).
#[must_use]
pub fn phase_change_public(batch: &CommittedBatch) -> Value {
    json!({
        "event": "phase_change",
        "data": batch.public_body,
        "version": batch.version,
        "checksum": batch.checksum,
        "timestamp": batch.timestamp,
    })
}

/// A granular event frame carrying one journal record, used for resync
/// streaming.
#[must_use]
pub fn journal_record(record: &ChangeRecord) -> Value {
    let data = json!({
        "phase": record.phase,
        "changes": record.changes,
        "reason": record.reason,
    });
    let digest = checksum(&data);
    json!({
        "event": "room_update",
        "data": data,
        "version": record.version,
        "checksum": digest,
        "timestamp": now_secs(),
    })
}

/// A room-scoped event frame (action acknowledgments, lifecycle events).
#[must_use]
pub fn room_event(event: &str, data: Value, version: u64) -> Value {
    let digest = checksum(&data);
    json!({
        "event": event,
        "data": data,
        "version": version,
        "checksum": digest,
        "timestamp": now_secs(),
    })
}

/// A pre-room (lobby) frame: no journal version applies.
#[must_use]
pub fn lobby_event(event: &str, data: Value) -> Value {
    json!({
        "event": event,
        "data": data,
        "timestamp": now_secs(),
    })
}

/// An error frame for the offending channel only.
#[must_use]
pub fn error(err: &WireError) -> Value {
    json!({
        "event": "error",
        "data": err,
        "timestamp": now_secs(),
    })
}

/// Marker telling a client its local history is unusable; the full
/// snapshot follows.
#[must_use]
pub fn full_resync(version: u64) -> Value {
    json!({
        "event": "room_update",
        "data": { "full_resync": true },
        "version": version,
        "timestamp": now_secs(),
    })
}

#[must_use]
pub fn pong() -> Value {
    lobby_event("pong", json!({}))
}

/// Normalize a seat reference from frame data: 0-based `seat_position`
/// preferred, 1-based `slot_id` accepted for frontend compatibility.
#[must_use]
pub fn seat_from_data(data: &Value) -> Option<SeatIndex> {
    if let Some(seat) = data.get("seat_position").and_then(Value::as_u64) {
        return Some(seat as SeatIndex);
    }
    if let Some(slot) = data.get("slot_id").and_then(Value::as_u64) {
        return (slot >= 1).then(|| (slot - 1) as SeatIndex);
    }
    None
}
