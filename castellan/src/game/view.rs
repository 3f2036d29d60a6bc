//! Broadcast view construction.
//!
//! Internal state is never serialized directly: every outbound body is built
//! here as plain JSON, with private hands injected only into the owning
//! seat's copy. The checksum is taken over the public body before any hand
//! is added, so all four clients can compare digests for divergence.

use serde_json::{Value, json};

use super::phases::PhaseKind;
use super::pieces::SEAT_COUNT;
use super::room::{Room, SeatIndex};

/// Public player entry for the in-game snapshot.
fn player_entry(room: &Room, seat: SeatIndex) -> Value {
    match room.seat(seat) {
        Some(s) => json!({
            "seat_id": seat,
            "name": s.display_name,
            "is_bot": s.is_bot,
            "is_host": s.is_host,
            "connection": s.connection_state,
            "score": s.score,
            "captured": s.captured,
            "declared": s.declared,
            "hand_size": s.hand.len(),
        }),
        None => Value::Null,
    }
}

/// The canonical lobby player object. Field names and the id format are
/// frontend compatibility surface; `name` must not become `player_name`.
fn lobby_player_entry(room: &Room, seat: SeatIndex) -> Value {
    match room.seat(seat) {
        Some(s) => json!({
            "player_id": s.player_id,
            "name": s.display_name,
            "is_bot": s.is_bot,
            "is_host": s.is_host,
            "seat_position": seat,
            "avatar_color": s.avatar_color,
        }),
        None => Value::Null,
    }
}

/// Build the public broadcast body and the four per-seat bodies.
///
/// Seat bodies differ from the public body only by the owning seat's private
/// `hand` field.
pub(super) fn broadcast_bodies(
    room: &Room,
    phase: PhaseKind,
    phase_data: Value,
    reason: &str,
) -> (Value, [Value; SEAT_COUNT]) {
    let players: Vec<Value> = (0..SEAT_COUNT).map(|i| player_entry(room, i)).collect();
    let public = json!({
        "phase": phase,
        "phase_data": phase_data,
        "players": players,
        "round": room.round_number,
        "reason": reason,
    });

    let seat_bodies = std::array::from_fn(|seat| {
        let mut body = public.clone();
        if let Some(s) = room.seat(seat)
            && let Some(entry) = body["players"].get_mut(seat)
            && entry.is_object()
        {
            entry["hand"] = json!(s.hand);
        }
        body
    });

    (public, seat_bodies)
}

/// Room directory entry: a sparse, four-slot `players` array indexed by
/// seat position, with `null` in empty slots.
#[must_use]
pub fn room_info(room: &Room, phase: PhaseKind) -> Value {
    let players: Vec<Value> = (0..SEAT_COUNT).map(|i| lobby_player_entry(room, i)).collect();
    json!({
        "room_id": room.room_id,
        "phase": phase,
        "started": phase != PhaseKind::Waiting,
        "host_name": room
            .host_seat()
            .and_then(|i| room.seat(i))
            .map(|s| s.display_name.clone()),
        "occupied_slots": room.occupied_count(),
        "total_slots": SEAT_COUNT,
        "players": players,
    })
}
