//! Room actor message types.

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::game::GameAction;
use crate::game::room::SeatIndex;
use crate::net::errors::WireError;

/// A live outbound channel: the id the registry routes by and the string
/// sink the socket writer drains.
#[derive(Clone, Debug)]
pub struct ChannelBinding {
    pub channel_id: Uuid,
    pub sender: mpsc::Sender<String>,
}

/// Reply to a successful join or reconnect.
#[derive(Clone, Debug)]
pub struct SeatSession {
    pub room_id: String,
    pub seat: SeatIndex,
    pub version: u64,
    pub room_info: Value,
}

/// Messages a room actor consumes. Game actions flow through the bounded
/// inbox in arrival order; everything else is room plumbing.
#[derive(Debug)]
pub enum RoomMessage {
    /// A sequenced player action. The response, when present, receives the
    /// exact reply frame (success or error) for the acting channel.
    Action {
        action: GameAction,
        response: Option<oneshot::Sender<Value>>,
    },

    /// A bot decision timer fired. Stale generations are dropped.
    BotWake { seat: SeatIndex, generation: u64 },

    /// Seat a new player and bind their channel.
    Join {
        display_name: String,
        preferred_seat: Option<SeatIndex>,
        avatar_color: Option<String>,
        channel: ChannelBinding,
        response: oneshot::Sender<Result<SeatSession, WireError>>,
    },

    /// Re-bind a channel to an existing seat (reconnect), replaying what
    /// the seat missed.
    Connect {
        display_name: String,
        channel: ChannelBinding,
        last_ack_version: Option<u64>,
        response: oneshot::Sender<Result<SeatSession, WireError>>,
    },

    /// Vacate a seat at the lobby level (the directory's `leave_room`).
    /// Replies with the occupancy left behind so the registry can retire
    /// rooms that emptied out.
    Leave {
        seat: SeatIndex,
        response: oneshot::Sender<Result<usize, WireError>>,
    },

    /// A channel closed; the owning seat goes disconnected.
    Disconnect { channel_id: Uuid },

    /// Client acknowledged everything up to `version`.
    Ack { seat: SeatIndex, version: u64 },

    /// Explicit resync request from a client that suspects a gap.
    SyncRequest { seat: SeatIndex, last_version: u64 },

    /// Lobby directory entry.
    GetInfo { response: oneshot::Sender<Value> },

    /// Current full snapshot frame for one seat (or the public view).
    GetState {
        seat: Option<SeatIndex>,
        response: oneshot::Sender<Value>,
    },

    /// Shut the room down.
    Close { response: oneshot::Sender<()> },
}
