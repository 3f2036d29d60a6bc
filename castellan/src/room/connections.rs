//! Seat-to-channel plumbing and the global connection registry.
//!
//! The room actor owns a [`RoomChannels`]: four per-seat outboxes that
//! either forward frames to a live channel or retain them for a bounded
//! window while the seat is disconnected. The process-wide
//! [`ConnectionRegistry`] maps channel ids to `(room_id, seat)` so the
//! dispatcher can route in-room frames; it holds no channel senders and is
//! never consulted from inside room logic.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::game::pieces::SEAT_COUNT;
use crate::game::room::SeatIndex;

use super::messages::ChannelBinding;

/// What a reconnecting seat missed while it was away.
#[derive(Debug)]
pub enum Retained {
    /// The per-seat outbox covers the gap: these frames, in order.
    Frames(Vec<String>),
    /// The outbox overflowed; fall back to a journal resync.
    Overflowed,
}

#[derive(Debug, Default)]
struct SeatOutbox {
    channel: Option<ChannelBinding>,
    retained: VecDeque<String>,
    overflowed: bool,
    last_ack: u64,
    disconnected_at: Option<DateTime<Utc>>,
}

/// The four per-seat outboxes of one room. Single producer (the room
/// actor); per-destination FIFO holds because a slow channel is dropped
/// rather than skipped.
#[derive(Debug)]
pub struct RoomChannels {
    seats: [SeatOutbox; SEAT_COUNT],
    retention: usize,
}

impl RoomChannels {
    #[must_use]
    pub fn new(retention: usize) -> Self {
        Self {
            seats: Default::default(),
            retention,
        }
    }

    /// Bind a channel to a seat, returning whatever was retained for it.
    pub fn attach(&mut self, seat: SeatIndex, binding: ChannelBinding) -> Retained {
        let outbox = &mut self.seats[seat];
        outbox.channel = Some(binding);
        outbox.disconnected_at = None;
        let retained = if outbox.overflowed {
            outbox.retained.clear();
            Retained::Overflowed
        } else {
            Retained::Frames(outbox.retained.drain(..).collect())
        };
        outbox.overflowed = false;
        retained
    }

    /// Drop the binding for a closed channel; returns the seat it served.
    pub fn detach_channel(&mut self, channel_id: Uuid) -> Option<SeatIndex> {
        for (seat, outbox) in self.seats.iter_mut().enumerate() {
            if outbox
                .channel
                .as_ref()
                .is_some_and(|b| b.channel_id == channel_id)
            {
                outbox.channel = None;
                outbox.disconnected_at = Some(Utc::now());
                return Some(seat);
            }
        }
        None
    }

    /// Detach whatever channel a seat holds (e.g. the seat was removed).
    pub fn detach_seat(&mut self, seat: SeatIndex) {
        let outbox = &mut self.seats[seat];
        outbox.channel = None;
        outbox.retained.clear();
        outbox.overflowed = false;
        outbox.disconnected_at = None;
    }

    #[must_use]
    pub fn is_connected(&self, seat: SeatIndex) -> bool {
        self.seats[seat].channel.is_some()
    }

    #[must_use]
    pub fn channel_of(&self, seat: SeatIndex) -> Option<Uuid> {
        self.seats[seat].channel.as_ref().map(|b| b.channel_id)
    }

    #[must_use]
    pub fn disconnected_since(&self, seat: SeatIndex) -> Option<DateTime<Utc>> {
        self.seats[seat].disconnected_at
    }

    #[must_use]
    pub fn last_ack(&self, seat: SeatIndex) -> u64 {
        self.seats[seat].last_ack
    }

    pub fn ack(&mut self, seat: SeatIndex, version: u64) {
        let outbox = &mut self.seats[seat];
        outbox.last_ack = outbox.last_ack.max(version);
    }

    /// Forward one frame to a seat, retaining it if the seat is offline.
    ///
    /// A full channel means a client that stopped reading: the channel is
    /// dropped so ordering is preserved through the retained queue instead
    /// of interleaving around the stuck frames.
    pub fn send_to_seat(&mut self, seat: SeatIndex, frame: String) {
        let outbox = &mut self.seats[seat];
        if let Some(binding) = &outbox.channel {
            match binding.sender.try_send(frame) {
                Ok(()) => return,
                Err(TrySendError::Full(frame)) => {
                    log::warn!("seat {seat}: outbound channel full, dropping channel");
                    outbox.channel = None;
                    outbox.disconnected_at = Some(Utc::now());
                    self.retain(seat, frame);
                }
                Err(TrySendError::Closed(frame)) => {
                    outbox.channel = None;
                    outbox.disconnected_at = Some(Utc::now());
                    self.retain(seat, frame);
                }
            }
        } else {
            self.retain(seat, frame);
        }
    }

    fn retain(&mut self, seat: SeatIndex, frame: String) {
        let outbox = &mut self.seats[seat];
        if outbox.retained.len() == self.retention {
            outbox.retained.pop_front();
            outbox.overflowed = true;
        }
        outbox.retained.push_back(frame);
    }

    /// Whether no seat has a live channel.
    #[must_use]
    pub fn all_disconnected(&self) -> bool {
        self.seats.iter().all(|o| o.channel.is_none())
    }
}

/// Where a channel currently points.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChannelRoute {
    pub room_id: String,
    pub seat: SeatIndex,
}

/// Process-wide channel routing table. Read-heavy; writes only on
/// join/reconnect/close, and no room logic runs under its lock.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    routes: RwLock<HashMap<Uuid, ChannelRoute>>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, channel_id: Uuid, room_id: String, seat: SeatIndex) {
        let mut routes = self.routes.write().await;
        routes.insert(channel_id, ChannelRoute { room_id, seat });
    }

    pub async fn lookup(&self, channel_id: Uuid) -> Option<ChannelRoute> {
        let routes = self.routes.read().await;
        routes.get(&channel_id).cloned()
    }

    pub async fn unregister(&self, channel_id: Uuid) -> Option<ChannelRoute> {
        let mut routes = self.routes.write().await;
        routes.remove(&channel_id)
    }

    pub async fn active_channels(&self) -> usize {
        let routes = self.routes.read().await;
        routes.len()
    }
}
