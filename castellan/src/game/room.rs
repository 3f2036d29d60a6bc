//! The room aggregate: four seats, their hands and the round bookkeeping.
//!
//! The room is owned and mutated exclusively by its orchestrator; nothing
//! here is shared. Seats never hold references back to channels; the
//! connection registry maps channels to `(room_id, seat)` indices instead.

use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::GameError;
use super::journal::Journal;
use super::pieces::{self, Piece, SEAT_COUNT};
use super::scoring;

/// Seat position inside a room, 0..=3. Turn order is clockwise by index.
pub type SeatIndex = usize;

/// Piles (tricks) contested in one round.
pub const PILES_PER_ROUND: u8 = 8;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    Disconnected,
    /// A disconnected human whose decisions the bot scheduler has taken over.
    BotTakeover,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::BotTakeover => "bot_takeover",
        };
        write!(f, "{repr}")
    }
}

/// How the redeal negotiation collects decisions from weak seats.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedealMode {
    /// One weak seat decides at a time, earliest seat order first.
    #[default]
    Sequential,
    /// All weak seats decide concurrently; any accept triggers the redeal.
    Simultaneous,
}

/// Rule knobs for one game. Timing and transport knobs live in
/// `room::RoomConfig`; these are the parts the pure engine needs.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GameSettings {
    /// A hand with no piece above this point is weak.
    pub weak_hand_threshold: u8,
    /// First seat to reach this running score ends the game.
    pub win_threshold: i32,
    pub redeal_mode: RedealMode,
    /// Cap on the redeal multiplier; `None` lets accepts compound freely.
    pub max_redeal_multiplier: Option<u32>,
    /// After this many consecutive zero declarations a seat must declare.
    pub zero_streak_limit: u8,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            weak_hand_threshold: pieces::DEFAULT_WEAK_HAND_THRESHOLD,
            win_threshold: scoring::DEFAULT_WIN_THRESHOLD,
            redeal_mode: RedealMode::Sequential,
            max_redeal_multiplier: None,
            zero_streak_limit: 2,
        }
    }
}

/// One seat: a human or a bot.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Seat {
    pub player_id: String,
    pub display_name: String,
    pub is_bot: bool,
    pub is_host: bool,
    pub avatar_color: Option<String>,
    pub connection_state: ConnectionState,
    pub score: i32,
    pub hand: Vec<Piece>,
    pub declared: Option<u8>,
    pub captured: u8,
    pub zero_declares_streak: u8,
}

impl Seat {
    fn new(player_id: String, display_name: String, is_bot: bool, is_host: bool) -> Self {
        Self {
            player_id,
            display_name,
            is_bot,
            is_host,
            avatar_color: None,
            connection_state: ConnectionState::Connected,
            score: 0,
            hand: Vec::with_capacity(pieces::HAND_SIZE),
            declared: None,
            captured: 0,
            zero_declares_streak: 0,
        }
    }

    /// Whether the bot scheduler decides for this seat.
    #[must_use]
    pub fn is_bot_controlled(&self) -> bool {
        self.is_bot || self.connection_state == ConnectionState::BotTakeover
    }
}

/// The aggregate root for one room. The orchestrator is the sole writer.
#[derive(Debug)]
pub struct Room {
    pub room_id: String,
    pub seats: [Option<Seat>; SEAT_COUNT],
    pub round_number: u32,
    pub turn_number: u32,
    pub redeal_multiplier: u32,
    pub starter_seat: SeatIndex,
    /// Pieces played to piles since the last deal; together with the hands
    /// this always accounts for the full deck.
    pub pieces_played: usize,
    pub settings: GameSettings,
    pub journal: Journal,
    pub(crate) rng: StdRng,
}

impl Room {
    #[must_use]
    pub fn new(room_id: String, settings: GameSettings, journal_retention: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            room_id,
            seats: Default::default(),
            round_number: 0,
            turn_number: 0,
            redeal_multiplier: 1,
            starter_seat: 0,
            pieces_played: 0,
            settings,
            journal: Journal::new(journal_retention),
            rng,
        }
    }

    /// Canonical player id for a seat of this room.
    #[must_use]
    pub fn player_id(&self, seat: SeatIndex) -> String {
        format!("{}_p{}", self.room_id, seat)
    }

    #[must_use]
    pub fn seat(&self, seat: SeatIndex) -> Option<&Seat> {
        self.seats.get(seat).and_then(Option::as_ref)
    }

    pub fn seat_mut(&mut self, seat: SeatIndex) -> Option<&mut Seat> {
        self.seats.get_mut(seat).and_then(Option::as_mut)
    }

    /// Occupied seats in clockwise order starting from seat 0.
    pub fn occupied(&self) -> impl Iterator<Item = (SeatIndex, &Seat)> {
        self.seats
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (i, s)))
    }

    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.occupied().count()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.occupied_count() == SEAT_COUNT
    }

    #[must_use]
    pub fn host_seat(&self) -> Option<SeatIndex> {
        self.occupied().find(|(_, s)| s.is_host).map(|(i, _)| i)
    }

    /// Seat a human player. The first player to join hosts the room.
    pub fn join(
        &mut self,
        display_name: &str,
        preferred: Option<SeatIndex>,
    ) -> Result<SeatIndex, GameError> {
        if self
            .occupied()
            .any(|(_, s)| s.display_name == display_name)
        {
            return Err(GameError::NameTaken {
                name: display_name.to_string(),
            });
        }
        let seat = self.claim_seat(preferred)?;
        let is_host = self.host_seat().is_none();
        self.seats[seat] = Some(Seat::new(
            self.player_id(seat),
            display_name.to_string(),
            false,
            is_host,
        ));
        Ok(seat)
    }

    /// Seat a bot. Bot names are derived from the seat position.
    pub fn add_bot(&mut self, preferred: Option<SeatIndex>) -> Result<SeatIndex, GameError> {
        let seat = self.claim_seat(preferred)?;
        self.seats[seat] = Some(Seat::new(
            self.player_id(seat),
            format!("Bot {}", seat + 1),
            true,
            false,
        ));
        Ok(seat)
    }

    fn claim_seat(&mut self, preferred: Option<SeatIndex>) -> Result<SeatIndex, GameError> {
        match preferred {
            Some(seat) if seat >= SEAT_COUNT => Err(GameError::NoSuchSeat { seat }),
            Some(seat) if self.seats[seat].is_some() => Err(GameError::SeatOccupied { seat }),
            Some(seat) => Ok(seat),
            None => self
                .seats
                .iter()
                .position(Option::is_none)
                .ok_or(GameError::RoomFull),
        }
    }

    /// Vacate a seat. Host duty passes to the earliest remaining human.
    pub fn remove_seat(&mut self, seat: SeatIndex) -> Result<Seat, GameError> {
        let removed = self
            .seats
            .get_mut(seat)
            .and_then(Option::take)
            .ok_or(GameError::SeatEmpty { seat })?;
        if removed.is_host {
            let next_host = self
                .occupied()
                .find(|(_, s)| !s.is_bot)
                .map(|(i, _)| i)
                .or_else(|| self.occupied().next().map(|(i, _)| i));
            if let Some(i) = next_host
                && let Some(s) = self.seat_mut(i)
            {
                s.is_host = true;
            }
        }
        Ok(removed)
    }

    /// Deal fresh eight-piece hands to all four seats.
    pub fn deal(&mut self) {
        let hands = pieces::deal_hands(&mut self.rng);
        for (seat, hand) in hands.into_iter().enumerate() {
            if let Some(s) = self.seats[seat].as_mut() {
                s.hand = hand;
            }
        }
        self.pieces_played = 0;
    }

    pub fn set_avatar(&mut self, seat: SeatIndex, color: Option<String>) {
        if let Some(s) = self.seat_mut(seat) {
            s.avatar_color = color;
        }
    }

    /// Seats whose hands are weak, in seat order.
    #[must_use]
    pub fn weak_seats(&self) -> Vec<SeatIndex> {
        self.occupied()
            .filter(|(_, s)| pieces::is_weak_hand(&s.hand, self.settings.weak_hand_threshold))
            .map(|(i, _)| i)
            .collect()
    }

    /// Seat order for one pile: starter first, then clockwise.
    #[must_use]
    pub fn clockwise_from(&self, start: SeatIndex) -> [SeatIndex; SEAT_COUNT] {
        std::array::from_fn(|i| (start + i) % SEAT_COUNT)
    }

    #[must_use]
    pub fn total_declared(&self) -> u8 {
        self.occupied().filter_map(|(_, s)| s.declared).sum()
    }

    #[must_use]
    pub fn declared_count(&self) -> usize {
        self.occupied().filter(|(_, s)| s.declared.is_some()).count()
    }

    #[must_use]
    pub fn hands_empty(&self) -> bool {
        self.occupied().all(|(_, s)| s.hand.is_empty())
    }

    /// Pieces currently held across all hands.
    #[must_use]
    pub fn pieces_in_hands(&self) -> usize {
        self.occupied().map(|(_, s)| s.hand.len()).sum()
    }

    /// Double the redeal multiplier, saturating at the configured cap.
    pub fn compound_redeal_multiplier(&mut self) {
        let next = self.redeal_multiplier.saturating_mul(2);
        self.redeal_multiplier = match self.settings.max_redeal_multiplier {
            Some(cap) => next.min(cap),
            None => next,
        };
    }

    /// Round winner for starter rotation: most captured piles, earliest seat
    /// on ties.
    #[must_use]
    pub fn round_winner(&self) -> SeatIndex {
        self.occupied()
            .max_by(|(a_i, a), (b_i, b)| a.captured.cmp(&b.captured).then(b_i.cmp(a_i)))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// Reset per-round state ahead of the next PREPARATION.
    pub fn reset_round(&mut self) {
        self.redeal_multiplier = 1;
        self.turn_number = 0;
        self.pieces_played = 0;
        for seat in self.seats.iter_mut().flatten() {
            seat.hand.clear();
            seat.declared = None;
            seat.captured = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> Room {
        Room::new("r1".into(), GameSettings::default(), 64, Some(1))
    }

    #[test]
    fn first_join_hosts_and_ids_are_canonical() {
        let mut room = room();
        let a = room.join("alice", None).unwrap();
        let b = room.join("bob", None).unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert!(room.seat(a).unwrap().is_host);
        assert!(!room.seat(b).unwrap().is_host);
        assert_eq!(room.seat(a).unwrap().player_id, "r1_p0");
        assert_eq!(room.seat(b).unwrap().player_id, "r1_p1");
    }

    #[test]
    fn duplicate_names_and_taken_seats_are_rejected() {
        let mut room = room();
        room.join("alice", Some(2)).unwrap();
        assert!(matches!(
            room.join("alice", None),
            Err(GameError::NameTaken { .. })
        ));
        assert!(matches!(
            room.join("bob", Some(2)),
            Err(GameError::SeatOccupied { seat: 2 })
        ));
        assert!(matches!(
            room.join("bob", Some(9)),
            Err(GameError::NoSuchSeat { seat: 9 })
        ));
    }

    #[test]
    fn host_duty_passes_to_earliest_human() {
        let mut room = room();
        room.join("alice", None).unwrap();
        room.add_bot(None).unwrap();
        room.join("carol", None).unwrap();
        room.remove_seat(0).unwrap();
        assert_eq!(room.host_seat(), Some(2));
    }

    #[test]
    fn deal_fills_all_occupied_hands() {
        let mut room = room();
        for name in ["a", "b", "c", "d"] {
            room.join(name, None).unwrap();
        }
        room.deal();
        assert!(room.occupied().all(|(_, s)| s.hand.len() == 8));
        assert_eq!(room.pieces_in_hands(), 32);
    }

    #[test]
    fn multiplier_compounds_and_respects_cap() {
        let mut room = room();
        room.compound_redeal_multiplier();
        room.compound_redeal_multiplier();
        assert_eq!(room.redeal_multiplier, 4);

        room.settings.max_redeal_multiplier = Some(4);
        room.compound_redeal_multiplier();
        assert_eq!(room.redeal_multiplier, 4);
    }

    #[test]
    fn round_winner_prefers_earliest_on_ties() {
        let mut room = room();
        for name in ["a", "b", "c", "d"] {
            room.join(name, None).unwrap();
        }
        room.seat_mut(1).unwrap().captured = 3;
        room.seat_mut(2).unwrap().captured = 3;
        assert_eq!(room.round_winner(), 1);
    }
}
