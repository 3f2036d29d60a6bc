//! Castellan game engine - the per-room phase machine and its orchestrator.
//!
//! The engine is synchronous and single-writer: `GameState` owns the room
//! aggregate and the current phase, and every mutation funnels through
//! `commit`, which appends one journal record and builds the broadcast
//! bodies for that version. The async room actor in `crate::room` drives
//! this type from its action queue.

pub mod journal;
pub mod phases;
pub mod pieces;
pub mod play;
pub mod room;
pub mod scoring;
pub mod view;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use journal::{Resync, checksum};
use phases::{Phase, PhaseKind, PhaseLogic, PhaseOutcome, Waiting};
use pieces::{DECK_SIZE, SEAT_COUNT};
use play::Play;
use room::{GameSettings, Room, Seat, SeatIndex};

/// Errors surfaced to the acting seat. No variant mutates state.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum GameError {
    #[error("not your turn")]
    NotYourTurn,
    #[error("pieces not in hand")]
    IllegalPieces,
    #[error("expected {expected} pieces, got {got}")]
    WrongCount { expected: usize, got: usize },
    #[error("declaration {value} is not allowed")]
    IllegalDeclaration { value: u8, allowed: Vec<u8> },
    #[error("{action} not allowed during {phase}")]
    IllegalPhase { action: ActionKind, phase: PhaseKind },
    #[error("only the host may do that")]
    NotHost,
    #[error("room is full")]
    RoomFull,
    #[error("seat {seat} does not exist")]
    NoSuchSeat { seat: SeatIndex },
    #[error("seat {seat} is occupied")]
    SeatOccupied { seat: SeatIndex },
    #[error("seat {seat} is empty")]
    SeatEmpty { seat: SeatIndex },
    #[error("name {name} already taken")]
    NameTaken { name: String },
    #[error("need four seated players, have {occupied}")]
    SeatsUnfilled { occupied: usize },
    #[error("game already in progress")]
    GameAlreadyStarted,
    #[error("room is in safe mode")]
    SafeMode,
    #[error("invariant violated: {0}")]
    Internal(String),
}

/// The closed set of player verbs the phase machine accepts.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    AddBot,
    RemovePlayer,
    StartGame,
    AcceptRedeal,
    DeclineRedeal,
    Declare,
    Play,
    PlayerReady,
    LeaveGame,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::AddBot => "add_bot",
            Self::RemovePlayer => "remove_player",
            Self::StartGame => "start_game",
            Self::AcceptRedeal => "accept_redeal",
            Self::DeclineRedeal => "decline_redeal",
            Self::Declare => "declare",
            Self::Play => "play",
            Self::PlayerReady => "player_ready",
            Self::LeaveGame => "leave_game",
        };
        write!(f, "{repr}")
    }
}

/// A player verb with its payload.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlayerAction {
    AddBot { seat: Option<SeatIndex> },
    RemovePlayer { seat: SeatIndex },
    StartGame,
    AcceptRedeal,
    DeclineRedeal,
    Declare { value: u8 },
    /// Indices into the acting seat's current hand.
    Play { indices: Vec<usize> },
    PlayerReady,
    LeaveGame,
}

impl PlayerAction {
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::AddBot { .. } => ActionKind::AddBot,
            Self::RemovePlayer { .. } => ActionKind::RemovePlayer,
            Self::StartGame => ActionKind::StartGame,
            Self::AcceptRedeal => ActionKind::AcceptRedeal,
            Self::DeclineRedeal => ActionKind::DeclineRedeal,
            Self::Declare { .. } => ActionKind::Declare,
            Self::Play { .. } => ActionKind::Play,
            Self::PlayerReady => ActionKind::PlayerReady,
            Self::LeaveGame => ActionKind::LeaveGame,
        }
    }
}

/// One sequenced action from the queue: who, what, and the idempotency key.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct GameAction {
    pub request_id: Option<String>,
    pub seat: SeatIndex,
    pub action: PlayerAction,
    pub received_at: DateTime<Utc>,
}

impl GameAction {
    #[must_use]
    pub fn new(seat: SeatIndex, action: PlayerAction) -> Self {
        Self {
            request_id: None,
            seat,
            action,
            received_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// One committed journal version with its ready-to-send broadcast bodies.
///
/// The checksum covers the public body only, so every client can compare
/// digests; the per-seat bodies add that seat's private hand on top.
#[derive(Clone, Debug)]
pub struct CommittedBatch {
    pub version: u64,
    pub phase: PhaseKind,
    pub reason: String,
    pub checksum: String,
    pub timestamp: f64,
    pub public_body: Value,
    pub seat_bodies: [Value; SEAT_COUNT],
}

/// Pre-apply checkpoint for all-or-nothing action application. The journal
/// is deliberately absent: nothing is appended until after the invariant
/// check passes.
struct Checkpoint {
    seats: [Option<Seat>; SEAT_COUNT],
    phase: Phase,
    round_number: u32,
    turn_number: u32,
    redeal_multiplier: u32,
    starter_seat: SeatIndex,
    pieces_played: usize,
}

/// The room orchestrator: owns the aggregate, the current phase and the
/// journal, and serializes every mutation.
#[derive(Debug)]
pub struct GameState {
    pub room: Room,
    phase: Phase,
    safe_mode: bool,
}

impl GameState {
    #[must_use]
    pub fn new(
        room_id: impl Into<String>,
        settings: GameSettings,
        journal_retention: usize,
        seed: Option<u64>,
    ) -> Self {
        Self {
            room: Room::new(room_id.into(), settings, journal_retention, seed),
            phase: Waiting::default().into(),
            safe_mode: false,
        }
    }

    #[must_use]
    pub fn phase_kind(&self) -> PhaseKind {
        self.phase.kind()
    }

    /// Latest committed journal version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.room.journal.version()
    }

    #[must_use]
    pub fn is_safe_mode(&self) -> bool {
        self.safe_mode
    }

    #[must_use]
    pub fn allowed_actions(&self, seat: SeatIndex) -> Vec<ActionKind> {
        self.phase.allowed_actions(&self.room, seat)
    }

    #[must_use]
    pub fn allowed_declarations(&self, seat: SeatIndex) -> Vec<u8> {
        phases::allowed_declarations(&self.room, seat)
    }

    /// Required count and lead classification of the pile in progress.
    #[must_use]
    pub fn turn_context(&self) -> Option<(Option<usize>, Option<Play>)> {
        match &self.phase {
            Phase::Turn(turn) => Some((turn.required(), turn.lead_play())),
            _ => None,
        }
    }

    /// Apply one sequenced action: authorize, validate, apply, journal,
    /// then run any pending phase transitions. Returns one committed batch
    /// per bumped version, in order.
    pub fn handle_action(
        &mut self,
        action: &GameAction,
    ) -> Result<Vec<CommittedBatch>, GameError> {
        if self.safe_mode {
            return Err(GameError::SafeMode);
        }
        if self.room.seat(action.seat).is_none() {
            return Err(GameError::SeatEmpty { seat: action.seat });
        }

        // Leaving mid-game is phase-independent: the seat stays and the bot
        // scheduler takes it over.
        if matches!(action.action, PlayerAction::LeaveGame)
            && !matches!(self.phase, Phase::Waiting(_))
        {
            return Ok(self
                .set_connection_state(
                    action.seat,
                    room::ConnectionState::BotTakeover,
                    "player left mid-game",
                )?
                .into_iter()
                .collect());
        }

        self.phase.validate(&self.room, action)?;

        let checkpoint = self.checkpoint();
        let outcome = self.phase.apply(&mut self.room, action);
        if let Err(violation) = self.check_invariants() {
            self.restore(checkpoint);
            self.safe_mode = true;
            log::error!(
                "room {}: invariant violated, entering safe mode: {violation}",
                self.room.room_id
            );
            return Err(GameError::Internal(violation));
        }

        let mut batches = vec![self.commit(outcome, action.request_id.clone())];
        self.run_transitions(&mut batches);
        Ok(batches)
    }

    /// Timer-driven progress: expire TURN_RESULTS auto-advance and run any
    /// transitions that became due.
    pub fn tick(
        &mut self,
        now: DateTime<Utc>,
        turn_results_auto_advance: Duration,
    ) -> Vec<CommittedBatch> {
        let mut batches = Vec::new();
        if self.safe_mode {
            return batches;
        }
        if let Phase::TurnResults(results) = &mut self.phase {
            results.expire(now, turn_results_auto_advance);
        }
        self.run_transitions(&mut batches);
        batches
    }

    /// Seat a human player. Only legal while the room is waiting.
    pub fn join_seat(
        &mut self,
        display_name: &str,
        preferred: Option<SeatIndex>,
        avatar_color: Option<String>,
    ) -> Result<(SeatIndex, Vec<CommittedBatch>), GameError> {
        if !matches!(self.phase, Phase::Waiting(_)) {
            return Err(GameError::GameAlreadyStarted);
        }
        let seat = self.room.join(display_name, preferred)?;
        self.room.set_avatar(seat, avatar_color);
        let outcome = PhaseOutcome::player_joined(&self.room, seat);
        let batch = self.commit(outcome, None);
        Ok((seat, vec![batch]))
    }

    /// Vacate a seat at the room level: the lobby's departure path, as
    /// opposed to the in-room `leave_game` action. While the room is
    /// waiting the seat is freed for someone else; mid-game the seat is
    /// marked disconnected and the grace machinery decides its fate.
    pub fn vacate_seat(&mut self, seat: SeatIndex) -> Result<Vec<CommittedBatch>, GameError> {
        if self.room.seat(seat).is_none() {
            return Err(GameError::SeatEmpty { seat });
        }
        if matches!(self.phase, Phase::Waiting(_)) {
            let removed = self.room.remove_seat(seat)?;
            let outcome = PhaseOutcome::player_left(&self.room, seat, &removed.display_name);
            return Ok(vec![self.commit(outcome, None)]);
        }
        Ok(self
            .set_connection_state(
                seat,
                room::ConnectionState::Disconnected,
                "player left the room",
            )?
            .into_iter()
            .collect())
    }

    /// Record a seat's connection transition. No-op (and no journal entry)
    /// when the state is unchanged.
    pub fn set_connection_state(
        &mut self,
        seat: SeatIndex,
        state: room::ConnectionState,
        reason: &str,
    ) -> Result<Option<CommittedBatch>, GameError> {
        let current = self
            .room
            .seat(seat)
            .ok_or(GameError::SeatEmpty { seat })?
            .connection_state;
        if current == state {
            return Ok(None);
        }
        if let Some(s) = self.room.seat_mut(seat) {
            s.connection_state = state;
        }
        let outcome = PhaseOutcome::connection_changed(seat, state, reason);
        Ok(Some(self.commit(outcome, None)))
    }

    /// Current full snapshot, as per-seat bodies plus the public body.
    #[must_use]
    pub fn snapshot(&self) -> CommittedBatch {
        let phase_kind = self.phase.kind();
        let phase_data = self.phase.phase_data(&self.room);
        let (public_body, seat_bodies) =
            view::broadcast_bodies(&self.room, phase_kind, phase_data, "snapshot");
        let digest = checksum(&public_body);
        CommittedBatch {
            version: self.version(),
            phase: phase_kind,
            reason: "snapshot".to_string(),
            checksum: digest,
            timestamp: Utc::now().timestamp_millis() as f64 / 1000.0,
            public_body,
            seat_bodies,
        }
    }

    /// Journal records newer than `after_version`, or a full-resync marker.
    #[must_use]
    pub fn resync(&self, after_version: u64) -> Resync {
        self.room.journal.since(after_version)
    }

    /// Lobby directory entry for this room.
    #[must_use]
    pub fn room_info(&self) -> Value {
        view::room_info(&self.room, self.phase.kind())
    }

    /// Seats whose decision the bot scheduler should produce right now.
    #[must_use]
    pub fn pending_bot_seats(&self) -> Vec<SeatIndex> {
        match self.phase.kind() {
            PhaseKind::Preparation | PhaseKind::Declaration | PhaseKind::Turn => (0..SEAT_COUNT)
                .filter(|&seat| {
                    self.room
                        .seat(seat)
                        .is_some_and(room::Seat::is_bot_controlled)
                        && !self.allowed_actions(seat).is_empty()
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn commit(&mut self, outcome: PhaseOutcome, triggered_by: Option<String>) -> CommittedBatch {
        let phase_kind = self.phase.kind();
        let reason = outcome.reason.clone();
        let record =
            self.room
                .journal
                .append(phase_kind, outcome.changes, reason.clone(), triggered_by);
        let version = record.version;

        let phase_data = self.phase.phase_data(&self.room);
        let (public_body, seat_bodies) =
            view::broadcast_bodies(&self.room, phase_kind, phase_data, &reason);
        let digest = checksum(&public_body);

        CommittedBatch {
            version,
            phase: phase_kind,
            reason,
            checksum: digest,
            timestamp: Utc::now().timestamp_millis() as f64 / 1000.0,
            public_body,
            seat_bodies,
        }
    }

    fn run_transitions(&mut self, batches: &mut Vec<CommittedBatch>) {
        while let Some(mut next) = self.phase.check_transition(&self.room) {
            self.phase.on_exit(&mut self.room);
            let outcome = next.on_enter(&mut self.room);
            self.phase = next;
            batches.push(self.commit(outcome, None));
        }
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            seats: self.room.seats.clone(),
            phase: self.phase.clone(),
            round_number: self.room.round_number,
            turn_number: self.room.turn_number,
            redeal_multiplier: self.room.redeal_multiplier,
            starter_seat: self.room.starter_seat,
            pieces_played: self.room.pieces_played,
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.room.seats = checkpoint.seats;
        self.phase = checkpoint.phase;
        self.room.round_number = checkpoint.round_number;
        self.room.turn_number = checkpoint.turn_number;
        self.room.redeal_multiplier = checkpoint.redeal_multiplier;
        self.room.starter_seat = checkpoint.starter_seat;
        self.room.pieces_played = checkpoint.pieces_played;
    }

    /// Cheap structural invariants checked after every apply.
    fn check_invariants(&self) -> Result<(), String> {
        let in_round = matches!(
            self.phase.kind(),
            PhaseKind::Turn | PhaseKind::TurnResults
        ) || matches!(self.phase.kind(), PhaseKind::Preparation | PhaseKind::Declaration)
            && self.room.pieces_in_hands() > 0;

        if in_round && self.room.is_full() {
            let accounted = self.room.pieces_in_hands() + self.room.pieces_played;
            if accounted != DECK_SIZE {
                return Err(format!(
                    "piece conservation broken: {accounted} accounted, expected {DECK_SIZE}"
                ));
            }
        }
        if self.room.declared_count() == SEAT_COUNT
            && self.room.total_declared() == room::PILES_PER_ROUND
        {
            return Err("declaration sum equals pile count".to_string());
        }
        Ok(())
    }
}

impl PhaseOutcome {
    fn player_joined(room: &Room, seat: SeatIndex) -> Self {
        let name = room
            .seat(seat)
            .map(|s| s.display_name.clone())
            .unwrap_or_default();
        let mut outcome = Self::default();
        outcome.reason = format!("{name} joined seat {seat}");
        outcome
            .changes
            .insert("player_joined".into(), serde_json::json!(seat));
        outcome
            .changes
            .insert("occupied".into(), serde_json::json!(room.occupied_count()));
        outcome
    }

    fn player_left(room: &Room, seat: SeatIndex, name: &str) -> Self {
        let mut outcome = Self::default();
        outcome.reason = format!("{name} left the room");
        outcome
            .changes
            .insert("player_left".into(), serde_json::json!(seat));
        outcome
            .changes
            .insert("occupied".into(), serde_json::json!(room.occupied_count()));
        outcome
    }

    fn connection_changed(seat: SeatIndex, state: room::ConnectionState, reason: &str) -> Self {
        let mut outcome = Self::default();
        outcome.reason = reason.to_string();
        outcome
            .changes
            .insert("connection_changed".into(), serde_json::json!(seat));
        outcome
            .changes
            .insert("connection_state".into(), serde_json::json!(state));
        outcome
    }
}
