//! The seven-phase game state machine.
//!
//! Each phase is a struct implementing [`PhaseLogic`]; the closed set is
//! dispatched through [`Phase`] with `enum_dispatch`. Phases validate and
//! apply actions against the [`Room`] aggregate and report field-level
//! change sets; the orchestrator in `game::GameState` owns journaling,
//! broadcasting and the transition loop, so no phase ever touches the
//! journal or a channel directly.

use chrono::{DateTime, Utc};
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

use super::journal::ChangeSet;
use super::pieces::{Piece, SEAT_COUNT};
use super::play::{self, MAX_PLAY_SIZE, Play};
use super::room::{PILES_PER_ROUND, RedealMode, Room, SeatIndex};
use super::scoring;
use super::{ActionKind, GameAction, GameError, PlayerAction};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Waiting,
    Preparation,
    Declaration,
    Turn,
    TurnResults,
    Scoring,
    GameOver,
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Waiting => "waiting",
            Self::Preparation => "preparation",
            Self::Declaration => "declaration",
            Self::Turn => "turn",
            Self::TurnResults => "turn_results",
            Self::Scoring => "scoring",
            Self::GameOver => "game_over",
        };
        write!(f, "{repr}")
    }
}

/// Changes plus an audit label, produced by `on_enter` and `apply`.
#[derive(Clone, Debug, Default)]
pub struct PhaseOutcome {
    pub changes: ChangeSet,
    pub reason: String,
}

impl PhaseOutcome {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            changes: ChangeSet::new(),
            reason: reason.into(),
        }
    }

    fn set(mut self, key: &str, value: Value) -> Self {
        self.changes.insert(key.to_string(), value);
        self
    }
}

/// Behavior of one game phase.
///
/// The orchestrator always calls `validate` before `apply`, so `apply` may
/// assume a legal action. `apply` mutates the room and must not perform I/O.
#[enum_dispatch]
pub trait PhaseLogic {
    fn kind(&self) -> PhaseKind;

    fn on_enter(&mut self, room: &mut Room) -> PhaseOutcome;

    fn allowed_actions(&self, room: &Room, seat: SeatIndex) -> Vec<ActionKind>;

    fn validate(&self, room: &Room, action: &GameAction) -> Result<(), GameError>;

    fn apply(&mut self, room: &mut Room, action: &GameAction) -> PhaseOutcome;

    fn check_transition(&self, room: &Room) -> Option<Phase>;

    fn on_exit(&mut self, _room: &mut Room) {}

    /// Phase-specific payload for the broadcast snapshot.
    fn phase_data(&self, room: &Room) -> Value;
}

#[enum_dispatch(PhaseLogic)]
#[derive(Clone, Debug)]
pub enum Phase {
    Waiting(Waiting),
    Preparation(Preparation),
    Declaration(Declaration),
    Turn(Turn),
    TurnResults(TurnResults),
    Scoring(Scoring),
    GameOver(GameOver),
}

fn illegal(action: &GameAction, phase: PhaseKind) -> GameError {
    GameError::IllegalPhase {
        action: action.action.kind(),
        phase,
    }
}

/// Summary of all seats' public counters, embedded in most change sets.
fn seat_counters(room: &Room) -> Value {
    let counters: Vec<Value> = room
        .seats
        .iter()
        .map(|slot| match slot {
            Some(seat) => json!({
                "hand_size": seat.hand.len(),
                "declared": seat.declared,
                "captured": seat.captured,
                "score": seat.score,
            }),
            None => Value::Null,
        })
        .collect();
    json!(counters)
}

// ---------------------------------------------------------------------------
// WAITING
// ---------------------------------------------------------------------------

/// Lobby phase: seats fill up until the host starts the game.
#[derive(Clone, Debug, Default)]
pub struct Waiting {
    started: bool,
}

impl PhaseLogic for Waiting {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Waiting
    }

    fn on_enter(&mut self, _room: &mut Room) -> PhaseOutcome {
        PhaseOutcome::new("waiting for players")
    }

    fn allowed_actions(&self, room: &Room, seat: SeatIndex) -> Vec<ActionKind> {
        let mut actions = vec![ActionKind::LeaveGame];
        if room.seat(seat).is_some_and(|s| s.is_host) {
            actions.extend([
                ActionKind::AddBot,
                ActionKind::RemovePlayer,
                ActionKind::StartGame,
            ]);
        }
        actions
    }

    fn validate(&self, room: &Room, action: &GameAction) -> Result<(), GameError> {
        let is_host = room.seat(action.seat).is_some_and(|s| s.is_host);
        match &action.action {
            PlayerAction::AddBot { seat } => {
                if !is_host {
                    return Err(GameError::NotHost);
                }
                match seat {
                    Some(seat) if *seat >= SEAT_COUNT => Err(GameError::NoSuchSeat { seat: *seat }),
                    Some(seat) if room.seat(*seat).is_some() => {
                        Err(GameError::SeatOccupied { seat: *seat })
                    }
                    None if room.is_full() => Err(GameError::RoomFull),
                    _ => Ok(()),
                }
            }
            PlayerAction::RemovePlayer { seat } => {
                if !is_host {
                    return Err(GameError::NotHost);
                }
                if room.seat(*seat).is_none() {
                    return Err(GameError::SeatEmpty { seat: *seat });
                }
                Ok(())
            }
            PlayerAction::StartGame => {
                if !is_host {
                    return Err(GameError::NotHost);
                }
                if !room.is_full() {
                    return Err(GameError::SeatsUnfilled {
                        occupied: room.occupied_count(),
                    });
                }
                Ok(())
            }
            PlayerAction::LeaveGame => Ok(()),
            _ => Err(illegal(action, self.kind())),
        }
    }

    fn apply(&mut self, room: &mut Room, action: &GameAction) -> PhaseOutcome {
        match &action.action {
            PlayerAction::AddBot { seat } => match room.add_bot(*seat) {
                Ok(seat) => PhaseOutcome::new(format!("bot added to seat {seat}"))
                    .set("bot_added", json!(seat))
                    .set("occupied", json!(room.occupied_count())),
                Err(_) => PhaseOutcome::default(),
            },
            PlayerAction::RemovePlayer { seat } => {
                let _ = room.remove_seat(*seat);
                PhaseOutcome::new(format!("seat {seat} removed"))
                    .set("player_removed", json!(seat))
                    .set("occupied", json!(room.occupied_count()))
            }
            PlayerAction::StartGame => {
                self.started = true;
                PhaseOutcome::new("host started the game").set("started", json!(true))
            }
            PlayerAction::LeaveGame => {
                let seat = action.seat;
                let _ = room.remove_seat(seat);
                PhaseOutcome::new(format!("seat {seat} left"))
                    .set("player_removed", json!(seat))
                    .set("occupied", json!(room.occupied_count()))
            }
            _ => PhaseOutcome::default(),
        }
    }

    fn check_transition(&self, room: &Room) -> Option<Phase> {
        (self.started && room.is_full()).then(|| Preparation::default().into())
    }

    fn phase_data(&self, room: &Room) -> Value {
        json!({
            "occupied": room.occupied_count(),
            "host": room.host_seat(),
        })
    }
}

// ---------------------------------------------------------------------------
// PREPARATION
// ---------------------------------------------------------------------------

/// Dealing and the weak-hand redeal negotiation.
#[derive(Clone, Debug, Default)]
pub struct Preparation {
    weak_seats: Vec<SeatIndex>,
    current_weak_player: Option<SeatIndex>,
    /// Simultaneous-mode replies collected so far.
    decisions: Vec<(SeatIndex, bool)>,
}

impl Preparation {
    fn recompute_weak(&mut self, room: &Room) {
        self.weak_seats = room.weak_seats();
        self.decisions.clear();
        self.current_weak_player = match room.settings.redeal_mode {
            RedealMode::Sequential => self.weak_seats.first().copied(),
            RedealMode::Simultaneous => None,
        };
    }

    fn may_decide(&self, room: &Room, seat: SeatIndex) -> bool {
        match room.settings.redeal_mode {
            RedealMode::Sequential => self.current_weak_player == Some(seat),
            RedealMode::Simultaneous => {
                self.weak_seats.contains(&seat)
                    && !self.decisions.iter().any(|(s, _)| *s == seat)
            }
        }
    }

    fn negotiation_snapshot(&self, outcome: PhaseOutcome) -> PhaseOutcome {
        outcome
            .set("weak_hands", json!(self.weak_seats))
            .set("current_weak_player", json!(self.current_weak_player))
    }

    /// Redeal every hand and restart the negotiation on the fresh deal.
    fn redeal(&mut self, room: &mut Room) {
        room.compound_redeal_multiplier();
        room.deal();
        self.recompute_weak(room);
    }
}

impl PhaseLogic for Preparation {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Preparation
    }

    fn on_enter(&mut self, room: &mut Room) -> PhaseOutcome {
        room.round_number += 1;
        room.deal();
        self.recompute_weak(room);

        let outcome = PhaseOutcome::new(format!("round {} dealt", room.round_number))
            .set("round", json!(room.round_number))
            .set("redeal_multiplier", json!(room.redeal_multiplier))
            .set("seats", seat_counters(room));
        self.negotiation_snapshot(outcome)
    }

    fn allowed_actions(&self, room: &Room, seat: SeatIndex) -> Vec<ActionKind> {
        if self.may_decide(room, seat) {
            vec![ActionKind::AcceptRedeal, ActionKind::DeclineRedeal]
        } else {
            Vec::new()
        }
    }

    fn validate(&self, room: &Room, action: &GameAction) -> Result<(), GameError> {
        match &action.action {
            PlayerAction::AcceptRedeal | PlayerAction::DeclineRedeal => {
                if self.may_decide(room, action.seat) {
                    Ok(())
                } else {
                    Err(GameError::NotYourTurn)
                }
            }
            _ => Err(illegal(action, self.kind())),
        }
    }

    fn apply(&mut self, room: &mut Room, action: &GameAction) -> PhaseOutcome {
        let seat = action.seat;
        let accepted = matches!(action.action, PlayerAction::AcceptRedeal);

        match room.settings.redeal_mode {
            RedealMode::Sequential => {
                if accepted {
                    self.redeal(room);
                    let outcome =
                        PhaseOutcome::new(format!("seat {seat} accepted redeal"))
                            .set("redeal_accepted_by", json!(seat))
                            .set("redeal_multiplier", json!(room.redeal_multiplier))
                            .set("seats", seat_counters(room));
                    self.negotiation_snapshot(outcome)
                } else {
                    self.weak_seats.retain(|s| *s != seat);
                    self.current_weak_player = self.weak_seats.first().copied();
                    let outcome = PhaseOutcome::new(format!("seat {seat} declined redeal"))
                        .set("redeal_declined_by", json!(seat));
                    self.negotiation_snapshot(outcome)
                }
            }
            RedealMode::Simultaneous => {
                self.decisions.push((seat, accepted));
                if self.decisions.len() < self.weak_seats.len() {
                    let outcome = PhaseOutcome::new(format!("seat {seat} answered redeal"))
                        .set("redeal_answered_by", json!(seat))
                        .set("redeal_answers", json!(self.decisions.len()));
                    return self.negotiation_snapshot(outcome);
                }
                // Every weak seat has replied.
                if self.decisions.iter().any(|(_, accept)| *accept) {
                    self.redeal(room);
                    let outcome = PhaseOutcome::new("redeal accepted, hands redealt")
                        .set("redeal_multiplier", json!(room.redeal_multiplier))
                        .set("seats", seat_counters(room));
                    self.negotiation_snapshot(outcome)
                } else {
                    self.weak_seats.clear();
                    self.current_weak_player = None;
                    let outcome = PhaseOutcome::new("all weak seats declined redeal");
                    self.negotiation_snapshot(outcome)
                }
            }
        }
    }

    fn check_transition(&self, _room: &Room) -> Option<Phase> {
        self.weak_seats
            .is_empty()
            .then(|| Declaration::default().into())
    }

    fn phase_data(&self, room: &Room) -> Value {
        json!({
            "weak_hands": self.weak_seats,
            "current_weak_player": self.current_weak_player,
            "redeal_multiplier": room.redeal_multiplier,
            "redeal_mode": room.settings.redeal_mode,
        })
    }
}

// ---------------------------------------------------------------------------
// DECLARATION
// ---------------------------------------------------------------------------

/// Seats declare their pile targets, starter first then clockwise.
#[derive(Clone, Debug, Default)]
pub struct Declaration {}

impl Declaration {
    fn current_declarer(room: &Room) -> Option<SeatIndex> {
        let order = room.clockwise_from(room.starter_seat);
        order.get(room.declared_count()).copied()
    }
}

/// Declaration values a seat may legally pick right now: `0..=8`, minus 0
/// once the zero-declare streak is exhausted, minus the value that would
/// bring the final sum to exactly eight piles.
#[must_use]
pub fn allowed_declarations(room: &Room, seat: SeatIndex) -> Vec<u8> {
    let mut allowed: Vec<u8> = (0..=PILES_PER_ROUND).collect();
    if let Some(s) = room.seat(seat)
        && s.zero_declares_streak >= room.settings.zero_streak_limit
    {
        allowed.retain(|v| *v != 0);
    }
    if room.declared_count() == SEAT_COUNT - 1 {
        let forbidden = PILES_PER_ROUND.checked_sub(room.total_declared());
        if let Some(forbidden) = forbidden {
            allowed.retain(|v| *v != forbidden);
        }
    }
    allowed
}

impl PhaseLogic for Declaration {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Declaration
    }

    fn on_enter(&mut self, room: &mut Room) -> PhaseOutcome {
        let current = Self::current_declarer(room);
        PhaseOutcome::new("declarations open")
            .set("declaration_order", json!(room.clockwise_from(room.starter_seat)))
            .set("current_declarer", json!(current))
    }

    fn allowed_actions(&self, room: &Room, seat: SeatIndex) -> Vec<ActionKind> {
        if Self::current_declarer(room) == Some(seat) {
            vec![ActionKind::Declare]
        } else {
            Vec::new()
        }
    }

    fn validate(&self, room: &Room, action: &GameAction) -> Result<(), GameError> {
        let PlayerAction::Declare { value } = &action.action else {
            return Err(illegal(action, self.kind()));
        };
        if Self::current_declarer(room) != Some(action.seat) {
            return Err(GameError::NotYourTurn);
        }
        if !allowed_declarations(room, action.seat).contains(value) {
            return Err(GameError::IllegalDeclaration {
                value: *value,
                allowed: allowed_declarations(room, action.seat),
            });
        }
        Ok(())
    }

    fn apply(&mut self, room: &mut Room, action: &GameAction) -> PhaseOutcome {
        let PlayerAction::Declare { value } = &action.action else {
            return PhaseOutcome::default();
        };
        let seat = action.seat;
        if let Some(s) = room.seat_mut(seat) {
            s.declared = Some(*value);
        }
        let next = Self::current_declarer(room);
        let mut outcome = PhaseOutcome::new(format!("seat {seat} declared {value}"))
            .set("declared_by", json!(seat))
            .set("declared_value", json!(value))
            .set("declaration_total", json!(room.total_declared()))
            .set("current_declarer", json!(next));
        if let Some(next) = next {
            outcome = outcome.set(
                "allowed_declarations",
                json!(allowed_declarations(room, next)),
            );
        }
        outcome
    }

    fn check_transition(&self, room: &Room) -> Option<Phase> {
        (room.declared_count() == SEAT_COUNT).then(|| Turn::default().into())
    }

    fn phase_data(&self, room: &Room) -> Value {
        let current = Self::current_declarer(room);
        json!({
            "declaration_order": room.clockwise_from(room.starter_seat),
            "current_declarer": current,
            "declaration_total": room.total_declared(),
            "allowed_declarations": current.map(|s| allowed_declarations(room, s)),
        })
    }
}

// ---------------------------------------------------------------------------
// TURN
// ---------------------------------------------------------------------------

/// One play laid on the current pile.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TurnPlay {
    pub seat: SeatIndex,
    pub pieces: Vec<Piece>,
    /// `None` is a dump: playable, never winning.
    pub play: Option<Play>,
}

/// One pile: the starter leads 1..=6 pieces, the rest follow with the same
/// count, and the highest value of the led type captures the pile.
#[derive(Clone, Debug, Default)]
pub struct Turn {
    plays: Vec<TurnPlay>,
    required_count: Option<usize>,
    lead: Option<Play>,
}

impl Turn {
    pub(crate) fn required(&self) -> Option<usize> {
        self.required_count
    }

    pub(crate) fn lead_play(&self) -> Option<Play> {
        self.lead
    }

    fn current_player(&self, room: &Room) -> Option<SeatIndex> {
        room.clockwise_from(room.starter_seat)
            .get(self.plays.len())
            .copied()
    }

    /// Winning seat for a complete pile. Candidates must match the led type;
    /// an invalid lead opens the pile to any valid play. Earliest seat in
    /// clockwise order after the starter wins ties; four dumps fall back to
    /// the starter.
    fn pile_winner(&self, room: &Room) -> SeatIndex {
        let mut winner = room.starter_seat;
        let mut best: Option<u32> = None;
        for turn_play in &self.plays {
            let Some(play) = turn_play.play else {
                continue;
            };
            if let Some(lead) = self.lead
                && play.play_type != lead.play_type
            {
                continue;
            }
            if best.is_none_or(|b| play.value > b) {
                best = Some(play.value);
                winner = turn_play.seat;
            }
        }
        winner
    }

    fn validate_indices(seat_hand_len: usize, indices: &[usize]) -> Result<(), GameError> {
        let mut seen = [false; 32];
        for &i in indices {
            if i >= seat_hand_len || seen[i] {
                return Err(GameError::IllegalPieces);
            }
            seen[i] = true;
        }
        Ok(())
    }
}

impl PhaseLogic for Turn {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Turn
    }

    fn on_enter(&mut self, room: &mut Room) -> PhaseOutcome {
        room.turn_number += 1;
        PhaseOutcome::new(format!("turn {} started", room.turn_number))
            .set("turn", json!(room.turn_number))
            .set("turn_starter", json!(room.starter_seat))
    }

    fn allowed_actions(&self, room: &Room, seat: SeatIndex) -> Vec<ActionKind> {
        if self.current_player(room) == Some(seat) {
            vec![ActionKind::Play]
        } else {
            Vec::new()
        }
    }

    fn validate(&self, room: &Room, action: &GameAction) -> Result<(), GameError> {
        let PlayerAction::Play { indices } = &action.action else {
            return Err(illegal(action, self.kind()));
        };
        if self.current_player(room) != Some(action.seat) {
            return Err(GameError::NotYourTurn);
        }
        let hand_len = room.seat(action.seat).map_or(0, |s| s.hand.len());
        Self::validate_indices(hand_len, indices)?;

        match self.required_count {
            // Leading: any 1..=6 pieces, valid or not. An invalid lead
            // still leads, it just cannot win.
            None => {
                if indices.is_empty() || indices.len() > MAX_PLAY_SIZE {
                    return Err(GameError::WrongCount {
                        expected: MAX_PLAY_SIZE,
                        got: indices.len(),
                    });
                }
            }
            Some(required) => {
                if indices.len() != required {
                    return Err(GameError::WrongCount {
                        expected: required,
                        got: indices.len(),
                    });
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, room: &mut Room, action: &GameAction) -> PhaseOutcome {
        let PlayerAction::Play { indices } = &action.action else {
            return PhaseOutcome::default();
        };
        let seat = action.seat;

        // Remove the chosen pieces from the hand, highest index first.
        let mut sorted = indices.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        let mut pieces = Vec::with_capacity(sorted.len());
        if let Some(s) = room.seat_mut(seat) {
            for i in sorted {
                pieces.push(s.hand.remove(i));
            }
        }
        pieces.reverse();
        room.pieces_played += pieces.len();

        let play = play::classify(&pieces);
        if self.plays.is_empty() {
            self.required_count = Some(pieces.len());
            self.lead = play;
        }
        self.plays.push(TurnPlay { seat, pieces: pieces.clone(), play });

        PhaseOutcome::new(format!("seat {seat} played {} pieces", pieces.len()))
            .set("played_by", json!(seat))
            .set("pieces", json!(pieces))
            .set("play", json!(play))
            .set("required_count", json!(self.required_count))
            .set("seats", seat_counters(room))
    }

    fn check_transition(&self, room: &Room) -> Option<Phase> {
        (self.plays.len() == SEAT_COUNT)
            .then(|| TurnResults::new(self.pile_winner(room), self.plays.clone()).into())
    }

    fn phase_data(&self, room: &Room) -> Value {
        json!({
            "turn": room.turn_number,
            "turn_starter": room.starter_seat,
            "current_player": self.current_player(room),
            "required_count": self.required_count,
            "plays": self.plays,
        })
    }
}

// ---------------------------------------------------------------------------
// TURN RESULTS
// ---------------------------------------------------------------------------

/// Shows the pile winner, then advances by timer or explicit readiness.
#[derive(Clone, Debug)]
pub struct TurnResults {
    winner: SeatIndex,
    plays: Vec<TurnPlay>,
    entered_at: DateTime<Utc>,
    ready: bool,
}

impl TurnResults {
    fn new(winner: SeatIndex, plays: Vec<TurnPlay>) -> Self {
        Self {
            winner,
            plays,
            entered_at: Utc::now(),
            ready: false,
        }
    }

    /// Timer hook driven by the room tick.
    pub(super) fn expire(&mut self, now: DateTime<Utc>, auto_advance: chrono::Duration) {
        if now - self.entered_at >= auto_advance {
            self.ready = true;
        }
    }
}

impl PhaseLogic for TurnResults {
    fn kind(&self) -> PhaseKind {
        PhaseKind::TurnResults
    }

    fn on_enter(&mut self, room: &mut Room) -> PhaseOutcome {
        if let Some(s) = room.seat_mut(self.winner) {
            s.captured += 1;
        }
        // The pile winner leads the next pile.
        room.starter_seat = self.winner;
        PhaseOutcome::new(format!("seat {} captured pile {}", self.winner, room.turn_number))
            .set("turn_winner", json!(self.winner))
            .set("turn", json!(room.turn_number))
            .set("seats", seat_counters(room))
    }

    fn allowed_actions(&self, room: &Room, seat: SeatIndex) -> Vec<ActionKind> {
        if room.seat(seat).is_some() {
            vec![ActionKind::PlayerReady]
        } else {
            Vec::new()
        }
    }

    fn validate(&self, _room: &Room, action: &GameAction) -> Result<(), GameError> {
        match &action.action {
            PlayerAction::PlayerReady => Ok(()),
            _ => Err(illegal(action, self.kind())),
        }
    }

    fn apply(&mut self, _room: &mut Room, action: &GameAction) -> PhaseOutcome {
        self.ready = true;
        PhaseOutcome::new(format!("seat {} advanced the round", action.seat))
            .set("advanced_by", json!(action.seat))
    }

    fn check_transition(&self, room: &Room) -> Option<Phase> {
        if !self.ready {
            return None;
        }
        if room.hands_empty() {
            Some(Scoring::default().into())
        } else {
            Some(Turn::default().into())
        }
    }

    fn phase_data(&self, room: &Room) -> Value {
        json!({
            "turn": room.turn_number,
            "turn_winner": self.winner,
            "plays": self.plays,
            "piles_captured": room
                .seats
                .iter()
                .map(|s| s.as_ref().map(|s| s.captured))
                .collect::<Vec<_>>(),
        })
    }
}

// ---------------------------------------------------------------------------
// SCORING
// ---------------------------------------------------------------------------

/// Applies the round scores and decides between the next round and game end.
#[derive(Clone, Debug, Default)]
pub struct Scoring {
    game_over: bool,
}

impl PhaseLogic for Scoring {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Scoring
    }

    fn on_enter(&mut self, room: &mut Room) -> PhaseOutcome {
        let multiplier = room.redeal_multiplier;
        let mut round_scores = Vec::with_capacity(SEAT_COUNT);
        for slot in &mut room.seats {
            let Some(seat) = slot.as_mut() else {
                round_scores.push(Value::Null);
                continue;
            };
            let declared = seat.declared.unwrap_or(0);
            let delta = scoring::round_score(declared, seat.captured, multiplier);
            seat.score += delta;
            if declared == 0 {
                seat.zero_declares_streak += 1;
            } else {
                seat.zero_declares_streak = 0;
            }
            round_scores.push(json!({
                "declared": declared,
                "captured": seat.captured,
                "delta": delta,
                "total": seat.score,
            }));
        }

        self.game_over = room
            .occupied()
            .any(|(_, s)| s.score >= room.settings.win_threshold);

        PhaseOutcome::new(format!("round {} scored", room.round_number))
            .set("round", json!(room.round_number))
            .set("round_scores", json!(round_scores))
            .set("redeal_multiplier", json!(multiplier))
            .set("game_over", json!(self.game_over))
    }

    fn allowed_actions(&self, _room: &Room, _seat: SeatIndex) -> Vec<ActionKind> {
        Vec::new()
    }

    fn validate(&self, _room: &Room, action: &GameAction) -> Result<(), GameError> {
        Err(illegal(action, self.kind()))
    }

    fn apply(&mut self, _room: &mut Room, _action: &GameAction) -> PhaseOutcome {
        PhaseOutcome::default()
    }

    fn check_transition(&self, _room: &Room) -> Option<Phase> {
        if self.game_over {
            Some(GameOver::default().into())
        } else {
            Some(Preparation::default().into())
        }
    }

    fn on_exit(&mut self, room: &mut Room) {
        if !self.game_over {
            room.starter_seat = room.round_winner();
            room.reset_round();
        }
    }

    fn phase_data(&self, room: &Room) -> Value {
        json!({
            "round": room.round_number,
            "redeal_multiplier": room.redeal_multiplier,
            "game_over": self.game_over,
        })
    }
}

// ---------------------------------------------------------------------------
// GAME OVER
// ---------------------------------------------------------------------------

/// Terminal phase: standings only, no further game actions.
#[derive(Clone, Debug, Default)]
pub struct GameOver {}

impl GameOver {
    fn standings(room: &Room) -> Vec<Value> {
        let mut ranked: Vec<(SeatIndex, i32)> = room
            .occupied()
            .map(|(i, s)| (i, s.score))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
            .into_iter()
            .enumerate()
            .map(|(rank, (seat, score))| {
                json!({
                    "rank": rank + 1,
                    "seat": seat,
                    "name": room.seat(seat).map(|s| s.display_name.clone()),
                    "score": score,
                })
            })
            .collect()
    }
}

impl PhaseLogic for GameOver {
    fn kind(&self) -> PhaseKind {
        PhaseKind::GameOver
    }

    fn on_enter(&mut self, room: &mut Room) -> PhaseOutcome {
        PhaseOutcome::new("game over")
            .set("final_standings", json!(Self::standings(room)))
            .set("rounds_played", json!(room.round_number))
    }

    fn allowed_actions(&self, _room: &Room, _seat: SeatIndex) -> Vec<ActionKind> {
        Vec::new()
    }

    fn validate(&self, _room: &Room, action: &GameAction) -> Result<(), GameError> {
        Err(illegal(action, self.kind()))
    }

    fn apply(&mut self, _room: &mut Room, _action: &GameAction) -> PhaseOutcome {
        PhaseOutcome::default()
    }

    fn check_transition(&self, _room: &Room) -> Option<Phase> {
        None
    }

    fn phase_data(&self, room: &Room) -> Value {
        json!({
            "final_standings": Self::standings(room),
            "rounds_played": room.round_number,
        })
    }
}
