//! Delayed, cancellable bot decisions.
//!
//! The scheduler never decides anything up front: it arms a wake-up timer
//! for an actionable bot-controlled seat, and the room actor recomputes the
//! decision when the timer fires. A wake-up carries the generation it was
//! armed under; cancelling a seat bumps the generation, so a stale timer
//! that already left the runway lands as a no-op.

use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::game::pieces::SEAT_COUNT;
use crate::game::room::SeatIndex;
use crate::game::{GameState, PlayerAction};
use crate::room::messages::RoomMessage;

use super::strategy::BotStrategy;

pub struct BotScheduler {
    strategy: Box<dyn BotStrategy>,
    delay: Duration,
    generations: [u64; SEAT_COUNT],
    pending: HashMap<SeatIndex, JoinHandle<()>>,
}

impl BotScheduler {
    #[must_use]
    pub fn new(strategy: Box<dyn BotStrategy>, delay: Duration) -> Self {
        Self {
            strategy,
            delay,
            generations: [0; SEAT_COUNT],
            pending: HashMap::new(),
        }
    }

    /// Reconcile armed timers with the seats the game currently waits on:
    /// cancel timers for seats no longer actionable and arm the missing
    /// ones. Call after every committed batch.
    pub fn reconcile(&mut self, game: &GameState, inbox: &mpsc::Sender<RoomMessage>) {
        let pending_seats = game.pending_bot_seats();

        let stale: Vec<SeatIndex> = self
            .pending
            .keys()
            .copied()
            .filter(|seat| !pending_seats.contains(seat))
            .collect();
        for seat in stale {
            self.cancel(seat);
        }

        for seat in pending_seats {
            if self.pending.contains_key(&seat) {
                continue;
            }
            let generation = self.generations[seat];
            let delay = self.delay;
            let inbox = inbox.clone();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = inbox.send(RoomMessage::BotWake { seat, generation }).await;
            });
            self.pending.insert(seat, handle);
        }
    }

    /// Cancel a seat's armed timer, e.g. because its human reconnected. An
    /// in-flight wake-up is invalidated by the generation bump.
    pub fn cancel(&mut self, seat: SeatIndex) {
        if seat < SEAT_COUNT {
            self.generations[seat] = self.generations[seat].wrapping_add(1);
        }
        if let Some(handle) = self.pending.remove(&seat) {
            handle.abort();
        }
    }

    pub fn cancel_all(&mut self) {
        let seats: Vec<SeatIndex> = self.pending.keys().copied().collect();
        for seat in seats {
            self.cancel(seat);
        }
    }

    /// Whether a delivered wake-up is still current.
    #[must_use]
    pub fn is_current(&self, seat: SeatIndex, generation: u64) -> bool {
        seat < SEAT_COUNT && self.generations[seat] == generation
    }

    /// A wake-up fired: drop the timer bookkeeping for the seat.
    pub fn fired(&mut self, seat: SeatIndex) {
        self.pending.remove(&seat);
    }

    /// Compute the decision for a seat, fresh against the current state.
    #[must_use]
    pub fn decide(&mut self, game: &GameState, seat: SeatIndex) -> Option<PlayerAction> {
        decide_with(self.strategy.as_mut(), game, seat)
    }
}

/// Pure decision construction, shared with tests.
pub fn decide_with(
    strategy: &mut dyn BotStrategy,
    game: &GameState,
    seat: SeatIndex,
) -> Option<PlayerAction> {
    use crate::game::phases::PhaseKind;

    let hand = game.room.seat(seat)?.hand.clone();
    match game.phase_kind() {
        PhaseKind::Preparation => {
            let accept =
                strategy.decide_redeal(&hand, game.room.settings.weak_hand_threshold);
            Some(if accept {
                PlayerAction::AcceptRedeal
            } else {
                PlayerAction::DeclineRedeal
            })
        }
        PhaseKind::Declaration => {
            let allowed = game.allowed_declarations(seat);
            let value = strategy.decide_declaration(&hand, &allowed);
            Some(PlayerAction::Declare { value })
        }
        PhaseKind::Turn => {
            let (required, lead) = game.turn_context()?;
            let indices = match required {
                None => strategy.decide_lead(&hand),
                Some(required) => strategy.decide_follow(&hand, required, lead),
            };
            Some(PlayerAction::Play { indices })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::strategy::BaselineStrategy;
    use crate::game::room::GameSettings;
    use crate::game::{GameAction, phases::PhaseKind};

    fn started_game() -> GameState {
        let mut game = GameState::new("b1", GameSettings::default(), 128, Some(21));
        game.join_seat("host", None, None).unwrap();
        for _ in 0..3 {
            game.handle_action(&GameAction::new(0, PlayerAction::AddBot { seat: None }))
                .unwrap();
        }
        game.handle_action(&GameAction::new(0, PlayerAction::StartGame))
            .unwrap();
        game
    }

    #[test]
    fn decisions_are_valid_for_the_current_phase() {
        let mut game = started_game();
        let mut strategy = BaselineStrategy::seeded(1);

        // Drive the game forward by always applying the bot decision for
        // whichever seat is actionable, host included.
        for _ in 0..64 {
            match game.phase_kind() {
                PhaseKind::GameOver => break,
                PhaseKind::TurnResults => {
                    game.handle_action(&GameAction::new(0, PlayerAction::PlayerReady))
                        .unwrap();
                    continue;
                }
                _ => {}
            }
            let Some(seat) = (0..4).find(|&s| !game.allowed_actions(s).is_empty()) else {
                break;
            };
            let action =
                decide_with(&mut strategy, &game, seat).expect("decidable phase");
            game.handle_action(&GameAction::new(seat, action))
                .expect("bot decision is legal");
        }
    }

    #[test]
    fn no_decisions_outside_decision_phases() {
        let game = GameState::new("b2", GameSettings::default(), 128, Some(3));
        let mut strategy = BaselineStrategy::seeded(2);
        // Waiting phase, seat not even occupied.
        assert!(decide_with(&mut strategy, &game, 0).is_none());
    }
}
