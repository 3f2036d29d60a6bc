//! Room actor: the single consumer that serializes all room mutation.
//!
//! One actor task per room. The bounded inbox is the action queue of the
//! design: producers (dispatcher, bot timers) enqueue, the actor dequeues
//! one message at a time, drives the game engine, and fans the committed
//! batches out to the per-seat channels. Nothing else ever touches the
//! `GameState`.

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{Duration, interval};

use crate::bot::{BotScheduler, BotStrategy};
use crate::game::journal::Resync;
use crate::game::phases::PhaseKind;
use crate::game::pieces::SEAT_COUNT;
use crate::game::room::{ConnectionState, SeatIndex};
use crate::game::{ActionKind, CommittedBatch, GameAction, GameState};
use crate::net::errors::{ErrorKind, WireError};
use crate::net::frames;
use crate::store::EventStore;

use super::config::RoomConfig;
use super::connections::{Retained, RoomChannels};
use super::messages::{ChannelBinding, RoomMessage, SeatSession};

/// Cheap cloneable handle for enqueueing messages to a room.
#[derive(Clone, Debug)]
pub struct RoomHandle {
    sender: mpsc::Sender<RoomMessage>,
    room_id: String,
}

impl RoomHandle {
    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Enqueue, waiting for inbox space. Used for room plumbing messages.
    pub async fn send(&self, message: RoomMessage) -> Result<(), String> {
        self.sender
            .send(message)
            .await
            .map_err(|_| "room is closed".to_string())
    }

    /// Enqueue without waiting. Player actions use this so a full queue is
    /// reported as back-pressure instead of silently stalling the channel.
    pub fn try_send(&self, message: RoomMessage) -> Result<(), TrySendError<RoomMessage>> {
        self.sender.try_send(message)
    }
}

pub struct RoomActor {
    config: RoomConfig,
    game: GameState,
    inbox: mpsc::Receiver<RoomMessage>,
    inbox_tx: mpsc::Sender<RoomMessage>,
    channels: RoomChannels,
    scheduler: BotScheduler,
    /// Per-seat ring of `(request_id, reply frame)` for idempotent replays.
    dedup: [VecDeque<(String, Value)>; SEAT_COUNT],
    store: Option<Arc<dyn EventStore>>,
    persisted_version: u64,
    game_over_at: Option<chrono::DateTime<Utc>>,
    all_disconnected_since: Option<chrono::DateTime<Utc>>,
    closed: bool,
}

impl RoomActor {
    #[must_use]
    pub fn new(
        room_id: String,
        config: RoomConfig,
        strategy: Box<dyn BotStrategy>,
        store: Option<Arc<dyn EventStore>>,
    ) -> (Self, RoomHandle) {
        let (sender, inbox) = mpsc::channel(config.queue_capacity);
        let game = GameState::new(
            room_id.clone(),
            config.settings.clone(),
            config.journal_retention,
            config.rng_seed,
        );
        let scheduler = BotScheduler::new(
            strategy,
            Duration::from_millis(config.bot_decision_delay_ms),
        );
        let channels = RoomChannels::new(config.outbox_retention);
        let actor = Self {
            config,
            game,
            inbox,
            inbox_tx: sender.clone(),
            channels,
            scheduler,
            dedup: Default::default(),
            store,
            persisted_version: 0,
            game_over_at: None,
            all_disconnected_since: None,
            closed: false,
        };
        let handle = RoomHandle { sender, room_id };
        (actor, handle)
    }

    /// Actor event loop: one message at a time, plus a one-second tick for
    /// timers (auto-advance, grace periods, eviction).
    pub async fn run(mut self) {
        log::info!("room {} starting", self.game.room.room_id);
        let mut tick_interval = interval(Duration::from_secs(1));

        loop {
            tokio::select! {
                message = self.inbox.recv() => {
                    match message {
                        Some(message) => self.handle_message(message).await,
                        None => break,
                    }
                    if self.closed {
                        break;
                    }
                }
                _ = tick_interval.tick() => {
                    self.tick().await;
                    if self.closed {
                        break;
                    }
                }
            }
        }

        self.scheduler.cancel_all();
        log::info!("room {} closed", self.game.room.room_id);
    }

    async fn handle_message(&mut self, message: RoomMessage) {
        match message {
            RoomMessage::Action { action, response } => {
                self.process_action(action, response).await;
            }

            RoomMessage::BotWake { seat, generation } => {
                self.scheduler.fired(seat);
                if !self.scheduler.is_current(seat, generation) {
                    return;
                }
                if !self.game.pending_bot_seats().contains(&seat) {
                    return;
                }
                let Some(decision) = self.scheduler.decide(&self.game, seat) else {
                    return;
                };
                log::debug!(
                    "room {}: bot seat {seat} acting",
                    self.game.room.room_id
                );
                self.process_action(GameAction::new(seat, decision), None)
                    .await;
            }

            RoomMessage::Join {
                display_name,
                preferred_seat,
                avatar_color,
                channel,
                response,
            } => {
                let result =
                    self.handle_join(&display_name, preferred_seat, avatar_color, channel);
                let _ = response.send(result);
            }

            RoomMessage::Connect {
                display_name,
                channel,
                last_ack_version,
                response,
            } => {
                let result =
                    self.handle_connect(&display_name, channel, last_ack_version);
                let _ = response.send(result);
            }

            RoomMessage::Leave { seat, response } => {
                let result = self.handle_leave(seat);
                let _ = response.send(result);
            }

            RoomMessage::Disconnect { channel_id } => {
                if let Some(seat) = self.channels.detach_channel(channel_id) {
                    log::debug!(
                        "room {}: seat {seat} channel closed",
                        self.game.room.room_id
                    );
                    if self.game.room.seat(seat).is_some_and(|s| !s.is_bot) {
                        match self.game.set_connection_state(
                            seat,
                            ConnectionState::Disconnected,
                            "player disconnected",
                        ) {
                            Ok(Some(batch)) => self.fan_out(&[batch]),
                            Ok(None) => {}
                            Err(err) => log::warn!(
                                "room {}: disconnect bookkeeping failed: {err}",
                                self.game.room.room_id
                            ),
                        }
                    }
                }
            }

            RoomMessage::Ack { seat, version } => {
                if seat < SEAT_COUNT {
                    self.channels.ack(seat, version);
                }
            }

            RoomMessage::SyncRequest { seat, last_version } => {
                if seat < SEAT_COUNT {
                    self.replay_journal(seat, last_version);
                }
            }

            RoomMessage::GetInfo { response } => {
                let _ = response.send(self.game.room_info());
            }

            RoomMessage::GetState { seat, response } => {
                let snapshot = self.game.snapshot();
                let frame = match seat {
                    Some(seat) if seat < SEAT_COUNT => frames::phase_change(&snapshot, seat),
                    _ => frames::phase_change_public(&snapshot),
                };
                let _ = response.send(frame);
            }

            RoomMessage::Close { response } => {
                self.closed = true;
                let _ = response.send(());
            }
        }

        self.persist_new().await;
    }

    /// The core dequeue path: dedup, apply, journal, broadcast, reply.
    async fn process_action(
        &mut self,
        action: GameAction,
        response: Option<tokio::sync::oneshot::Sender<Value>>,
    ) {
        let seat = action.seat;

        // Duplicate request: replay the original reply, touch nothing.
        if let Some(request_id) = &action.request_id
            && seat < SEAT_COUNT
            && let Some((_, reply)) = self.dedup[seat]
                .iter()
                .find(|(cached, _)| cached == request_id)
        {
            log::debug!(
                "room {}: duplicate request {request_id} from seat {seat}",
                self.game.room.room_id
            );
            if let Some(response) = response {
                let _ = response.send(reply.clone());
            }
            return;
        }

        let occupied_before: [bool; SEAT_COUNT] =
            std::array::from_fn(|s| self.game.room.seat(s).is_some());

        let reply = match self.game.handle_action(&action) {
            Ok(batches) => {
                self.fan_out(&batches);
                self.detach_vacated(&occupied_before);
                frames::room_event(
                    reply_event(action.action.kind()),
                    json!({
                        "status": "ok",
                        "action": action.action.kind(),
                        "seat": seat,
                    }),
                    self.game.version(),
                )
            }
            Err(err) => {
                log::debug!(
                    "room {}: action {} from seat {seat} rejected: {err}",
                    self.game.room.room_id,
                    action.action.kind()
                );
                frames::error(&WireError::from(&err))
            }
        };

        if let Some(request_id) = &action.request_id
            && seat < SEAT_COUNT
        {
            if self.dedup[seat].len() == self.config.dedup_window {
                self.dedup[seat].pop_front();
            }
            self.dedup[seat].push_back((request_id.clone(), reply.clone()));
        }
        if let Some(response) = response {
            let _ = response.send(reply);
        }

        self.after_progress();
    }

    fn handle_join(
        &mut self,
        display_name: &str,
        preferred_seat: Option<SeatIndex>,
        avatar_color: Option<String>,
        channel: ChannelBinding,
    ) -> Result<SeatSession, WireError> {
        match self
            .game
            .join_seat(display_name, preferred_seat, avatar_color)
        {
            Ok((seat, batches)) => {
                let _ = self.channels.attach(seat, channel);
                self.fan_out(&batches);
                self.all_disconnected_since = None;
                Ok(SeatSession {
                    room_id: self.game.room.room_id.clone(),
                    seat,
                    version: self.game.version(),
                    room_info: self.game.room_info(),
                })
            }
            Err(err) => Err(WireError::from(&err)),
        }
    }

    /// Lobby-level departure: release the seat's channel and bot timer and
    /// let the engine vacate the seat. Replies with the remaining
    /// occupancy; the registry closes rooms that reach zero.
    fn handle_leave(&mut self, seat: SeatIndex) -> Result<usize, WireError> {
        if seat >= SEAT_COUNT || self.game.room.seat(seat).is_none() {
            return Err(WireError::new(
                ErrorKind::NotFound,
                format!("seat {seat} is empty"),
            ));
        }
        self.scheduler.cancel(seat);
        self.channels.detach_seat(seat);
        self.dedup[seat].clear();
        match self.game.vacate_seat(seat) {
            Ok(batches) => {
                self.fan_out(&batches);
                Ok(self.game.room.occupied_count())
            }
            Err(err) => Err(WireError::from(&err)),
        }
    }

    /// Reconnect: revive the seat, cancel its pending bot decision, replay
    /// what it missed, then let live traffic resume.
    fn handle_connect(
        &mut self,
        display_name: &str,
        channel: ChannelBinding,
        last_ack_version: Option<u64>,
    ) -> Result<SeatSession, WireError> {
        let seat = self
            .game
            .room
            .occupied()
            .find(|(_, s)| !s.is_bot && s.display_name == display_name)
            .map(|(seat, _)| seat)
            .ok_or_else(|| {
                WireError::new(
                    ErrorKind::NotFound,
                    format!("no seat for player {display_name}"),
                )
            })?;

        // The pending decision timer dies; an already-dequeued decision is
        // in-flight and still applies.
        self.scheduler.cancel(seat);

        let retained = self.channels.attach(seat, channel);
        self.all_disconnected_since = None;

        match (last_ack_version, retained) {
            // The client told us where it stopped: the journal is the
            // authority for the gap.
            (Some(version), _) => self.replay_journal(seat, version),
            (None, Retained::Frames(frames)) => {
                for frame in frames {
                    self.channels.send_to_seat(seat, frame);
                }
                self.send_snapshot(seat);
            }
            // The outbox overflowed while the seat was away: fall back to
            // the last version the client ever acked.
            (None, Retained::Overflowed) => {
                let acked = self.channels.last_ack(seat);
                self.replay_journal(seat, acked);
            }
        }

        match self.game.set_connection_state(
            seat,
            ConnectionState::Connected,
            "player reconnected",
        ) {
            Ok(Some(batch)) => self.fan_out(&[batch]),
            Ok(None) => {}
            Err(err) => {
                return Err(WireError::from(&err));
            }
        }

        Ok(SeatSession {
            room_id: self.game.room.room_id.clone(),
            seat,
            version: self.game.version(),
            room_info: self.game.room_info(),
        })
    }

    /// Stream journal records newer than `after_version` to one seat,
    /// followed by the current snapshot.
    fn replay_journal(&mut self, seat: SeatIndex, after_version: u64) {
        match self.game.resync(after_version) {
            Resync::Records(records) => {
                for record in &records {
                    let frame = frames::journal_record(record);
                    self.channels.send_to_seat(seat, frame.to_string());
                }
            }
            Resync::Full => {
                let frame = frames::full_resync(self.game.version());
                self.channels.send_to_seat(seat, frame.to_string());
            }
        }
        self.send_snapshot(seat);
    }

    fn send_snapshot(&mut self, seat: SeatIndex) {
        let snapshot = self.game.snapshot();
        let frame = frames::phase_change(&snapshot, seat);
        self.channels.send_to_seat(seat, frame.to_string());
    }

    /// Push committed batches to every occupied seat, in journal order.
    fn fan_out(&mut self, batches: &[CommittedBatch]) {
        for batch in batches {
            for seat in 0..SEAT_COUNT {
                if self.game.room.seat(seat).is_none() {
                    continue;
                }
                let frame = frames::phase_change(batch, seat);
                self.channels.send_to_seat(seat, frame.to_string());
            }
        }
    }

    /// Mirror records committed since the last mirror into the event
    /// store, if one is attached.
    async fn persist_new(&mut self) {
        let Some(store) = &self.store else {
            return;
        };
        match self.game.resync(self.persisted_version) {
            Resync::Records(records) => {
                for record in &records {
                    if let Err(err) = store.append(&self.game.room.room_id, record).await {
                        log::warn!(
                            "room {}: event store append failed: {err}",
                            self.game.room.room_id
                        );
                    }
                }
                if let Some(last) = records.last() {
                    self.persisted_version = last.version;
                }
            }
            Resync::Full => {
                log::warn!(
                    "room {}: journal retention outpaced the event store",
                    self.game.room.room_id
                );
                self.persisted_version = self.game.version();
            }
        }
    }

    /// Outboxes of seats that were vacated by the last action.
    fn detach_vacated(&mut self, occupied_before: &[bool; SEAT_COUNT]) {
        for seat in 0..SEAT_COUNT {
            if occupied_before[seat] && self.game.room.seat(seat).is_none() {
                self.channels.detach_seat(seat);
                self.scheduler.cancel(seat);
                self.dedup[seat].clear();
            }
        }
    }

    /// Post-progress bookkeeping: bot timers and the game-over clock.
    fn after_progress(&mut self) {
        self.scheduler.reconcile(&self.game, &self.inbox_tx);
        if self.game.phase_kind() == PhaseKind::GameOver && self.game_over_at.is_none() {
            self.game_over_at = Some(Utc::now());
        }
    }

    async fn tick(&mut self) {
        let now = Utc::now();

        let batches = self.game.tick(
            now,
            ChronoDuration::milliseconds(self.config.turn_results_auto_advance_ms as i64),
        );
        if !batches.is_empty() {
            self.fan_out(&batches);
            self.after_progress();
        }

        self.check_grace_periods(now);
        self.check_eviction(now);
        self.persist_new().await;
    }

    /// Disconnected humans past the grace window hand their seat to the
    /// bot scheduler.
    fn check_grace_periods(&mut self, now: chrono::DateTime<Utc>) {
        if matches!(
            self.game.phase_kind(),
            PhaseKind::Waiting | PhaseKind::GameOver
        ) {
            return;
        }
        let grace = ChronoDuration::seconds(self.config.disconnect_grace_secs as i64);
        for seat in 0..SEAT_COUNT {
            let lapsed = self
                .game
                .room
                .seat(seat)
                .is_some_and(|s| !s.is_bot && s.connection_state == ConnectionState::Disconnected)
                && self
                    .channels
                    .disconnected_since(seat)
                    .is_some_and(|since| now - since >= grace);
            if !lapsed {
                continue;
            }
            log::info!(
                "room {}: seat {seat} grace expired, bot takeover",
                self.game.room.room_id
            );
            match self.game.set_connection_state(
                seat,
                ConnectionState::BotTakeover,
                "disconnect grace expired",
            ) {
                Ok(Some(batch)) => {
                    self.fan_out(&[batch]);
                    self.after_progress();
                }
                Ok(None) => {}
                Err(err) => log::warn!(
                    "room {}: takeover bookkeeping failed: {err}",
                    self.game.room.room_id
                ),
            }
        }
    }

    /// Room destruction: game over, or everyone gone, for the idle window.
    fn check_eviction(&mut self, now: chrono::DateTime<Utc>) {
        let idle = ChronoDuration::seconds(self.config.idle_eviction_secs as i64);

        if let Some(over_at) = self.game_over_at
            && now - over_at >= idle
        {
            log::info!(
                "room {}: evicting after game over",
                self.game.room.room_id
            );
            self.closed = true;
            return;
        }

        if self.channels.all_disconnected() && self.game.room.occupied_count() > 0 {
            match self.all_disconnected_since {
                None => self.all_disconnected_since = Some(now),
                Some(since) if now - since >= idle => {
                    log::info!(
                        "room {}: evicting, all seats disconnected",
                        self.game.room.room_id
                    );
                    self.closed = true;
                }
                Some(_) => {}
            }
        } else {
            self.all_disconnected_since = None;
        }
    }
}

/// Outbound event name acknowledging a successful action.
fn reply_event(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Declare => "declare",
        ActionKind::Play => "play",
        ActionKind::StartGame => "game_started",
        _ => "room_update",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_events_stay_within_the_outbound_set() {
        assert_eq!(reply_event(ActionKind::Declare), "declare");
        assert_eq!(reply_event(ActionKind::Play), "play");
        assert_eq!(reply_event(ActionKind::StartGame), "game_started");
        assert_eq!(reply_event(ActionKind::AddBot), "room_update");
        assert_eq!(reply_event(ActionKind::AcceptRedeal), "room_update");
    }
}
