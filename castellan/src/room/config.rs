//! Per-room configuration.

use serde::{Deserialize, Serialize};

use crate::game::room::GameSettings;

/// Knobs for one room: the game rules plus queueing, timing and retention.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RoomConfig {
    /// Game rule settings (weak-hand threshold, win threshold, redeal mode).
    pub settings: GameSettings,

    /// Bound of the room's action inbox; overflow rejects with OVERLOAD.
    pub queue_capacity: usize,

    /// Recent request ids remembered per seat for idempotent replays.
    pub dedup_window: usize,

    /// Journal ring size; resync below the floor forces a full resync.
    pub journal_retention: usize,

    /// Frames retained per disconnected seat before relying on the journal.
    pub outbox_retention: usize,

    /// Human-like pause before a bot decision is enqueued.
    pub bot_decision_delay_ms: u64,

    /// Disconnect grace before a human seat enters bot takeover.
    pub disconnect_grace_secs: u64,

    /// Room eviction window after game over or full disconnection.
    pub idle_eviction_secs: u64,

    /// TURN_RESULTS auto-advance delay.
    pub turn_results_auto_advance_ms: u64,

    /// Fixed RNG seed for reproducible deals (tests only).
    pub rng_seed: Option<u64>,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            settings: GameSettings::default(),
            queue_capacity: 64,
            dedup_window: 256,
            journal_retention: 512,
            outbox_retention: 256,
            bot_decision_delay_ms: 800,
            disconnect_grace_secs: 30,
            idle_eviction_secs: 300,
            turn_results_auto_advance_ms: 3000,
            rng_seed: None,
        }
    }
}

impl RoomConfig {
    /// Validate configuration before a room is spawned with it.
    pub fn validate(&self) -> Result<(), String> {
        if self.queue_capacity == 0 {
            return Err("queue capacity must be at least 1".to_string());
        }
        if self.dedup_window < 256 {
            return Err("dedup window must be at least 256".to_string());
        }
        if self.journal_retention == 0 {
            return Err("journal retention must be at least 1".to_string());
        }
        if self.settings.win_threshold <= 0 {
            return Err("win threshold must be positive".to_string());
        }
        if self.settings.weak_hand_threshold == 0 {
            return Err("weak hand threshold must be positive".to_string());
        }
        if let Some(cap) = self.settings.max_redeal_multiplier
            && cap == 0
        {
            return Err("redeal multiplier cap must be at least 1".to_string());
        }
        Ok(())
    }
}
