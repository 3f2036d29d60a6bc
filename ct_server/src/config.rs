//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated
//! configuration for the server and the rooms it spawns.

use castellan::game::room::{GameSettings, RedealMode};
use castellan::room::RoomConfig;
use std::net::SocketAddr;

/// Complete server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address.
    pub bind: SocketAddr,
    /// Defaults applied to every room created over the wire.
    pub room: RoomConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables, with an optional bind
    /// override from CLI args.
    pub fn from_env(bind_override: Option<SocketAddr>) -> Result<Self, ConfigError> {
        let bind = bind_override
            .or_else(|| {
                std::env::var("SERVER_BIND")
                    .ok()
                    .and_then(|s| s.parse().ok())
            })
            .unwrap_or_else(|| {
                "127.0.0.1:8765"
                    .parse()
                    .expect("default bind address is valid")
            });

        let redeal_mode = std::env::var("ROOM_REDEAL_MODE")
            .ok()
            .and_then(|v| match v.to_lowercase().as_str() {
                "sequential" => Some(RedealMode::Sequential),
                "simultaneous" => Some(RedealMode::Simultaneous),
                _ => None,
            })
            .unwrap_or_default();

        let settings = GameSettings {
            weak_hand_threshold: parse_env_or("ROOM_WEAK_HAND_THRESHOLD", 9),
            win_threshold: parse_env_or("ROOM_WIN_THRESHOLD", 50),
            redeal_mode,
            max_redeal_multiplier: std::env::var("ROOM_MAX_REDEAL_MULTIPLIER")
                .ok()
                .and_then(|v| v.parse().ok()),
            zero_streak_limit: parse_env_or("ROOM_ZERO_STREAK_LIMIT", 2),
        };

        let room = RoomConfig {
            settings,
            queue_capacity: parse_env_or("ROOM_QUEUE_CAPACITY", 64),
            dedup_window: parse_env_or("ROOM_DEDUP_WINDOW", 256),
            journal_retention: parse_env_or("ROOM_JOURNAL_RETENTION", 512),
            outbox_retention: parse_env_or("ROOM_OUTBOX_RETENTION", 256),
            bot_decision_delay_ms: parse_env_or("ROOM_BOT_DECISION_DELAY_MS", 800),
            disconnect_grace_secs: parse_env_or("ROOM_DISCONNECT_GRACE_SECS", 30),
            idle_eviction_secs: parse_env_or("ROOM_IDLE_EVICTION_SECS", 300),
            turn_results_auto_advance_ms: parse_env_or("ROOM_TURN_RESULTS_AUTO_ADVANCE_MS", 3000),
            rng_seed: None,
        };

        Ok(ServerConfig { bind, room })
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.room.validate().map_err(|reason| ConfigError::Invalid {
            var: "ROOM_*".to_string(),
            reason,
        })?;

        if self.room.settings.weak_hand_threshold >= 14 {
            return Err(ConfigError::Invalid {
                var: "ROOM_WEAK_HAND_THRESHOLD".to_string(),
                reason: "threshold at or above the strongest piece makes every hand weak"
                    .to_string(),
            });
        }

        if self.room.bot_decision_delay_ms > 30_000 {
            return Err(ConfigError::Invalid {
                var: "ROOM_BOT_DECISION_DELAY_MS".to_string(),
                reason: "bot delay above 30s stalls bot-only rooms".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback.
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = ServerConfig {
            bind: "127.0.0.1:8765".parse().unwrap(),
            room: RoomConfig::default(),
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn degenerate_weak_threshold_is_rejected() {
        let mut config = ServerConfig {
            bind: "127.0.0.1:8765".parse().unwrap(),
            room: RoomConfig::default(),
        };
        config.room.settings.weak_hand_threshold = 14;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn excessive_bot_delay_is_rejected() {
        let mut config = ServerConfig {
            bind: "127.0.0.1:8765".parse().unwrap(),
            room: RoomConfig::default(),
        };
        config.room.bot_decision_delay_ms = 60_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_error_display_includes_the_variable() {
        let err = ConfigError::Invalid {
            var: "ROOM_WIN_THRESHOLD".to_string(),
            reason: "must be positive".to_string(),
        };
        assert!(err.to_string().contains("ROOM_WIN_THRESHOLD"));
    }
}
