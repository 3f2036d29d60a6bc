//! Bot seats and seat takeover.
//!
//! Bots are ordinary action producers: their decisions enter the room's
//! action queue like any human frame and are validated the same way.

pub mod scheduler;
pub mod strategy;

pub use scheduler::BotScheduler;
pub use strategy::{BaselineStrategy, BotStrategy};
