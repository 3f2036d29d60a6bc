//! Room hosting: the actor, its mailbox, connections and the directory.
//!
//! Many rooms run in parallel; within one room a single actor task
//! serializes every mutation. See `game` for the engine the actor drives.

pub mod actor;
pub mod config;
pub mod connections;
pub mod messages;
pub mod registry;

pub use actor::{RoomActor, RoomHandle};
pub use config::RoomConfig;
pub use connections::{ChannelRoute, ConnectionRegistry, Retained, RoomChannels};
pub use messages::{ChannelBinding, RoomMessage, SeatSession};
pub use registry::RoomManager;
