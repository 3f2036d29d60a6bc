//! # Castellan
//!
//! A real-time, multi-room server library for the four-seat, turn-based
//! board game Castellan (Liap Tui).
//!
//! The heart of the library is the per-room orchestrator: a serialized,
//! event-sourced phase machine that drives dealing, weak-hand redeal
//! negotiation, declaration, trick-taking, scoring and game end, while
//! broadcasting every state change to all seats with strict ordering.
//!
//! ## Architecture
//!
//! A game moves through seven phases:
//!
//! - **Waiting**: seats fill with humans and bots until the host starts
//! - **Preparation**: dealing and the weak-hand redeal negotiation
//! - **Declaration**: each seat calls its pile target (the sum rule bars
//!   the last declarer from making the calls add up exactly)
//! - **Turn**: piles are led and followed, highest value of the led type
//!   captures
//! - **TurnResults**: pile winner display, timer- or ready-advanced
//! - **Scoring**: round scores, redeal multiplier applied, win check
//! - **GameOver**: final standings until the room is evicted
//!
//! ## Core Modules
//!
//! - [`game`]: the engine (pieces, plays, phases, journal, views)
//! - [`room`]: actor hosting (the per-room task, its queue, connections,
//!   the room directory)
//! - [`bot`]: strategies and the delayed decision scheduler
//! - [`net`]: the wire contract and the inbound dispatcher
//! - [`store`]: optional journal mirroring
//!
//! ## Example
//!
//! ```
//! use castellan::game::{GameAction, GameState, PlayerAction};
//! use castellan::game::room::GameSettings;
//!
//! // A deterministic engine: seat a host and three bots, then start.
//! let mut game = GameState::new("r1", GameSettings::default(), 256, Some(7));
//! let (host, _) = game.join_seat("host", None, None).unwrap();
//! for _ in 0..3 {
//!     game.handle_action(&GameAction::new(host, PlayerAction::AddBot { seat: None })).unwrap();
//! }
//! game.handle_action(&GameAction::new(host, PlayerAction::StartGame)).unwrap();
//! assert_eq!(game.room.round_number, 1);
//! ```

pub mod bot;
pub mod game;
pub mod net;
pub mod room;
pub mod store;

pub use game::{
    ActionKind, CommittedBatch, GameAction, GameError, GameState, PlayerAction,
    phases::PhaseKind,
    pieces::{self, Color, Piece, PieceKind},
    play::{self, Play, PlayType},
    room::{ConnectionState, GameSettings, RedealMode, SeatIndex},
};
pub use net::{Dispatcher, ErrorKind, WireError};
pub use room::{ConnectionRegistry, RoomConfig, RoomHandle, RoomManager};
pub use store::{EventStore, InMemoryEventStore};
