//! Wire layer: frames, errors, and the inbound dispatcher.
//!
//! The framing contract is transport-agnostic JSON; the server binary
//! supplies the WebSocket plumbing and feeds raw frames through
//! [`Dispatcher::handle_frame`].

pub mod dispatcher;
pub mod errors;
pub mod frames;

pub use dispatcher::Dispatcher;
pub use errors::{ErrorKind, WireError};
pub use frames::InboundFrame;
