//! # relay-core
//!
//! Shared library for the slide relay containing the domain entities and the
//! JSON wire codec.
//!
//! This crate is used by the client application and its tests.  It has zero
//! dependencies on OS APIs, async runtimes, or network sockets.
//!
//! # Architecture overview (for beginners)
//!
//! The slide relay lets a presenter change slides with the volume buttons of a
//! phone.  The phone observes volume changes, turns each one into a command
//! (`NEXT_SLIDE` or `PREV_SLIDE`) and sends it to a presentation server over a
//! persistent WebSocket connection.
//!
//! This crate is the shared foundation.  It defines:
//!
//! - **`domain`** – Pure logic with no I/O: the [`Endpoint`] to connect to,
//!   the [`LevelTracker`] that turns volume samples into [`DirectionEvent`]s,
//!   the command mapping, and the connection state machine vocabulary.
//!
//! - **`protocol`** – How commands travel over the network: one JSON text
//!   frame per command, `{"command":"<NAME>"}`.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `relay_core::Command` instead of `relay_core::domain::command::Command`.
pub use domain::command::{map_direction, map_explicit, Command, CommandError};
pub use domain::connection::{ConnectionState, PolicyError, ReconnectPolicy, StatusEvent};
pub use domain::direction::{DirectionEvent, LevelTracker, VolumeSample};
pub use domain::endpoint::{Endpoint, EndpointError, DEFAULT_PORT};
pub use domain::error::RelayError;
pub use protocol::codec::{decode_command, decode_server_message, encode_command, ProtocolError};
pub use protocol::messages::{CommandFrame, ServerMessage};
