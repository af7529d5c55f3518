//! Domain layer: pure business-logic types with no I/O.
//!
//! - [`endpoint`] – validated host/port of the presentation server.
//! - [`direction`] – volume samples and the direction derived from them.
//! - [`command`] – command tokens and the direction-to-command mapping.
//! - [`connection`] – connection state, reconnect policy, host status events.
//! - [`error`] – the relay error taxonomy.

pub mod command;
pub mod connection;
pub mod direction;
pub mod endpoint;
pub mod error;
