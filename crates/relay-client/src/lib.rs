//! relay-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does relay-client do? (for beginners)
//!
//! The relay runs next to the presenter (typically on a phone).  It:
//!
//! 1. Opens a WebSocket to the presentation server and keeps it open,
//!    reconnecting every few seconds whenever it drops.
//! 2. Watches the device volume.  Every change up or down becomes a
//!    `NEXT_SLIDE` or `PREV_SLIDE` command.
//! 3. Resets the volume to the middle of its range after a short quiet
//!    period so both buttons keep working forever.
//! 4. Tells the host application whenever the connection comes up or goes
//!    down so it can show a status indicator.

/// Application layer: direction detection and the relay service façade.
pub mod application;

/// Infrastructure layer: network worker, volume adapters, host bridge, config.
pub mod infrastructure;
