//! Infrastructure layer for the relay client.
//!
//! Contains the I/O-facing adapters.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `relay_core`, but the application layer only reaches it through the traits
//! declared in `network` and `volume`.
//!
//! # Sub-modules
//!
//! - **`network`** – The connection worker: one Tokio task that owns the
//!   WebSocket, the connection state and the reconnect timer.
//!
//! - **`volume`** – The `VolumeSource` / `VolumeController` seams, a
//!   test mock, and an in-memory software volume for the desktop binary.
//!
//! - **`host_bridge`** – Host-facing commands returning a uniform
//!   `{success, data, error}` envelope, plus the status sinks.
//!
//! - **`storage`** – TOML configuration file.
//!
//! - **`console`** – Drives the software volume from stdin lines.

pub mod console;
pub mod host_bridge;
pub mod network;
pub mod storage;
pub mod volume;
