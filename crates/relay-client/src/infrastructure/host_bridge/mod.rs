//! Host command bridge for the relay.
//!
//! The host application (a mobile shell or a desktop UI) drives the relay
//! through a handful of commands and listens for status events.  This module
//! is the only place that shapes data for that boundary.
//!
//! # How the bridge works (for beginners)
//!
//! ```text
//! Host (JavaScript)                 bridge                   Rust
//! ───────────────────────────────────────────────────────────────────────
//! startRelay({ip, port})   ──────>  start_relay()   ──────>  RelayService::start
//!                          <──────  HostCommandResult<()>
//! addListener("status")    <──────  ChannelStatusSink <────  connection worker
//! ```
//!
//! Hosts hand over numbers as wide integers, so ports arrive as `i64` and are
//! range-checked here before they ever reach the domain.
//!
//! # `HostCommandResult<T>`
//!
//! All commands return `HostCommandResult<T>`, a unified envelope:
//! ```json
//! { "success": true,  "data": {...}, "error": null  }
//! { "success": false, "data": null,  "error": "..."  }
//! ```
//! so the host can use one error-handling pattern for every command.

use relay_core::{Endpoint, StatusEvent};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

use crate::application::relay_service::{RelayService, SinkError, StatusSink};

// ── Envelope and DTOs ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCommandResult<T: Serialize> {
    /// `true` if the command completed successfully.
    pub success: bool,
    /// The command's return value, present only on success.
    pub data: Option<T>,
    /// A human-readable error message, present only on failure.
    pub error: Option<String>,
}

impl<T: Serialize> HostCommandResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Snapshot returned by [`get_relay_status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayStatusDto {
    pub running: bool,
    /// Lowercase connection state, e.g. `"connected"`.
    pub connection_state: String,
    /// `host:port` of the running relay, `null` when stopped.
    pub endpoint: Option<String>,
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// Starts the relay towards `host:port`.
pub fn start_relay(service: &RelayService, host: &str, port: i64) -> HostCommandResult<()> {
    let endpoint = match Endpoint::from_parts(host, port) {
        Ok(endpoint) => endpoint,
        Err(e) => return HostCommandResult::err(format!("invalid endpoint: {e}")),
    };
    match service.start_endpoint(endpoint) {
        Ok(()) => HostCommandResult::ok(()),
        Err(e) => HostCommandResult::err(e.to_string()),
    }
}

/// Stops the relay.  Always succeeds, even if it was not running.
pub fn stop_relay(service: &RelayService) -> HostCommandResult<()> {
    service.stop();
    HostCommandResult::ok(())
}

pub fn is_relay_running(service: &RelayService) -> HostCommandResult<bool> {
    HostCommandResult::ok(service.is_running())
}

/// Sends an explicitly named command (`next`, `prev`, or any server command).
pub fn send_relay_command(service: &RelayService, name: &str) -> HostCommandResult<()> {
    match service.send_explicit_command(name) {
        Ok(()) => HostCommandResult::ok(()),
        Err(e) => HostCommandResult::err(e.to_string()),
    }
}

pub fn get_relay_status(service: &RelayService) -> HostCommandResult<RelayStatusDto> {
    HostCommandResult::ok(RelayStatusDto {
        running: service.is_running(),
        connection_state: service.connection_state().to_string(),
        endpoint: service.endpoint().map(|e| e.to_string()),
    })
}

// ── Status sinks ──────────────────────────────────────────────────────────────

/// Delivers status events on a channel the host reads from.
pub struct ChannelStatusSink {
    tx: mpsc::UnboundedSender<StatusEvent>,
}

impl ChannelStatusSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StatusSink for ChannelStatusSink {
    fn notify(&self, event: &StatusEvent) -> Result<(), SinkError> {
        self.tx
            .send(event.clone())
            .map_err(|_| SinkError::Disconnected)
    }
}

/// Writes status events to the log.  Used when no host is listening.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn notify(&self, event: &StatusEvent) -> Result<(), SinkError> {
        match &event.error {
            Some(error) => info!(connected = event.connected, %error, "relay status"),
            None => info!(connected = event.connected, "relay status"),
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
