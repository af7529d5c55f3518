//! Connection state machine vocabulary, reconnect policy and the status
//! event reported to the host application.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of the relay connection.
///
/// ```text
/// Disconnected ──connect──> Connecting ──ok──> Connected
///      ^                        │                  │
///      └───────failure──────────┘                  │
///      └──────── Closing <──────close──────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closing => "closing",
        };
        f.write_str(s)
    }
}

/// Invalid reconnect policy parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("reconnect interval must be greater than zero")]
    ZeroInterval,
}

/// Fixed-delay reconnect policy.
///
/// Retries continue indefinitely while the relay runs and the policy is
/// enabled; there is no attempt cap and no exponential growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    enabled: bool,
    interval: Duration,
}

impl ReconnectPolicy {
    /// Interval used by every known client of the presentation server.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(5000);

    /// # Errors
    ///
    /// Returns [`PolicyError::ZeroInterval`] if `interval` is zero.
    pub fn new(enabled: bool, interval: Duration) -> Result<Self, PolicyError> {
        if interval.is_zero() {
            return Err(PolicyError::ZeroInterval);
        }
        Ok(Self { enabled, interval })
    }

    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            interval: Self::DEFAULT_INTERVAL,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Self::DEFAULT_INTERVAL,
        }
    }
}

/// Status event delivered to the host on every connection change.
///
/// Serialises as `{"connected":false,"error":null}` so a JavaScript host can
/// consume it unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub connected: bool,
    pub error: Option<String>,
}

impl StatusEvent {
    pub fn connected() -> Self {
        Self {
            connected: true,
            error: None,
        }
    }

    pub fn disconnected() -> Self {
        Self {
            connected: false,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            connected: false,
            error: Some(error.into()),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
