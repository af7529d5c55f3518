//! Relay error taxonomy.
//!
//! Transport failures (`ConnectFailure`, `UnexpectedClose`) are handled by the
//! reconnect loop and only ever reach the host as a status event.  The other
//! variants are returned synchronously from host-facing operations.

use thiserror::Error;

use super::command::CommandError;
use super::endpoint::EndpointError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// The connection could not be established (DNS, refused, timeout).
    #[error("failed to connect to {endpoint}: {reason}")]
    ConnectFailure { endpoint: String, reason: String },

    /// A send was attempted while the connection was not `Connected`.
    #[error("not connected to the presentation server")]
    NotConnected,

    /// The host supplied an unusable host or port to `start`.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] EndpointError),

    /// The peer or the transport closed the connection outside of `stop()`.
    #[error("connection closed unexpectedly: {reason}")]
    UnexpectedClose { reason: String },

    /// An explicit command had no usable name.
    #[error("invalid command: {0}")]
    InvalidCommand(#[from] CommandError),

    /// The volume input could not be subscribed to.
    #[error("volume input unavailable: {0}")]
    InputUnavailable(String),
}

impl RelayError {
    /// `true` for failures the reconnect loop recovers from on its own.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailure { .. } | Self::UnexpectedClose { .. }
        )
    }
}
