//! The presentation server endpoint.
//!
//! An [`Endpoint`] is validated once, when the host application supplies it,
//! and is immutable afterwards.  Changing the target requires stopping the
//! relay and starting it again with a new endpoint.

use std::fmt;
use std::net::Ipv6Addr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Port the presentation server listens on in every known deployment.
pub const DEFAULT_PORT: u16 = 10696;

/// Reasons a host/port pair cannot be turned into an [`Endpoint`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    /// The host was empty or only whitespace.
    #[error("host must not be empty")]
    EmptyHost,

    /// The host contained characters that cannot appear in a `ws://` authority.
    ///
    /// Typical cause: the user typed `ws://192.168.0.10` instead of the bare IP.
    #[error("host {0:?} is not a bare hostname or IP address")]
    MalformedHost(String),

    /// The port was outside `1..=65535`.
    #[error("port {0} is outside the range 1-65535")]
    PortOutOfRange(i64),
}

/// Host and port of the remote presentation server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Validates `host` and `port` and builds an endpoint.
    ///
    /// Leading and trailing whitespace around the host is ignored.
    ///
    /// # Errors
    ///
    /// - [`EndpointError::EmptyHost`] if the host is blank.
    /// - [`EndpointError::MalformedHost`] if the host contains a scheme, path,
    ///   whitespace, or is an invalid IPv6 literal.
    /// - [`EndpointError::PortOutOfRange`] if `port` is 0.
    ///
    /// # Example
    ///
    /// ```rust
    /// use relay_core::Endpoint;
    ///
    /// let ep = Endpoint::new("192.168.0.10", 10696).unwrap();
    /// assert_eq!(ep.ws_url(), "ws://192.168.0.10:10696");
    /// ```
    pub fn new(host: &str, port: u16) -> Result<Self, EndpointError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(EndpointError::EmptyHost);
        }
        if port == 0 {
            return Err(EndpointError::PortOutOfRange(0));
        }

        let forbidden = |c: char| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '@' | '\\');
        if host.chars().any(forbidden) {
            return Err(EndpointError::MalformedHost(host.to_string()));
        }

        // A colon is only legal inside an IPv6 literal, with or without brackets.
        let unbracketed = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if unbracketed.contains(':') {
            let addr: Ipv6Addr = unbracketed
                .parse()
                .map_err(|_| EndpointError::MalformedHost(host.to_string()))?;
            return Ok(Self {
                host: addr.to_string(),
                port,
            });
        }
        if host.contains(['[', ']']) {
            return Err(EndpointError::MalformedHost(host.to_string()));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// Like [`Endpoint::new`] but accepts the wide integer a host bridge
    /// receives (e.g. a JavaScript number) and range-checks it first.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::PortOutOfRange`] for values outside
    /// `1..=65535`, plus every error [`Endpoint::new`] can return.
    pub fn from_parts(host: &str, port: i64) -> Result<Self, EndpointError> {
        let port = u16::try_from(port).map_err(|_| EndpointError::PortOutOfRange(port))?;
        Self::new(host, port)
    }

    /// The host exactly as validated (IPv6 literals without brackets).
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The WebSocket URL for this endpoint, bracketing IPv6 literals.
    pub fn ws_url(&self) -> String {
        format!("ws://{self}")
    }

    fn is_ipv6(&self) -> bool {
        self.host.contains(':')
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ipv6() {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
