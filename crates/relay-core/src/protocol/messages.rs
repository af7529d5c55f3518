//! JSON frame types exchanged with the presentation server.
//!
//! # Message flow
//!
//! ```text
//! Relay  → Server:  {"command":"NEXT_SLIDE"}
//! Server → Relay:   {"status":"Avançou para o próximo slide"}
//! ```
//!
//! One UTF-8 text frame carries exactly one JSON object.  There is no
//! batching and no envelope version; the server ignores unknown fields and
//! the relay does the same for anything the server sends.

use serde::{Deserialize, Serialize};

/// The only client → server frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandFrame {
    pub command: String,
}

/// Server → client frame.
///
/// The server acknowledges connections and commands with a human-readable
/// status line.  The relay only logs it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServerMessage {
    #[serde(default)]
    pub status: Option<String>,
}
