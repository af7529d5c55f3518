//! Text codec for command frames.
//!
//! Encoding is a thin layer over `serde_json`; the value of this module is
//! that every producer of frames goes through the same function, so the wire
//! format lives in exactly one place.

use thiserror::Error;

use super::messages::{CommandFrame, ServerMessage};
use crate::domain::command::Command;

/// Errors from encoding or decoding frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The text was not valid JSON or did not match the expected shape.
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame parsed but its `command` field was blank.
    #[error("frame carries an empty command name")]
    EmptyCommand,
}

/// Encodes `command` as one text frame: `{"command":"<NAME>"}`.
///
/// # Errors
///
/// Returns [`ProtocolError::Json`] if serialization fails.  With a plain
/// string field that cannot happen in practice, but the error is propagated
/// rather than unwrapped.
///
/// # Example
///
/// ```rust
/// use relay_core::{encode_command, Command};
///
/// let frame = encode_command(&Command::next_slide()).unwrap();
/// assert_eq!(frame, r#"{"command":"NEXT_SLIDE"}"#);
/// ```
pub fn encode_command(command: &Command) -> Result<String, ProtocolError> {
    let frame = CommandFrame {
        command: command.name().to_string(),
    };
    Ok(serde_json::to_string(&frame)?)
}

/// Decodes a command frame (used by tests and tooling acting as the server).
///
/// # Errors
///
/// - [`ProtocolError::Json`] for malformed JSON or a missing `command` field.
/// - [`ProtocolError::EmptyCommand`] for a blank command name.
pub fn decode_command(text: &str) -> Result<Command, ProtocolError> {
    let frame: CommandFrame = serde_json::from_str(text)?;
    Command::named(&frame.command).map_err(|_| ProtocolError::EmptyCommand)
}

/// Decodes a frame received from the server.
///
/// # Errors
///
/// Returns [`ProtocolError::Json`] if the text is not a JSON object.
pub fn decode_server_message(text: &str) -> Result<ServerMessage, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_next_slide_is_exact_wire_text() {
        let text = encode_command(&Command::next_slide()).unwrap();
        assert_eq!(text, r#"{"command":"NEXT_SLIDE"}"#);
    }

    #[test]
    fn test_encode_escapes_quotes_in_explicit_names() {
        let cmd = Command::named(r#"SAY "HI""#).unwrap();
        let text = encode_command(&cmd).unwrap();
        assert_eq!(text, r#"{"command":"SAY \"HI\""}"#);
    }

    #[test]
    fn test_decode_command_accepts_whitespace_between_tokens() {
        let cmd = decode_command(r#"{ "command" : "PREV_SLIDE" }"#).unwrap();
        assert_eq!(cmd, Command::prev_slide());
    }

    #[test]
    fn test_decode_command_rejects_missing_field() {
        let result = decode_command(r#"{"cmd":"NEXT_SLIDE"}"#);
        assert!(matches!(result, Err(ProtocolError::Json(_))));
    }

    #[test]
    fn test_decode_command_rejects_blank_name() {
        let result = decode_command(r#"{"command":"  "}"#);
        assert!(matches!(result, Err(ProtocolError::EmptyCommand)));
    }

    #[test]
    fn test_decode_server_status() {
        let msg = decode_server_message(r#"{"status":"Conectado ao servidor de apresentações"}"#)
            .unwrap();
        assert_eq!(
            msg.status.as_deref(),
            Some("Conectado ao servidor de apresentações")
        );
    }

    #[test]
    fn test_decode_server_message_without_status_is_empty() {
        let msg = decode_server_message(r#"{"clients":2}"#).unwrap();
        assert_eq!(msg, ServerMessage::default());
    }

    #[test]
    fn test_decode_server_message_rejects_non_json() {
        assert!(decode_server_message("hello").is_err());
    }
}
