//! Command tokens understood by the presentation server.
//!
//! The built-in mapping only ever produces [`Command::NEXT_SLIDE`] and
//! [`Command::PREV_SLIDE`].  Host applications can also send arbitrary named
//! commands (for example from an on-screen button) through [`map_explicit`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::direction::DirectionEvent;

/// Errors produced when building an explicit command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The command name was empty after trimming.
    #[error("command name must not be empty")]
    Empty,
}

/// A named command sent to the presentation server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Command {
    name: String,
}

impl Command {
    pub const NEXT_SLIDE: &'static str = "NEXT_SLIDE";
    pub const PREV_SLIDE: &'static str = "PREV_SLIDE";

    pub fn next_slide() -> Self {
        Self {
            name: Self::NEXT_SLIDE.to_string(),
        }
    }

    pub fn prev_slide() -> Self {
        Self {
            name: Self::PREV_SLIDE.to_string(),
        }
    }

    /// Builds a command with an arbitrary non-empty name, verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Empty`] if `name` is blank.
    pub fn named(name: &str) -> Result<Self, CommandError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CommandError::Empty);
        }
        Ok(Self {
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Maps a detected direction to its command.  Pure and total.
pub fn map_direction(direction: DirectionEvent) -> Command {
    match direction {
        DirectionEvent::Increase => Command::next_slide(),
        DirectionEvent::Decrease => Command::prev_slide(),
    }
}

/// Builds a command issued directly by the host, bypassing direction
/// inference.
///
/// The short aliases `next` and `prev` (any case) normalise to the canonical
/// slide commands; every other name is passed through unchanged.
///
/// # Errors
///
/// Returns [`CommandError::Empty`] if `name` is blank.
pub fn map_explicit(name: &str) -> Result<Command, CommandError> {
    let trimmed = name.trim();
    if trimmed.eq_ignore_ascii_case("next") {
        return Ok(Command::next_slide());
    }
    if trimmed.eq_ignore_ascii_case("prev") {
        return Ok(Command::prev_slide());
    }
    Command::named(trimmed)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
