//! Line-oriented console driver for the desktop binary.
//!
//! Stands in for the phone's volume buttons: each line typed on stdin is
//! parsed into a [`ConsoleCommand`] and applied to a [`SoftwareVolume`] or
//! the [`RelayService`] directly.
//!
//! ```text
//! +  | up      press volume up
//! -  | down    press volume down
//! <number>     set the level directly (as another app would)
//! cmd <NAME>   send a named command (next, prev, or any server command)
//! status       print the relay status
//! help         list the commands
//! quit         stop reading
//! ```

use std::io::Write;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use crate::application::relay_service::RelayService;
use crate::infrastructure::host_bridge::get_relay_status;
use crate::infrastructure::volume::software::SoftwareVolume;
use crate::infrastructure::volume::{VolumeController, VolumeKey};

const HELP: &str = "commands: + | up, - | down, <level>, cmd <NAME>, status, help, quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Press(VolumeKey),
    SetLevel(u32),
    Send(String),
    Status,
    Help,
    Quit,
    /// A blank line.
    Nothing,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    #[error("unknown input {0:?}; type `help`")]
    Unknown(String),
    #[error("`cmd` needs a command name")]
    MissingCommandName,
}

pub fn parse_console_line(line: &str) -> Result<ConsoleCommand, ConsoleError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ConsoleCommand::Nothing);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word.to_ascii_lowercase().as_str() {
        "+" | "up" => Ok(ConsoleCommand::Press(VolumeKey::Up)),
        "-" | "down" => Ok(ConsoleCommand::Press(VolumeKey::Down)),
        "cmd" if rest.is_empty() => Err(ConsoleError::MissingCommandName),
        "cmd" => Ok(ConsoleCommand::Send(rest.to_string())),
        "status" => Ok(ConsoleCommand::Status),
        "help" | "?" => Ok(ConsoleCommand::Help),
        "quit" | "exit" => Ok(ConsoleCommand::Quit),
        other => other
            .parse::<u32>()
            .map(ConsoleCommand::SetLevel)
            .map_err(|_| ConsoleError::Unknown(line.to_string())),
    }
}

/// Reads lines from `input` until `quit` or end of input.
///
/// Feedback for the user goes to `out`; failures to write it are ignored.
pub async fn run_console<R, W>(
    input: R,
    out: &mut W,
    volume: &SoftwareVolume,
    service: &RelayService,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let _ = writeln!(out, "{HELP}");

    while let Some(line) = lines.next_line().await? {
        let command = match parse_console_line(&line) {
            Ok(command) => command,
            Err(e) => {
                let _ = writeln!(out, "{e}");
                continue;
            }
        };
        debug!(?command, "console input");

        match command {
            ConsoleCommand::Press(key) => {
                volume.press(key);
                let _ = writeln!(out, "volume {}/{}", volume.current_level(), volume.max_level());
            }
            ConsoleCommand::SetLevel(level) => match volume.set_level(level) {
                Ok(()) => {
                    let _ = writeln!(out, "volume {level}/{}", volume.max_level());
                }
                Err(e) => {
                    let _ = writeln!(out, "{e}");
                }
            },
            ConsoleCommand::Send(name) => match service.send_explicit_command(&name) {
                Ok(()) => {
                    let _ = writeln!(out, "sent {name}");
                }
                Err(e) => {
                    warn!(command = %name, "explicit command failed: {e}");
                    let _ = writeln!(out, "not sent: {e}");
                }
            },
            ConsoleCommand::Status => {
                if let Some(status) = get_relay_status(service).data {
                    let _ = writeln!(
                        out,
                        "running={} state={} endpoint={}",
                        status.running,
                        status.connection_state,
                        status.endpoint.as_deref().unwrap_or("-")
                    );
                }
            }
            ConsoleCommand::Help => {
                let _ = writeln!(out, "{HELP}");
            }
            ConsoleCommand::Quit => break,
            ConsoleCommand::Nothing => {}
        }
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
