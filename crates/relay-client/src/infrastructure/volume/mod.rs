//! Volume input and control seams.
//!
//! The relay needs two things from the platform:
//!
//! - a stream of volume notifications ([`VolumeSource`]), and
//! - the ability to read and set the media volume level ([`VolumeController`]).
//!
//! On a phone both are backed by the OS audio service.  The desktop binary
//! uses [`software::SoftwareVolume`], an in-memory volume driven from the
//! console, and unit tests use the recording doubles in [`mock`].
//!
//! # Level versus key notifications (for beginners)
//!
//! Some platforms only report the absolute level after it changed
//! ("volume is now 8 of 15"), others report the raw button press
//! ("volume-up pressed").  [`VolumeInput`] carries either one; the detector
//! decides which kind it listens to.

pub mod mock;
pub mod software;

use thiserror::Error;
use tokio::sync::mpsc;

/// Errors reported by volume adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VolumeError {
    /// The platform refused the subscription (missing permission, no audio service).
    #[error("volume input unavailable: {0}")]
    Unavailable(String),

    /// The source only supports one subscriber at a time.
    #[error("volume source is already subscribed")]
    AlreadySubscribed,

    /// A requested level is outside `0..=max_level`.
    #[error("volume level {level} is above the maximum {max}")]
    LevelOutOfRange { level: u32, max: u32 },
}

/// The physical volume button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolumeKey {
    Up,
    Down,
}

/// Whether a key went down or came back up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAction {
    Down,
    Up,
}

/// One notification from a [`VolumeSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeInput {
    /// The media volume is now `level`.
    Level(u32),
    /// A volume button changed state.
    Key { key: VolumeKey, action: KeyAction },
}

/// Delivers volume notifications.
///
/// `subscribe` hands out the receiving end of an unbounded channel.  The
/// source keeps the sender and pushes one [`VolumeInput`] per platform
/// callback.  `unsubscribe` drops the sender, which ends the receiver.
pub trait VolumeSource: Send + Sync {
    fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<VolumeInput>, VolumeError>;

    fn unsubscribe(&self);
}

/// Reads and writes the media volume level.
pub trait VolumeController: Send + Sync {
    /// The highest level the device supports (e.g. 15 on most phones).
    fn max_level(&self) -> u32;

    fn current_level(&self) -> u32;

    /// Sets the level.  Implementations may echo the change back through
    /// their [`VolumeSource`] as a [`VolumeInput::Level`].
    fn set_level(&self, level: u32) -> Result<(), VolumeError>;
}

/// The level the detector parks the volume at so both buttons keep working.
pub fn midpoint(max_level: u32) -> u32 {
    max_level / 2
}

// ── Tests ─────────────────────────────────────────────────────────────────────
