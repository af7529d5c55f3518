//! In-memory volume used by the desktop binary and the integration tests.
//!
//! `SoftwareVolume` behaves like a phone's media stream: a level between 0
//! and `max_level`, a button press moves it by one step, and every change is
//! announced to the subscriber.  `set_level` echoes a [`VolumeInput::Level`]
//! exactly like the OS does when an app changes the volume itself.

use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::debug;

use super::{KeyAction, VolumeController, VolumeError, VolumeInput, VolumeKey, VolumeSource};

/// Default maximum level; matches the media stream of most Android devices.
pub const DEFAULT_MAX_LEVEL: u32 = 15;

struct Inner {
    level: u32,
    subscriber: Option<mpsc::UnboundedSender<VolumeInput>>,
}

pub struct SoftwareVolume {
    max: u32,
    inner: Mutex<Inner>,
}

impl SoftwareVolume {
    pub fn new(max: u32, initial: u32) -> Self {
        Self {
            max,
            inner: Mutex::new(Inner {
                level: initial.min(max),
                subscriber: None,
            }),
        }
    }

    /// Simulates one press of `key`.
    ///
    /// Emits the key-down and key-up notifications, then moves the level one
    /// step and emits the new level.  At either end of the range the level
    /// does not move and no level notification is sent.
    pub fn press(&self, key: VolumeKey) {
        let mut inner = self.lock();
        let before = inner.level;
        inner.level = match key {
            VolumeKey::Up => (before + 1).min(self.max),
            VolumeKey::Down => before.saturating_sub(1),
        };
        let after = inner.level;

        if let Some(tx) = inner.subscriber.as_ref() {
            let _ = tx.send(VolumeInput::Key {
                key,
                action: KeyAction::Down,
            });
            let _ = tx.send(VolumeInput::Key {
                key,
                action: KeyAction::Up,
            });
            if after != before {
                let _ = tx.send(VolumeInput::Level(after));
            }
        }
        debug!(?key, before, after, "software volume key pressed");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a panicking thread held it; the level is
        // still a plain integer.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for SoftwareVolume {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LEVEL, DEFAULT_MAX_LEVEL / 2)
    }
}

impl VolumeSource for SoftwareVolume {
    fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<VolumeInput>, VolumeError> {
        let mut inner = self.lock();
        if inner
            .subscriber
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
        {
            return Err(VolumeError::AlreadySubscribed);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        inner.subscriber = Some(tx);
        Ok(rx)
    }

    fn unsubscribe(&self) {
        self.lock().subscriber = None;
    }
}

impl VolumeController for SoftwareVolume {
    fn max_level(&self) -> u32 {
        self.max
    }

    fn current_level(&self) -> u32 {
        self.lock().level
    }

    fn set_level(&self, level: u32) -> Result<(), VolumeError> {
        if level > self.max {
            return Err(VolumeError::LevelOutOfRange {
                level,
                max: self.max,
            });
        }
        let mut inner = self.lock();
        let changed = inner.level != level;
        inner.level = level;
        if changed {
            if let Some(tx) = inner.subscriber.as_ref() {
                let _ = tx.send(VolumeInput::Level(level));
            }
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
